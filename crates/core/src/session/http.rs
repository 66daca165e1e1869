//! HTTP implementation of the identity contract.
//!
//! Speaks the wire shape of the hosted backend: a password-grant token
//! endpoint for credentials and a REST profile table keyed by user id.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{
    identity::{AuthError, AuthResult, IdentityService},
    models::{ProfileUpdate, UserProfile},
};

/// [`IdentityService`] backed by the hosted auth/REST endpoints.
pub struct HttpIdentityService {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

impl HttpIdentityService {
    /// Create a service client for the given base URL and API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn profiles_url(&self) -> String {
        format!("{}/rest/v1/profiles", self.base_url)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("apikey", &self.api_key)
    }
}

fn service_error(err: reqwest::Error) -> AuthError {
    AuthError::Service(err.to_string())
}

async fn unexpected_status(response: reqwest::Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AuthError::Service(format!("unexpected status {status}: {body}"))
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn verify_credentials(&self, email: &str, password: &str) -> AuthResult<String> {
        let response = self
            .request(self.client.post(self.auth_url("token?grant_type=password")))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(service_error)?;

        match response.status() {
            StatusCode::OK => {
                let token: TokenResponse = response.json().await.map_err(service_error)?;
                Ok(token.user.id)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(AuthError::InvalidCredentials)
            }
            _ => Err(unexpected_status(response).await),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<String> {
        let response = self
            .request(self.client.post(self.auth_url("signup")))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(service_error)?;

        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        let user: AuthUser = response.json().await.map_err(service_error)?;
        Ok(user.id)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let response = self
            .request(self.client.post(self.auth_url("logout")))
            .send()
            .await
            .map_err(service_error)?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        Ok(())
    }

    async fn fetch_profile(&self, user_id: &str) -> AuthResult<UserProfile> {
        let response = self
            .request(self.client.get(self.profiles_url()))
            .query(&[("id", format!("eq.{user_id}")), ("select", "*".into())])
            .send()
            .await
            .map_err(service_error)?;

        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        let mut rows: Vec<UserProfile> = response.json().await.map_err(service_error)?;
        match rows.pop() {
            Some(profile) => Ok(profile),
            None => Err(AuthError::ProfileMissing),
        }
    }

    async fn insert_profile(&self, profile: &UserProfile) -> AuthResult<()> {
        let response = self
            .request(self.client.post(self.profiles_url()))
            .json(profile)
            .send()
            .await
            .map_err(service_error)?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        Ok(())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> AuthResult<()> {
        let response = self
            .request(self.client.patch(self.profiles_url()))
            .query(&[("id", format!("eq.{user_id}"))])
            .json(update)
            .send()
            .await
            .map_err(service_error)?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        Ok(())
    }

    async fn delete_account(&self, user_id: &str) -> AuthResult<()> {
        let response = self
            .request(
                self.client
                    .delete(self.auth_url(&format!("admin/users/{user_id}"))),
            )
            .send()
            .await
            .map_err(service_error)?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        Ok(())
    }
}
