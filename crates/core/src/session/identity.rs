//! Contract for the hosted identity backend.
//!
//! Credential verification and profile records live in an external service;
//! this crate consumes it as a capability and never sees passwords beyond
//! passing them through.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{ProfileUpdate, UserProfile};

/// Failures surfaced by the identity service and by local session policy.
/// These are values handed back to the caller, never panics.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The service rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// The supplied email does not look like an email address.
    #[error("invalid email address")]
    InvalidEmail,
    /// The account exists but was deactivated.
    #[error("account is deactivated")]
    AccountInactive,
    /// The sign-in path requires a role the account does not hold.
    #[error("insufficient role for this sign-in")]
    InsufficientRole,
    /// Credentials were accepted but no profile record exists.
    #[error("no profile found for account")]
    ProfileMissing,
    /// An operation that needs a session was called without one.
    #[error("no active session")]
    NotSignedIn,
    /// Transport or unexpected service failure.
    #[error("identity service error: {0}")]
    Service(String),
}

/// Result alias for identity and session operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// External identity service: credential store plus profile table.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Verify an email/password pair, returning the external user id.
    async fn verify_credentials(&self, email: &str, password: &str) -> AuthResult<String>;

    /// Create a new account, returning the external user id.
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<String>;

    /// Revoke the current external session.
    async fn sign_out(&self) -> AuthResult<()>;

    /// Fetch the profile record for an external user id.
    async fn fetch_profile(&self, user_id: &str) -> AuthResult<UserProfile>;

    /// Insert a freshly created profile record.
    async fn insert_profile(&self, profile: &UserProfile) -> AuthResult<()>;

    /// Patch the stored profile record.
    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> AuthResult<()>;

    /// Delete an account, used to compensate a failed signup.
    async fn delete_account(&self, user_id: &str) -> AuthResult<()>;
}
