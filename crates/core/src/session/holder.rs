//! The current-session holder.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::warn;

use crate::{
    events::{EventBus, StoreEvent},
    storage::{Storage, KEY_AUTH_USER},
};

use super::{
    identity::{AuthError, AuthResult, IdentityService},
    models::{ProfileUpdate, UserProfile, UserRole},
};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex"));

/// Holds the profile of the currently authenticated user, bootstrapped from
/// the session partition and kept in sync with the external identity
/// service.
///
/// A stored session is only accepted when it parses and carries a non-empty
/// user id; anything else clears the partition and starts signed out.
pub struct SessionHolder {
    storage: Storage,
    identity: Arc<dyn IdentityService>,
    events: EventBus,
    current: RwLock<Option<UserProfile>>,
}

impl SessionHolder {
    /// Create the holder, bootstrapping the session from durable storage.
    pub fn new(storage: Storage, identity: Arc<dyn IdentityService>, events: EventBus) -> Self {
        let current = bootstrap(&storage);
        Self {
            storage,
            identity,
            events,
            current: RwLock::new(current),
        }
    }

    /// The currently held session, if any.
    pub fn current(&self) -> Option<UserProfile> {
        self.current.read().clone()
    }

    /// Whether a session is held.
    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<UserProfile> {
        self.login_with(email, password, false).await
    }

    /// Sign in through the admin-only path; non-admin accounts are rejected
    /// and their external session revoked.
    pub async fn login_admin(&self, email: &str, password: &str) -> AuthResult<UserProfile> {
        self.login_with(email, password, true).await
    }

    async fn login_with(
        &self,
        email: &str,
        password: &str,
        admin_only: bool,
    ) -> AuthResult<UserProfile> {
        let user_id = self.identity.verify_credentials(email, password).await?;
        let profile = self.identity.fetch_profile(&user_id).await?;

        if profile.is_active == Some(false) {
            self.revoke_external().await;
            return Err(AuthError::AccountInactive);
        }
        if admin_only && !profile.role.is_admin() {
            self.revoke_external().await;
            return Err(AuthError::InsufficientRole);
        }

        self.install(profile.clone());
        Ok(profile)
    }

    /// Create an account and its profile record. When the profile insert
    /// fails after the account was created, the account is deleted again so
    /// no orphaned credential remains.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> AuthResult<UserProfile> {
        let email = email.trim();
        if !EMAIL_RE.is_match(email) {
            return Err(AuthError::InvalidEmail);
        }

        let user_id = self.identity.sign_up(email, password).await?;
        let profile = UserProfile {
            id: user_id.clone(),
            email: email.to_string(),
            name: name.trim().to_string(),
            role,
            profile_image: None,
            can_volunteer: Some(role != UserRole::Victim),
            is_active: Some(true),
        };

        if let Err(err) = self.identity.insert_profile(&profile).await {
            if let Err(cleanup_err) = self.identity.delete_account(&user_id).await {
                warn!("failed to delete account after profile insert failure: {cleanup_err}");
            }
            return Err(err);
        }

        self.install(profile.clone());
        Ok(profile)
    }

    /// Revoke the external session and clear the held one.
    pub async fn logout(&self) {
        self.revoke_external().await;
        if let Err(err) = self.storage.remove(KEY_AUTH_USER) {
            warn!("failed to clear stored session: {err:#}");
        }
        *self.current.write() = None;
        self.events.emit(StoreEvent::AuthStateChanged);
    }

    /// Patch the allowed profile fields on the identity service and merge
    /// the patch into the held session.
    pub async fn update(&self, patch: ProfileUpdate) -> AuthResult<UserProfile> {
        let Some(mut profile) = self.current() else {
            return Err(AuthError::NotSignedIn);
        };
        self.identity.update_profile(&profile.id, &patch).await?;
        patch.apply(&mut profile);
        self.install(profile.clone());
        Ok(profile)
    }

    /// Re-read the stored session after an external change, notifying
    /// subscribers when it differs from the held one.
    pub fn reload(&self) {
        let fresh = bootstrap(&self.storage);
        let mut current = self.current.write();
        if *current != fresh {
            *current = fresh;
            drop(current);
            self.events.emit(StoreEvent::AuthStateChanged);
        }
    }

    fn install(&self, profile: UserProfile) {
        if let Err(err) = self.storage.write_value(KEY_AUTH_USER, &profile) {
            warn!("failed to persist session: {err:#}");
        }
        *self.current.write() = Some(profile);
        self.events.emit(StoreEvent::AuthStateChanged);
    }

    async fn revoke_external(&self) {
        if let Err(err) = self.identity.sign_out().await {
            warn!("failed to revoke external session: {err}");
        }
    }
}

/// Read the stored session, accepting only a parseable profile with a
/// non-empty id. Everything else clears the partition (fail closed).
fn bootstrap(storage: &Storage) -> Option<UserProfile> {
    match storage.read_value::<UserProfile>(KEY_AUTH_USER) {
        Ok(Some(profile)) if !profile.id.trim().is_empty() => Some(profile),
        Ok(Some(_)) => {
            warn!("stored session has no user id, clearing");
            clear_session_key(storage);
            None
        }
        Ok(None) => None,
        Err(err) => {
            warn!("stored session unreadable, clearing: {err:#}");
            clear_session_key(storage);
            None
        }
    }
}

fn clear_session_key(storage: &Storage) {
    if let Err(err) = storage.remove(KEY_AUTH_USER) {
        warn!("failed to clear stored session: {err:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeIdentity {
        /// email -> (password, user id)
        accounts: Mutex<HashMap<String, (String, String)>>,
        profiles: Mutex<HashMap<String, UserProfile>>,
        fail_insert: bool,
        deleted: Mutex<Vec<String>>,
        sign_outs: Mutex<u32>,
    }

    impl FakeIdentity {
        fn with_account(email: &str, password: &str, profile: UserProfile) -> Self {
            let identity = Self::default();
            identity
                .accounts
                .lock()
                .insert(email.to_string(), (password.to_string(), profile.id.clone()));
            identity.profiles.lock().insert(profile.id.clone(), profile);
            identity
        }

        fn sign_out_count(&self) -> u32 {
            *self.sign_outs.lock()
        }
    }

    #[async_trait]
    impl IdentityService for FakeIdentity {
        async fn verify_credentials(&self, email: &str, password: &str) -> AuthResult<String> {
            match self.accounts.lock().get(email) {
                Some((stored, id)) if stored == password => Ok(id.clone()),
                _ => Err(AuthError::InvalidCredentials),
            }
        }

        async fn sign_up(&self, email: &str, password: &str) -> AuthResult<String> {
            let mut accounts = self.accounts.lock();
            let id = format!("u{}", accounts.len() + 1);
            accounts.insert(email.to_string(), (password.to_string(), id.clone()));
            Ok(id)
        }

        async fn sign_out(&self) -> AuthResult<()> {
            *self.sign_outs.lock() += 1;
            Ok(())
        }

        async fn fetch_profile(&self, user_id: &str) -> AuthResult<UserProfile> {
            self.profiles
                .lock()
                .get(user_id)
                .cloned()
                .ok_or(AuthError::ProfileMissing)
        }

        async fn insert_profile(&self, profile: &UserProfile) -> AuthResult<()> {
            if self.fail_insert {
                return Err(AuthError::Service("profile table unavailable".into()));
            }
            self.profiles
                .lock()
                .insert(profile.id.clone(), profile.clone());
            Ok(())
        }

        async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> AuthResult<()> {
            let mut profiles = self.profiles.lock();
            let profile = profiles.get_mut(user_id).ok_or(AuthError::ProfileMissing)?;
            update.apply(profile);
            Ok(())
        }

        async fn delete_account(&self, user_id: &str) -> AuthResult<()> {
            self.deleted.lock().push(user_id.to_string());
            Ok(())
        }
    }

    fn profile(id: &str, role: UserRole) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: "user@example.org".to_string(),
            name: "User".to_string(),
            role,
            profile_image: None,
            can_volunteer: Some(true),
            is_active: Some(true),
        }
    }

    fn holder_with(
        root: &std::path::Path,
        identity: Arc<FakeIdentity>,
    ) -> (SessionHolder, EventBus) {
        let events = EventBus::new();
        let holder = SessionHolder::new(Storage::new(root), identity, events.clone());
        (holder, events)
    }

    #[test]
    fn bootstrap_accepts_a_stored_profile() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        storage
            .write_value(KEY_AUTH_USER, &profile("u1", UserRole::Volunteer))
            .expect("write session");

        let (holder, _) = holder_with(dir.path(), Arc::new(FakeIdentity::default()));
        assert_eq!(holder.current().map(|p| p.id), Some("u1".to_string()));
        assert!(holder.is_authenticated());
    }

    #[test]
    fn bootstrap_clears_a_session_with_empty_id() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        storage
            .write_value(KEY_AUTH_USER, &profile("", UserRole::Volunteer))
            .expect("write session");

        let (holder, _) = holder_with(dir.path(), Arc::new(FakeIdentity::default()));
        assert!(holder.current().is_none());
        assert!(!storage.contains(KEY_AUTH_USER));
    }

    #[test]
    fn bootstrap_clears_an_unparsable_session() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        storage
            .write_value(KEY_AUTH_USER, &serde_json::json!({ "id": "" }))
            .expect("write session");

        let (holder, _) = holder_with(dir.path(), Arc::new(FakeIdentity::default()));
        assert!(holder.current().is_none());
        assert!(!storage.contains(KEY_AUTH_USER));
    }

    #[tokio::test]
    async fn login_installs_and_persists_the_profile() {
        let dir = tempdir().expect("tempdir");
        let identity = Arc::new(FakeIdentity::with_account(
            "user@example.org",
            "hunter2",
            profile("u1", UserRole::Volunteer),
        ));
        let (holder, events) = holder_with(dir.path(), identity);
        let mut rx = events.subscribe();

        let session = holder
            .login("user@example.org", "hunter2")
            .await
            .expect("login");
        assert_eq!(session.id, "u1");
        assert_eq!(holder.current().map(|p| p.id), Some("u1".to_string()));

        let storage = Storage::new(dir.path());
        let stored: Option<UserProfile> = storage.read_value(KEY_AUTH_USER).expect("read");
        assert_eq!(stored.map(|p| p.id), Some("u1".to_string()));
        assert_eq!(rx.try_recv().ok(), Some(StoreEvent::AuthStateChanged));
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let dir = tempdir().expect("tempdir");
        let identity = Arc::new(FakeIdentity::with_account(
            "user@example.org",
            "hunter2",
            profile("u1", UserRole::Volunteer),
        ));
        let (holder, _) = holder_with(dir.path(), identity);

        let err = holder.login("user@example.org", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(holder.current().is_none());
    }

    #[tokio::test]
    async fn login_rejects_inactive_accounts_and_revokes() {
        let dir = tempdir().expect("tempdir");
        let mut inactive = profile("u1", UserRole::Volunteer);
        inactive.is_active = Some(false);
        let identity = Arc::new(FakeIdentity::with_account(
            "user@example.org",
            "hunter2",
            inactive,
        ));
        let (holder, _) = holder_with(dir.path(), identity.clone());

        let err = holder
            .login("user@example.org", "hunter2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountInactive));
        assert_eq!(identity.sign_out_count(), 1);
        assert!(holder.current().is_none());
    }

    #[tokio::test]
    async fn admin_login_rejects_non_admin_roles_and_revokes() {
        let dir = tempdir().expect("tempdir");
        let identity = Arc::new(FakeIdentity::with_account(
            "user@example.org",
            "hunter2",
            profile("u1", UserRole::Volunteer),
        ));
        let (holder, _) = holder_with(dir.path(), identity.clone());

        let err = holder
            .login_admin("user@example.org", "hunter2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InsufficientRole));
        assert_eq!(identity.sign_out_count(), 1);
        assert!(holder.current().is_none());
    }

    #[tokio::test]
    async fn signup_defaults_follow_the_role() {
        let dir = tempdir().expect("tempdir");
        let identity = Arc::new(FakeIdentity::default());
        let (holder, _) = holder_with(dir.path(), identity);

        let volunteer = holder
            .signup("vol@example.org", "hunter2", "Vol", UserRole::Volunteer)
            .await
            .expect("signup");
        assert_eq!(volunteer.can_volunteer, Some(true));
        assert_eq!(volunteer.is_active, Some(true));
        holder.logout().await;

        let victim = holder
            .signup("victim@example.org", "hunter2", "Vic", UserRole::Victim)
            .await
            .expect("signup");
        assert_eq!(victim.can_volunteer, Some(false));
    }

    #[tokio::test]
    async fn signup_rejects_malformed_emails() {
        let dir = tempdir().expect("tempdir");
        let (holder, _) = holder_with(dir.path(), Arc::new(FakeIdentity::default()));

        let err = holder
            .signup("not-an-email", "hunter2", "X", UserRole::Volunteer)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail));
    }

    #[tokio::test]
    async fn failed_profile_insert_deletes_the_new_account() {
        let dir = tempdir().expect("tempdir");
        let identity = Arc::new(FakeIdentity {
            fail_insert: true,
            ..FakeIdentity::default()
        });
        let (holder, _) = holder_with(dir.path(), identity.clone());

        let err = holder
            .signup("new@example.org", "hunter2", "New", UserRole::Volunteer)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Service(_)));
        assert_eq!(identity.deleted.lock().clone(), vec!["u1".to_string()]);
        assert!(holder.current().is_none());
        assert!(!Storage::new(dir.path()).contains(KEY_AUTH_USER));
    }

    #[tokio::test]
    async fn logout_revokes_and_clears() {
        let dir = tempdir().expect("tempdir");
        let identity = Arc::new(FakeIdentity::with_account(
            "user@example.org",
            "hunter2",
            profile("u1", UserRole::Volunteer),
        ));
        let (holder, _) = holder_with(dir.path(), identity.clone());
        holder
            .login("user@example.org", "hunter2")
            .await
            .expect("login");

        holder.logout().await;
        assert!(holder.current().is_none());
        assert_eq!(identity.sign_out_count(), 1);
        assert!(!Storage::new(dir.path()).contains(KEY_AUTH_USER));
    }

    #[tokio::test]
    async fn update_merges_the_patch_into_the_session() {
        let dir = tempdir().expect("tempdir");
        let identity = Arc::new(FakeIdentity::with_account(
            "user@example.org",
            "hunter2",
            profile("u1", UserRole::Volunteer),
        ));
        let (holder, _) = holder_with(dir.path(), identity.clone());
        holder
            .login("user@example.org", "hunter2")
            .await
            .expect("login");

        let patch = ProfileUpdate {
            name: Some("Renamed".to_string()),
            can_volunteer: Some(false),
            ..ProfileUpdate::default()
        };
        let updated = holder.update(patch).await.expect("update");
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.can_volunteer, Some(false));
        // Untouched fields survive.
        assert_eq!(updated.email, "user@example.org");

        // The external record was patched too.
        let external = identity.fetch_profile("u1").await.expect("profile");
        assert_eq!(external.name, "Renamed");

        let stored: Option<UserProfile> = Storage::new(dir.path())
            .read_value(KEY_AUTH_USER)
            .expect("read");
        assert_eq!(stored.map(|p| p.name), Some("Renamed".to_string()));
    }

    #[tokio::test]
    async fn update_without_session_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let (holder, _) = holder_with(dir.path(), Arc::new(FakeIdentity::default()));

        let err = holder.update(ProfileUpdate::default()).await.unwrap_err();
        assert!(matches!(err, AuthError::NotSignedIn));
    }

    #[test]
    fn reload_picks_up_external_session_changes() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        let (holder, events) = holder_with(dir.path(), Arc::new(FakeIdentity::default()));
        assert!(holder.current().is_none());
        let mut rx = events.subscribe();

        storage
            .write_value(KEY_AUTH_USER, &profile("u7", UserRole::Ngo))
            .expect("write session");
        holder.reload();
        assert_eq!(holder.current().map(|p| p.id), Some("u7".to_string()));
        assert_eq!(rx.try_recv().ok(), Some(StoreEvent::AuthStateChanged));

        // Unchanged reload does not notify.
        holder.reload();
        assert!(rx.try_recv().is_err());
    }
}
