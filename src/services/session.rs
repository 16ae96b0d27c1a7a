//! Session Store
//!
//! Owns the auth token and the signed-in user. Every change is mirrored to local storage under
//! `auth_token`, `auth_user` and `auth_exp`, and any failure that leaves the session in doubt
//! purges all three.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::instrument;

use crate::domain::aggregates::{ProfilePatch, ProfileUpdate, RawUser, Signup, User};
use crate::gateway::{AuthGateway, AuthResponse, GatewayError};
use crate::storage::{read_json, write_json, LocalStorage, AUTH_EXPIRY_KEY, AUTH_TOKEN_KEY, AUTH_USER_KEY};
use crate::{AuthError, Result, StorefrontError};

#[derive(Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"***").field("user", &self.user).field("expires_at", &self.expires_at).finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenewalOutcome {
    NotSignedIn,
    NotDue,
    Renewed,
    LoggedOut,
}

pub struct SessionStore {
    gateway: Arc<dyn AuthGateway>,
    storage: Arc<dyn LocalStorage>,
    token_ttl: Duration,
    renewal_margin: Duration,
    session: Option<Session>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore").field("session", &self.session).finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(gateway: Arc<dyn AuthGateway>, storage: Arc<dyn LocalStorage>, token_ttl: Duration, renewal_margin: Duration) -> Self {
        Self { gateway, storage, token_ttl, renewal_margin, session: None }
    }

    pub fn session(&self) -> Option<&Session> { self.session.as_ref() }
    pub fn user(&self) -> Option<&User> { self.session.as_ref().map(|s| &s.user) }
    pub fn token(&self) -> Option<&str> { self.session.as_ref().map(|s| s.token.as_str()) }
    pub fn is_signed_in(&self) -> bool { self.session.is_some() }

    /// Rebuilds the session from storage. Returns whether one was found. A stored user that
    /// cannot be read is discarded together with the rest of the session.
    pub fn restore(&mut self) -> Result<bool> {
        let Some(token) = self.storage.get(AUTH_TOKEN_KEY)?.filter(|t| !t.is_empty()) else { return Ok(false) };
        let user = match read_json::<RawUser>(self.storage.as_ref(), AUTH_USER_KEY) {
            Ok(Some(raw)) => raw.normalize(),
            Ok(None) => {
                self.purge()?;
                return Ok(false);
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable stored user");
                self.purge()?;
                return Ok(false);
            }
        };
        let expires_at = self
            .storage
            .get(AUTH_EXPIRY_KEY)?
            .and_then(|ms| ms.trim().parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(|| self.expiry_for(&token, Utc::now()));
        tracing::debug!(user_id = user.id, %expires_at, "session restored");
        self.session = Some(Session { token, user, expires_at });
        Ok(true)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<&Session> {
        let response = self.gateway.login(email, password).await.map_err(auth_failure)?;
        self.establish(response).await
    }

    #[instrument(skip_all, fields(email = %details.email))]
    pub async fn signup(&mut self, details: &Signup) -> Result<&Session> {
        let response = self.gateway.signup(details).await.map_err(auth_failure)?;
        self.establish(response).await
    }

    /// Remote invalidation is best effort; local state is purged whatever it returns.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            match self.gateway.logout(&session.token).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => tracing::debug!("token was already invalidated"),
                Err(e) => tracing::warn!(error = %e, "remote logout failed"),
            }
        }
        self.purge()
    }

    /// Exchanges the current token for a fresh one. Any failure signs the user out.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<&Session> {
        let token = self.token().ok_or(AuthError::NotSignedIn)?.to_string();
        let response = match self.gateway.refresh_token(&token).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, signing out");
                self.logout().await?;
                return Err(e.into());
            }
        };
        let established = self.establish(response).await.map(|_| ());
        if let Err(e) = established {
            self.logout().await?;
            return Err(e);
        }
        self.session.as_ref().ok_or_else(|| AuthError::NotSignedIn.into())
    }

    /// Prompts for renewal once `now` is within the renewal margin of expiry. Declining, an
    /// expired token or a failed refresh all end the session.
    pub async fn check_renewal(&mut self, now: DateTime<Utc>, prompt: impl FnOnce(DateTime<Utc>) -> bool) -> Result<RenewalOutcome> {
        let Some(expires_at) = self.session.as_ref().map(|s| s.expires_at) else { return Ok(RenewalOutcome::NotSignedIn) };
        if now < expires_at - self.renewal_margin {
            return Ok(RenewalOutcome::NotDue);
        }
        if now >= expires_at {
            tracing::info!(%expires_at, "session expired");
            self.logout().await?;
            return Ok(RenewalOutcome::LoggedOut);
        }
        if !prompt(expires_at) {
            tracing::info!("renewal declined");
            self.logout().await?;
            return Ok(RenewalOutcome::LoggedOut);
        }
        match self.refresh().await {
            Ok(_) => Ok(RenewalOutcome::Renewed),
            Err(StorefrontError::Storage(e)) => Err(e.into()),
            Err(_) => Ok(RenewalOutcome::LoggedOut),
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch_current_user(&mut self) -> Result<&User> {
        let token = self.token().ok_or(AuthError::NotSignedIn)?.to_string();
        let user = self.gateway.me(&token).await?.normalize();
        write_json(self.storage.as_ref(), AUTH_USER_KEY, &user)?;
        let session = self.session.as_mut().ok_or(AuthError::NotSignedIn)?;
        session.user = user;
        Ok(&session.user)
    }

    /// Saves profile edits. Fields left as `None` keep their current value; the role is untouched.
    #[instrument(skip_all)]
    pub async fn update_profile(&mut self, update: ProfileUpdate) -> Result<&User> {
        let session = self.session.as_ref().ok_or(AuthError::NotSignedIn)?;
        let patch = ProfilePatch::merge(&session.user, update);
        self.gateway.update_profile(session.user.id, &patch, &session.token).await?;

        let session = self.session.as_mut().ok_or(AuthError::NotSignedIn)?;
        patch.apply_to(&mut session.user);
        write_json(self.storage.as_ref(), AUTH_USER_KEY, &session.user)?;
        Ok(&session.user)
    }

    pub fn require_admin(&self) -> Result<&Session> {
        let session = self.session.as_ref().ok_or(AuthError::NotSignedIn)?;
        if !session.user.is_admin() { return Err(AuthError::NotAdmin.into()); }
        Ok(session)
    }

    async fn establish(&mut self, response: AuthResponse) -> Result<&Session> {
        let token = match response.token() {
            Ok(token) => token.to_string(),
            Err(_) => {
                self.purge()?;
                return Err(AuthError::MissingToken.into());
            }
        };
        let raw = match response.user {
            Some(user) => Some(user),
            None => match self.gateway.me(&token).await {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "could not load the signed-in user");
                    None
                }
            },
        };
        let Some(user) = raw.map(RawUser::normalize) else {
            self.purge()?;
            return Err(AuthError::MissingUser.into());
        };
        if user.blocked {
            tracing::warn!(user_id = user.id, "blocked account tried to sign in");
            self.purge()?;
            return Err(AuthError::Blocked.into());
        }

        let expires_at = self.expiry_for(&token, Utc::now());
        self.storage.set(AUTH_TOKEN_KEY, &token)?;
        write_json(self.storage.as_ref(), AUTH_USER_KEY, &user)?;
        self.storage.set(AUTH_EXPIRY_KEY, &expires_at.timestamp_millis().to_string())?;
        tracing::info!(user_id = user.id, role = user.role.as_str(), %expires_at, "signed in");
        Ok(&*self.session.insert(Session { token, user, expires_at }))
    }

    fn expiry_for(&self, token: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        token_expiry(token).unwrap_or(now + self.token_ttl)
    }

    fn purge(&mut self) -> Result<()> {
        self.session = None;
        for key in [AUTH_TOKEN_KEY, AUTH_USER_KEY, AUTH_EXPIRY_KEY] {
            self.storage.remove(key)?;
        }
        Ok(())
    }
}

/// `exp` claim of a JWT, if the token is one and carries it.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp").and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))?;
    DateTime::from_timestamp(exp, 0)
}

/// Client errors from the auth endpoints mean the credentials were refused.
fn auth_failure(e: GatewayError) -> StorefrontError {
    match e {
        GatewayError::Status { status, body } if (400..500).contains(&status) => AuthError::Rejected { status, body }.into(),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Role;
    use crate::gateway::MockAuthGateway;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use testresult::TestResult;

    fn raw_user(body: Value) -> RawUser { serde_json::from_value(body).unwrap() }

    fn jwt(exp: i64) -> String {
        format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string()))
    }

    fn store(gateway: MockAuthGateway, storage: Arc<MemoryStorage>) -> SessionStore {
        SessionStore::new(Arc::new(gateway), storage, Duration::seconds(86_400), Duration::seconds(120))
    }

    fn signed_in(gateway: MockAuthGateway, storage: Arc<MemoryStorage>, expires_at: DateTime<Utc>) -> SessionStore {
        let mut store = store(gateway, storage);
        let user = raw_user(json!({ "id": 1, "email": "goku@kame.house" })).normalize();
        store.session = Some(Session { token: "old".into(), user, expires_at });
        store
    }

    #[tokio::test]
    async fn test_login_persists_normalized_session() -> TestResult {
        let mut gateway = MockAuthGateway::new();
        gateway.expect_login().returning(|_, _| Ok(AuthResponse {
            auth_token: Some(jwt(4_102_444_800)),
            user: Some(raw_user(json!({ "id": 7, "email": "bulma@capsule.corp", "role": { "name": "admin" }, "password": "hash" }))),
        }));
        let storage = Arc::new(MemoryStorage::new());
        let mut sessions = store(gateway, storage.clone());

        let session = sessions.login("bulma@capsule.corp", "pw").await?;
        assert_eq!(session.user.role, Role::Admin);
        assert_eq!(session.expires_at.timestamp(), 4_102_444_800);
        assert_eq!(storage.get(AUTH_EXPIRY_KEY)?.as_deref(), Some("4102444800000"));
        assert!(!storage.get(AUTH_USER_KEY)?.unwrap_or_default().contains("hash"));
        assert!(sessions.require_admin().is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_blocked_login_leaves_nothing_behind() -> TestResult {
        let mut gateway = MockAuthGateway::new();
        gateway.expect_login().returning(|_, _| Ok(AuthResponse {
            auth_token: Some("tok".into()),
            user: Some(raw_user(json!({ "id": 3, "email": "raditz@saiyan.net", "blocked": true }))),
        }));
        let storage = Arc::new(MemoryStorage::new());
        storage.set(AUTH_TOKEN_KEY, "stale")?;
        let mut sessions = store(gateway, storage.clone());

        let err = sessions.login("raditz@saiyan.net", "pw").await.unwrap_err();
        assert!(matches!(err, StorefrontError::Auth(AuthError::Blocked)));
        assert!(!sessions.is_signed_in());
        for key in [AUTH_TOKEN_KEY, AUTH_USER_KEY, AUTH_EXPIRY_KEY] {
            assert_eq!(storage.get(key)?, None);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_login_falls_back_to_me_and_ttl() -> TestResult {
        let mut gateway = MockAuthGateway::new();
        gateway.expect_login().returning(|_, _| Ok(AuthResponse { auth_token: Some("opaque".into()), user: None }));
        gateway.expect_me().withf(|token| token == "opaque").returning(|_| Ok(raw_user(json!({ "id": 2, "email": "krillin@kame.house", "role_id": 2 }))));
        let mut sessions = store(gateway, Arc::new(MemoryStorage::new()));

        let before = Utc::now();
        let session = sessions.login("krillin@kame.house", "pw").await?;
        assert_eq!(session.user.role, Role::Customer);
        assert!(session.expires_at >= before + Duration::seconds(86_400));
        assert!(matches!(sessions.require_admin(), Err(StorefrontError::Auth(AuthError::NotAdmin))));
        Ok(())
    }

    #[tokio::test]
    async fn test_login_without_user_is_rejected() -> TestResult {
        let mut gateway = MockAuthGateway::new();
        gateway.expect_login().returning(|_, _| Ok(AuthResponse { auth_token: Some("tok".into()), user: None }));
        gateway.expect_me().returning(|_| Err(GatewayError::Status { status: 500, body: String::new() }));
        let storage = Arc::new(MemoryStorage::new());
        let mut sessions = store(gateway, storage.clone());

        assert!(matches!(sessions.login("a@b.c", "pw").await, Err(StorefrontError::Auth(AuthError::MissingUser))));
        assert_eq!(storage.get(AUTH_TOKEN_KEY)?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_credentials_map_to_auth_error() {
        let mut gateway = MockAuthGateway::new();
        gateway.expect_login().returning(|_, _| Err(GatewayError::Status { status: 403, body: "Invalid Credentials.".into() }));
        let mut sessions = store(gateway, Arc::new(MemoryStorage::new()));
        assert!(matches!(sessions.login("a@b.c", "nope").await, Err(StorefrontError::Auth(AuthError::Rejected { status: 403, .. }))));
    }

    #[tokio::test]
    async fn test_logout_tolerates_not_found() -> TestResult {
        let mut gateway = MockAuthGateway::new();
        gateway.expect_logout().times(1).returning(|_| Err(GatewayError::Status { status: 404, body: String::new() }));
        let storage = Arc::new(MemoryStorage::new());
        storage.set(AUTH_TOKEN_KEY, "old")?;
        let mut sessions = signed_in(gateway, storage.clone(), Utc::now() + Duration::hours(1));

        sessions.logout().await?;
        assert!(!sessions.is_signed_in());
        assert_eq!(storage.get(AUTH_TOKEN_KEY)?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_round_trip() -> TestResult {
        let storage = Arc::new(MemoryStorage::new());
        let mut gateway = MockAuthGateway::new();
        gateway.expect_login().returning(|_, _| Ok(AuthResponse {
            auth_token: Some(jwt(4_102_444_800)),
            user: Some(raw_user(json!({ "id": 9, "email": "roshi@kame.house", "role": "admin" }))),
        }));
        store(gateway, storage.clone()).login("roshi@kame.house", "pw").await?;

        let mut restored = store(MockAuthGateway::new(), storage.clone());
        assert!(restored.restore()?);
        assert_eq!(restored.user().map(|u| u.role), Some(Role::Admin));
        assert_eq!(restored.session().map(|s| s.expires_at.timestamp()), Some(4_102_444_800));

        storage.set(AUTH_USER_KEY, "{broken")?;
        let mut broken = store(MockAuthGateway::new(), storage.clone());
        assert!(!broken.restore()?);
        assert_eq!(storage.get(AUTH_TOKEN_KEY)?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_renewal_not_due_and_declined() -> TestResult {
        let now = Utc::now();
        let mut gateway = MockAuthGateway::new();
        gateway.expect_logout().returning(|_| Ok(()));
        let mut sessions = signed_in(gateway, Arc::new(MemoryStorage::new()), now + Duration::minutes(10));

        assert_eq!(sessions.check_renewal(now, |_| panic!("not due yet")).await?, RenewalOutcome::NotDue);
        let due = now + Duration::minutes(9);
        assert_eq!(sessions.check_renewal(due, |_| false).await?, RenewalOutcome::LoggedOut);
        assert_eq!(sessions.check_renewal(due, |_| true).await?, RenewalOutcome::NotSignedIn);
        Ok(())
    }

    #[tokio::test]
    async fn test_renewal_accepted_refreshes_token() -> TestResult {
        let now = Utc::now();
        let mut gateway = MockAuthGateway::new();
        gateway.expect_refresh_token().withf(|t| t == "old").returning(|_| Ok(AuthResponse { auth_token: Some(jwt(4_102_444_800)), user: None }));
        gateway.expect_me().returning(|_| Ok(raw_user(json!({ "id": 1, "email": "goku@kame.house" }))));
        let storage = Arc::new(MemoryStorage::new());
        let mut sessions = signed_in(gateway, storage.clone(), now + Duration::seconds(60));

        assert_eq!(sessions.check_renewal(now, |_| true).await?, RenewalOutcome::Renewed);
        assert_ne!(sessions.token(), Some("old"));
        assert_eq!(storage.get(AUTH_TOKEN_KEY)?, sessions.token().map(str::to_string));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_refresh_signs_out() -> TestResult {
        let now = Utc::now();
        let mut gateway = MockAuthGateway::new();
        gateway.expect_refresh_token().returning(|_| Err(GatewayError::Status { status: 401, body: String::new() }));
        gateway.expect_logout().returning(|_| Ok(()));
        let mut sessions = signed_in(gateway, Arc::new(MemoryStorage::new()), now + Duration::seconds(60));

        assert_eq!(sessions.check_renewal(now, |_| true).await?, RenewalOutcome::LoggedOut);
        assert!(!sessions.is_signed_in());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_profile_keeps_role() -> TestResult {
        let mut gateway = MockAuthGateway::new();
        gateway.expect_update_profile()
            .withf(|id, patch, token| *id == 1 && patch.email == "goku@kame.house" && patch.role == 2 && patch.phone == "555" && token == "old")
            .returning(|_, _, _| Ok(()));
        let storage = Arc::new(MemoryStorage::new());
        let mut sessions = signed_in(gateway, storage.clone(), Utc::now() + Duration::hours(1));

        let user = sessions.update_profile(ProfileUpdate { phone: Some("555".into()), ..ProfileUpdate::default() }).await?;
        assert_eq!(user.phone, "555");
        assert_eq!(user.role, Role::Customer);
        assert!(storage.get(AUTH_USER_KEY)?.is_some_and(|raw| raw.contains("555")));
        Ok(())
    }

    #[test]
    fn test_token_expiry_decoding() {
        assert_eq!(token_expiry(&jwt(1_700_000_000)).map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(token_expiry("not-a-jwt"), None);
        assert_eq!(token_expiry("a.!!!.c"), None);
    }

    #[test]
    fn test_session_debug_hides_token() {
        let user = raw_user(json!({ "id": 1, "email": "goku@kame.house" })).normalize();
        let session = Session { token: "secret-token".into(), user, expires_at: Utc::now() };
        assert!(!format!("{session:?}").contains("secret-token"));
    }
}
