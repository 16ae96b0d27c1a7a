//! Test Helpers


pub(crate) use fake_store::FakeStore;

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;

use crate::domain::aggregates::Role;
use crate::gateway::{AuthResponse, MockAuthGateway};
use crate::services::SessionStore;
use crate::storage::MemoryStorage;

/// A session signed in through a mocked login, backed by in-memory storage.
pub(crate) async fn signed_in(role: Role) -> crate::Result<SessionStore> {
    let user = json!({ "id": role.id() * 10, "email": format!("{}@kame.house", role.as_str()), "role": role.as_str() });
    let mut gateway = MockAuthGateway::new();
    gateway.expect_login().returning(move |_, _| Ok(AuthResponse {
        auth_token: Some("test-token".into()),
        user: Some(serde_json::from_value(user.clone()).unwrap_or_default()),
    }));
    gateway.expect_logout().returning(|_| Ok(()));

    let mut sessions = SessionStore::new(Arc::new(gateway), Arc::new(MemoryStorage::new()), Duration::days(1), Duration::minutes(2));
    sessions.login("test@kame.house", "pw").await?;
    Ok(sessions)
}
