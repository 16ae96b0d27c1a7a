//! User Aggregate
//!
//! The backend hands users back in several shapes: the role may be a string, a nested object,
//! a `role_name`, or a numeric `role_id`. [`RawUser::normalize`] is the one place those shapes
//! are inspected; everything downstream works with [`User`] and its canonical [`Role`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use super::UserId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[default]
    #[serde(rename = "cliente")]
    Customer,
}

impl Role {
    /// Numeric role id the backend expects on writes.
    pub fn id(self) -> i64 { match self { Self::Admin => 1, Self::Customer => 2 } }
    pub fn from_id(id: i64) -> Self { if id == 1 { Self::Admin } else { Self::Customer } }
    pub fn from_name(name: &str) -> Self { if name.trim().eq_ignore_ascii_case("admin") { Self::Admin } else { Self::Customer } }
    pub fn as_str(self) -> &'static str { match self { Self::Admin => "admin", Self::Customer => "cliente" } }
}

/// Normalized user record. It has no password field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub shipping_address: String,
    pub role: Role,
    #[serde(default)]
    pub blocked: bool,
}

impl User {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
    pub fn full_name(&self) -> String { format!("{} {}", self.first_name, self.last_name).trim().to_string() }
}

/// User exactly as the backend returns it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawUser {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub role: Option<Value>,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub role_id: Option<Value>,
    #[serde(default)]
    pub blocked: Option<bool>,
}

impl RawUser {
    pub fn normalize(self) -> User {
        let role = canonical_role(self.role.as_ref(), self.role_name.as_deref(), self.role_id.as_ref());
        User {
            id: self.id,
            email: self.email,
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            shipping_address: self.shipping_address.unwrap_or_default(),
            role,
            blocked: self.blocked.unwrap_or(false),
        }
    }
}

const ROLE_OBJECT_KEYS: [&str; 4] = ["name", "title", "rol", "role"];

/// Canonical role. Precedence: string `role`, then the `role` object's name, then `role_name`,
/// then a `role_id` object, then a numeric id in `role_id` or `role`. Defaults to customer.
pub fn canonical_role(role: Option<&Value>, role_name: Option<&str>, role_id: Option<&Value>) -> Role {
    if let Some(name) = role.and_then(Value::as_str).filter(|s| !s.trim().is_empty()) {
        return Role::from_name(name);
    }
    if let Some(name) = role.and_then(|r| r.get("name")).and_then(Value::as_str).filter(|s| !s.trim().is_empty()) {
        return Role::from_name(name);
    }
    if let Some(name) = role_name.filter(|s| !s.trim().is_empty()) {
        return Role::from_name(name);
    }
    if let Some(obj) = role_id.filter(|v| v.is_object()) {
        let name = ROLE_OBJECT_KEYS.iter().find_map(|k| obj.get(*k).and_then(Value::as_str)).unwrap_or_default();
        return if name.to_lowercase().contains("admin") { Role::Admin } else { Role::Customer };
    }
    role_id.and_then(numeric_id).or_else(|| role.and_then(numeric_id)).map(Role::from_id).unwrap_or_default()
}

fn numeric_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Body of `POST /auth/signup`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Signup {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub shipping_address: String,
    pub phone: String,
}

/// Admin-side user creation; goes through signup with an explicit role.
#[derive(Clone, Debug, Serialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub shipping_address: String,
    pub role_id: i64,
    pub blocked: bool,
}

impl NewUser {
    pub fn new(details: Signup, role: Role) -> Self {
        Self {
            email: details.email, password: details.password, first_name: details.first_name,
            last_name: details.last_name, phone: details.phone, shipping_address: details.shipping_address,
            role_id: role.id(), blocked: false,
        }
    }
}

/// Profile fields a shopper may edit. `None` keeps the current value.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub shipping_address: Option<String>,
}

/// Body of the self-service `PATCH /user/{id}`. The email and numeric role are always resent
/// so the backend does not null them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfilePatch {
    pub email: String,
    pub role: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub shipping_address: String,
}

impl ProfilePatch {
    pub fn merge(current: &User, update: ProfileUpdate) -> Self {
        Self {
            email: current.email.clone(),
            role: current.role.id(),
            first_name: update.first_name.unwrap_or_else(|| current.first_name.clone()),
            last_name: update.last_name.unwrap_or_else(|| current.last_name.clone()),
            phone: update.phone.unwrap_or_else(|| current.phone.clone()),
            shipping_address: update.shipping_address.unwrap_or_else(|| current.shipping_address.clone()),
        }
    }

    pub fn apply_to(&self, user: &mut User) {
        user.first_name.clone_from(&self.first_name);
        user.last_name.clone_from(&self.last_name);
        user.phone.clone_from(&self.phone);
        user.shipping_address.clone_from(&self.shipping_address);
    }
}

/// Admin edit of another user. Blank strings are dropped rather than sent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<i64>,
}

impl UserPatch {
    pub fn email(mut self, v: &str) -> Self { self.email = non_blank(v); self }
    pub fn first_name(mut self, v: &str) -> Self { self.first_name = non_blank(v); self }
    pub fn last_name(mut self, v: &str) -> Self { self.last_name = non_blank(v); self }
    pub fn phone(mut self, v: &str) -> Self { self.phone = non_blank(v); self }
    pub fn shipping_address(mut self, v: &str) -> Self { self.shipping_address = non_blank(v); self }
    pub fn password(mut self, v: &str) -> Self { self.password = non_blank(v); self }
    pub fn role(mut self, role: Role) -> Self { self.role = Some(role.id()); self }
    pub fn is_empty(&self) -> bool { self == &Self::default() }
}

fn non_blank(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// Body for blocking or unblocking a user; the whole profile is resent alongside `blocked`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockPatch {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub shipping_address: String,
    pub role: i64,
    pub blocked: bool,
}

impl BlockPatch {
    pub fn new(user: &User, blocked: bool) -> Self {
        Self {
            email: user.email.clone(), first_name: user.first_name.clone(), last_name: user.last_name.clone(),
            phone: user.phone.clone(), shipping_address: user.shipping_address.clone(), role: user.role.id(), blocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn role_of(v: Value) -> Role { serde_json::from_value::<RawUser>(v).unwrap().normalize().role }

    #[test]
    fn test_string_role_wins() {
        assert_eq!(role_of(json!({ "id": 1, "role": "Admin", "role_id": 2 })), Role::Admin);
        assert_eq!(role_of(json!({ "id": 1, "role": "cliente", "role_id": 1 })), Role::Customer);
    }

    #[test]
    fn test_role_object_beats_numeric_id() {
        assert_eq!(role_of(json!({ "id": 1, "role": { "name": "ADMIN" }, "role_id": 2 })), Role::Admin);
        assert_eq!(role_of(json!({ "id": 1, "role_name": "admin", "role_id": 2 })), Role::Admin);
        assert_eq!(role_of(json!({ "id": 1, "role_id": { "title": "Administrador" } })), Role::Admin);
        assert_eq!(role_of(json!({ "id": 1, "role": { "name": "" }, "role_id": 1 })), Role::Admin);
    }

    #[test]
    fn test_numeric_role_id() {
        assert_eq!(role_of(json!({ "id": 1, "role_id": 1 })), Role::Admin);
        assert_eq!(role_of(json!({ "id": 1, "role_id": 2 })), Role::Customer);
        assert_eq!(role_of(json!({ "id": 1, "role_id": 9 })), Role::Customer);
        assert_eq!(role_of(json!({ "id": 1, "role": 1 })), Role::Admin);
        assert_eq!(role_of(json!({ "id": 1, "role": "", "role_id": "1" })), Role::Admin);
        assert_eq!(role_of(json!({ "id": 1 })), Role::Customer);
    }

    #[test]
    fn test_normalize_drops_password_and_defaults_blocked() {
        let user = serde_json::from_value::<RawUser>(json!({ "id": 3, "email": "goku@kame.house", "password": "hash" })).unwrap().normalize();
        let stored = serde_json::to_value(&user).unwrap();
        assert!(stored.get("password").is_none());
        assert_eq!(stored["role"], "cliente");
        assert!(!user.blocked);
    }

    #[test]
    fn test_user_patch_skips_blank_fields() {
        let patch = UserPatch::default().email("  ").first_name(" Krillin ").password(" s3cret ").role(Role::Admin);
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "first_name": "Krillin", "password": "s3cret", "role": 1 }));
        assert!(UserPatch::default().phone("").is_empty());
    }

    #[test]
    fn test_profile_patch_keeps_email_and_role() {
        let user = User { id: 5, email: "bulma@capsule.corp".into(), first_name: "Bulma".into(), last_name: String::new(), phone: "123".into(), shipping_address: "West City".into(), role: Role::Admin, blocked: false };
        let patch = ProfilePatch::merge(&user, ProfileUpdate { last_name: Some("Brief".into()), ..ProfileUpdate::default() });
        assert_eq!(patch.email, "bulma@capsule.corp");
        assert_eq!(patch.role, 1);
        assert_eq!(patch.last_name, "Brief");
        assert_eq!(patch.phone, "123");
    }
}
