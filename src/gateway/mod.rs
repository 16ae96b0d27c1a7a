//! Remote Store Gateway
//!
//! Typed access to the hosted backend. Each resource gets its own trait so flows depend only on
//! what they call and tests can substitute any one of them.

mod http;

pub use http::{HttpGateway, HttpGatewayConfig};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::aggregates::{
    BlockPatch, BlogPost, BlogPostId, BlogPostPayload, ImageRef, NewOrder, NewUser, Order, OrderId,
    OrderStatus, Product, ProductDraft, ProductId, ProductPatch, ProfilePatch, RawUser, Signup,
    StatusPatch, UserId, UserPatch,
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status. The body is kept for diagnostics.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response did not carry an auth token")]
    MissingToken,
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::MissingToken => None,
        }
    }

    pub fn is_not_found(&self) -> bool { self.status() == Some(404) }
}

/// Response of login, signup and token refresh.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default, rename = "authToken", alias = "token", alias = "jwt")]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub user: Option<RawUser>,
}

impl AuthResponse {
    pub fn token(&self) -> Result<&str, GatewayError> {
        self.auth_token.as_deref().filter(|t| !t.is_empty()).ok_or(GatewayError::MissingToken)
    }
}

/// Catalog paging and search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductQuery {
    pub limit: u32,
    pub offset: u32,
    pub search: Option<String>,
}

impl Default for ProductQuery {
    fn default() -> Self { Self { limit: 12, offset: 0, search: None } }
}

impl ProductQuery {
    pub fn first(limit: u32) -> Self { Self { limit, ..Self::default() } }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("_limit", self.limit.to_string()), ("_offset", self.offset.to_string())];
        if let Some(q) = self.search.as_deref().filter(|q| !q.is_empty()) { params.push(("q", q.to_string())); }
        params
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, GatewayError>;
    async fn signup(&self, details: &Signup) -> Result<AuthResponse, GatewayError>;
    async fn logout(&self, token: &str) -> Result<(), GatewayError>;
    async fn refresh_token(&self, token: &str) -> Result<AuthResponse, GatewayError>;
    async fn me(&self, token: &str) -> Result<RawUser, GatewayError>;
    async fn update_profile(&self, id: UserId, patch: &ProfilePatch, token: &str) -> Result<(), GatewayError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn list_products(&self, query: &ProductQuery, token: &str) -> Result<Vec<Product>, GatewayError>;
    async fn create_product(&self, draft: &ProductDraft, token: &str) -> Result<Product, GatewayError>;
    async fn update_product(&self, id: ProductId, patch: &ProductPatch, token: &str) -> Result<Product, GatewayError>;
    async fn update_stock(&self, id: ProductId, stock: u32, token: &str) -> Result<Product, GatewayError>;
    async fn delete_product(&self, id: ProductId, token: &str) -> Result<(), GatewayError>;
    async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<ImageRef>, GatewayError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn create_order(&self, order: &NewOrder, token: &str) -> Result<Order, GatewayError>;
    async fn list_orders(&self, status: Option<OrderStatus>, token: &str) -> Result<Vec<Order>, GatewayError>;
    async fn get_order(&self, id: OrderId, token: &str) -> Result<Order, GatewayError>;
    async fn update_order_status(&self, id: OrderId, patch: &StatusPatch, token: &str) -> Result<Order, GatewayError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserGateway: Send + Sync {
    async fn list_users(&self, token: &str) -> Result<Vec<RawUser>, GatewayError>;
    async fn create_user(&self, user: &NewUser, token: &str) -> Result<AuthResponse, GatewayError>;
    async fn update_user(&self, id: UserId, patch: &UserPatch, token: &str) -> Result<(), GatewayError>;
    async fn set_blocked(&self, id: UserId, patch: &BlockPatch, token: &str) -> Result<(), GatewayError>;
    async fn delete_user(&self, id: UserId, token: &str) -> Result<(), GatewayError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlogGateway: Send + Sync {
    async fn list_posts(&self) -> Result<Vec<BlogPost>, GatewayError>;
    async fn list_all_posts(&self, token: &str) -> Result<Vec<BlogPost>, GatewayError>;
    async fn get_post(&self, id: BlogPostId) -> Result<BlogPost, GatewayError>;
    async fn create_post(&self, post: &BlogPostPayload, token: &str) -> Result<BlogPost, GatewayError>;
    async fn update_post(&self, id: BlogPostId, post: &BlogPostPayload, token: &str) -> Result<BlogPost, GatewayError>;
    async fn set_published(&self, id: BlogPostId, published: bool, token: &str) -> Result<BlogPost, GatewayError>;
    async fn delete_post(&self, id: BlogPostId, token: &str) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_response_token_aliases() {
        for body in [json!({ "authToken": "a" }), json!({ "token": "a" }), json!({ "jwt": "a" })] {
            let response: AuthResponse = serde_json::from_value(body).unwrap();
            assert_eq!(response.token().unwrap(), "a");
        }
        let empty: AuthResponse = serde_json::from_value(json!({ "user": { "id": 1 } })).unwrap();
        assert!(matches!(empty.token(), Err(GatewayError::MissingToken)));
        assert_eq!(empty.user.map(|u| u.id), Some(1));
    }

    #[test]
    fn test_product_query_params() {
        let query = ProductQuery { limit: 20, offset: 40, search: Some("dragon".into()) };
        assert_eq!(query.params(), vec![("_limit", "20".to_string()), ("_offset", "40".to_string()), ("q", "dragon".to_string())]);
        assert_eq!(ProductQuery::first(200).params().len(), 2);
    }

    #[test]
    fn test_not_found_detection() {
        assert!(GatewayError::Status { status: 404, body: String::new() }.is_not_found());
        assert!(!GatewayError::Status { status: 500, body: String::new() }.is_not_found());
    }
}
