//! reqwest implementation of the gateway traits.

use async_trait::async_trait;
use reqwest::{multipart, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use super::{AuthGateway, AuthResponse, BlogGateway, CatalogGateway, GatewayError, OrderGateway, ProductQuery, UserGateway};
use crate::domain::aggregates::{
    BlockPatch, BlogPost, BlogPostId, BlogPostPayload, ImageRef, NewOrder, NewUser, Order, OrderId,
    OrderStatus, Product, ProductDraft, ProductId, ProductPatch, ProfilePatch, RawUser, Signup,
    StatusPatch, UserId, UserPatch,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const PUBLIC_BLOG_LIMIT: u32 = 50;

/// Base URLs of the two API groups the backend exposes.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Products, orders, uploads and blog.
    pub store_base: String,
    /// Authentication and user records.
    pub auth_base: String,
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: HttpGatewayConfig,
    http: Client,
}

/// List endpoints answer either with a bare array or with a page object.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Paged { items: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> { match self { Self::Bare(v) | Self::Paged { items: v } => v } }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> { match self { Self::Many(v) => v, Self::One(t) => vec![t] } }
}

impl HttpGateway {
    #[must_use]
    pub fn new(config: HttpGatewayConfig) -> Self {
        Self { config, http: Client::new() }
    }

    fn store_url(&self, path: &str) -> String { join(&self.config.store_base, path) }
    fn auth_url(&self, path: &str) -> String { join(&self.config.auth_base, path) }

    /// Starts a request tagged with a fresh request id. An empty token sends no `Authorization`.
    fn request(&self, method: Method, url: String, token: &str) -> RequestBuilder {
        let builder = self.http.request(method, url).header(REQUEST_ID_HEADER, Uuid::now_v7().to_string());
        if token.is_empty() { builder } else { builder.bearer_auth(token) }
    }

    async fn dispatch(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let request = builder.build()?;
        let request_id = request.headers().get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
        let span = tracing::info_span!("gateway", method = %request.method(), path = %request.url().path(), %request_id);

        async move {
            let response = self.http.execute(request).await.map_err(|e| {
                tracing::error!(error = %e, "request did not complete");
                GatewayError::from(e)
            })?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), %body, "backend rejected request");
                return Err(GatewayError::Status { status: status.as_u16(), body });
            }
            tracing::debug!(status = status.as_u16(), "request completed");
            Ok(response)
        }
        .instrument(span)
        .await
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GatewayError> {
        Ok(self.dispatch(builder).await?.json().await?)
    }

    async fn send_unit(&self, builder: RequestBuilder) -> Result<(), GatewayError> {
        self.dispatch(builder).await.map(|_| ())
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[async_trait]
impl AuthGateway for HttpGateway {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, GatewayError> {
        let body = json!({ "email": email, "password": password });
        self.send(self.request(Method::POST, self.auth_url("auth/login"), "").json(&body)).await
    }

    async fn signup(&self, details: &Signup) -> Result<AuthResponse, GatewayError> {
        self.send(self.request(Method::POST, self.auth_url("auth/signup"), "").json(details)).await
    }

    async fn logout(&self, token: &str) -> Result<(), GatewayError> {
        self.send_unit(self.request(Method::POST, self.auth_url("auth/logout"), token).json(&json!({}))).await
    }

    async fn refresh_token(&self, token: &str) -> Result<AuthResponse, GatewayError> {
        self.send(self.request(Method::POST, self.auth_url("auth/refresh_token"), token).json(&json!({}))).await
    }

    async fn me(&self, token: &str) -> Result<RawUser, GatewayError> {
        self.send(self.request(Method::GET, self.auth_url("auth/me"), token)).await
    }

    async fn update_profile(&self, id: UserId, patch: &ProfilePatch, token: &str) -> Result<(), GatewayError> {
        self.send_unit(self.request(Method::PATCH, self.auth_url(&format!("user/{id}")), token).json(patch)).await
    }
}

#[async_trait]
impl CatalogGateway for HttpGateway {
    async fn list_products(&self, query: &ProductQuery, token: &str) -> Result<Vec<Product>, GatewayError> {
        let builder = self.request(Method::GET, self.store_url("product"), token).query(&query.params());
        Ok(self.send::<Listing<Product>>(builder).await?.into_vec())
    }

    async fn create_product(&self, draft: &ProductDraft, token: &str) -> Result<Product, GatewayError> {
        self.send(self.request(Method::POST, self.store_url("product"), token).json(draft)).await
    }

    async fn update_product(&self, id: ProductId, patch: &ProductPatch, token: &str) -> Result<Product, GatewayError> {
        self.send(self.request(Method::PATCH, self.store_url(&format!("product/{id}")), token).json(patch)).await
    }

    async fn update_stock(&self, id: ProductId, stock: u32, token: &str) -> Result<Product, GatewayError> {
        self.update_product(id, &ProductPatch::stock(stock), token).await
    }

    async fn delete_product(&self, id: ProductId, token: &str) -> Result<(), GatewayError> {
        self.send_unit(self.request(Method::DELETE, self.store_url(&format!("product/{id}")), token)).await
    }

    async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<ImageRef>, GatewayError> {
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("image", part);
        let builder = self.request(Method::POST, self.store_url("upload/image"), "").multipart(form);
        Ok(self.send::<OneOrMany<ImageRef>>(builder).await?.into_vec())
    }
}

#[async_trait]
impl OrderGateway for HttpGateway {
    async fn create_order(&self, order: &NewOrder, token: &str) -> Result<Order, GatewayError> {
        self.send(self.request(Method::POST, self.store_url("order"), token).json(order)).await
    }

    async fn list_orders(&self, status: Option<OrderStatus>, token: &str) -> Result<Vec<Order>, GatewayError> {
        let mut builder = self.request(Method::GET, self.store_url("order"), token);
        if let Some(status) = status { builder = builder.query(&[("status", status.wire_value())]); }
        Ok(self.send::<Listing<Order>>(builder).await?.into_vec())
    }

    async fn get_order(&self, id: OrderId, token: &str) -> Result<Order, GatewayError> {
        self.send(self.request(Method::GET, self.store_url(&format!("order/{id}")), token)).await
    }

    async fn update_order_status(&self, id: OrderId, patch: &StatusPatch, token: &str) -> Result<Order, GatewayError> {
        self.send(self.request(Method::PATCH, self.store_url(&format!("order/{id}")), token).json(patch)).await
    }
}

#[async_trait]
impl UserGateway for HttpGateway {
    async fn list_users(&self, token: &str) -> Result<Vec<RawUser>, GatewayError> {
        Ok(self.send::<Listing<RawUser>>(self.request(Method::GET, self.auth_url("user"), token)).await?.into_vec())
    }

    async fn create_user(&self, user: &NewUser, token: &str) -> Result<AuthResponse, GatewayError> {
        self.send(self.request(Method::POST, self.auth_url("auth/signup"), token).json(user)).await
    }

    async fn update_user(&self, id: UserId, patch: &UserPatch, token: &str) -> Result<(), GatewayError> {
        if patch.is_empty() {
            tracing::warn!(user_id = id, "user update has no changes, skipping request");
            return Ok(());
        }
        self.send_unit(self.request(Method::PATCH, self.auth_url(&format!("user/{id}")), token).json(patch)).await
    }

    async fn set_blocked(&self, id: UserId, patch: &BlockPatch, token: &str) -> Result<(), GatewayError> {
        self.send_unit(self.request(Method::PATCH, self.auth_url(&format!("user/{id}")), token).json(patch)).await
    }

    async fn delete_user(&self, id: UserId, token: &str) -> Result<(), GatewayError> {
        self.send_unit(self.request(Method::DELETE, self.auth_url(&format!("user/{id}")), token)).await
    }
}

#[async_trait]
impl BlogGateway for HttpGateway {
    async fn list_posts(&self) -> Result<Vec<BlogPost>, GatewayError> {
        let params = [("_limit", PUBLIC_BLOG_LIMIT.to_string()), ("_order", "created_at".into()), ("_order_direction", "desc".into())];
        let builder = self.request(Method::GET, self.store_url("blog_post"), "").query(&params);
        Ok(self.send::<Listing<BlogPost>>(builder).await?.into_vec())
    }

    async fn list_all_posts(&self, token: &str) -> Result<Vec<BlogPost>, GatewayError> {
        Ok(self.send::<Listing<BlogPost>>(self.request(Method::GET, self.store_url("blog_post_all"), token)).await?.into_vec())
    }

    async fn get_post(&self, id: BlogPostId) -> Result<BlogPost, GatewayError> {
        self.send(self.request(Method::GET, self.store_url(&format!("blog_post/{id}")), "")).await
    }

    async fn create_post(&self, post: &BlogPostPayload, token: &str) -> Result<BlogPost, GatewayError> {
        self.send(self.request(Method::POST, self.store_url("blog_post"), token).json(post)).await
    }

    async fn update_post(&self, id: BlogPostId, post: &BlogPostPayload, token: &str) -> Result<BlogPost, GatewayError> {
        self.send(self.request(Method::PATCH, self.store_url(&format!("blog_post/{id}")), token).json(post)).await
    }

    async fn set_published(&self, id: BlogPostId, published: bool, token: &str) -> Result<BlogPost, GatewayError> {
        let body = json!({ "published": published });
        self.send(self.request(Method::PATCH, self.store_url(&format!("blog_post/{id}")), token).json(&body)).await
    }

    async fn delete_post(&self, id: BlogPostId, token: &str) -> Result<(), GatewayError> {
        self.send_unit(self.request(Method::DELETE, self.store_url(&format!("blog_post/{id}")), token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    fn gateway() -> HttpGateway {
        HttpGateway::new(HttpGatewayConfig { store_base: "https://api.test/store/".into(), auth_base: "https://api.test/auth".into() })
    }

    #[test]
    fn test_join_trims_slashes() {
        assert_eq!(join("https://api.test/store/", "/product"), "https://api.test/store/product");
        assert_eq!(gateway().auth_url("auth/me"), "https://api.test/auth/auth/me");
    }

    #[test]
    fn test_request_carries_bearer_and_request_id() -> TestResult {
        let gw = gateway();
        let request = gw.request(Method::GET, gw.store_url("order/1"), "tok").build()?;
        assert_eq!(request.headers().get("authorization").and_then(|v| v.to_str().ok()), Some("Bearer tok"));
        let id = request.headers().get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
        assert!(Uuid::parse_str(id).is_ok());

        let anonymous = gw.request(Method::GET, gw.store_url("product"), "").build()?;
        assert!(anonymous.headers().get("authorization").is_none());
        Ok(())
    }

    #[test]
    fn test_product_query_encoding() -> TestResult {
        let gw = gateway();
        let query = ProductQuery { limit: 5, offset: 10, search: Some("goku z".into()) };
        let request = gw.request(Method::GET, gw.store_url("product"), "").query(&query.params()).build()?;
        assert_eq!(request.url().query(), Some("_limit=5&_offset=10&q=goku+z"));
        Ok(())
    }

    #[test]
    fn test_listing_accepts_both_shapes() -> TestResult {
        let bare: Listing<i32> = serde_json::from_str("[1,2]")?;
        let paged: Listing<i32> = serde_json::from_str(r#"{"items":[3],"itemsTotal":1}"#)?;
        assert_eq!(bare.into_vec(), vec![1, 2]);
        assert_eq!(paged.into_vec(), vec![3]);
        Ok(())
    }

    #[test]
    fn test_upload_response_is_always_a_list() -> TestResult {
        let one: OneOrMany<ImageRef> = serde_json::from_str(r#"{"path":"/vault/a.png","mime":"image/png"}"#)?;
        let many: OneOrMany<ImageRef> = serde_json::from_str(r#"[{"path":"/a"},{"path":"/b"}]"#)?;
        assert_eq!(one.into_vec().len(), 1);
        assert_eq!(many.into_vec().len(), 2);
        Ok(())
    }
}
