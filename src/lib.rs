//! KameHouse Storefront
//!
//! Client core of a small video-game store backed by a hosted REST backend.
//!
//! ## Features
//! - Cart with stock-capped quantities, persisted across restarts
//! - Checkout with local card validation and order placement
//! - Session handling with token renewal and canonical roles
//! - Admin order confirmation with stock adjustment

pub mod config;
pub mod domain;
pub mod gateway;
pub mod services;
pub mod storage;

#[cfg(test)]
mod test;

use thiserror::Error;

use domain::aggregates::{CartError, OrderError, OrderId, OrderStatus, ProductId};
use gateway::GatewayError;
use services::checkout::ValidationError;
use services::fulfillment::StockReport;
use storage::StorageError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Credentials were rejected")]
    Rejected { status: u16, body: String },

    #[error("This account is blocked")]
    Blocked,

    #[error("The backend returned no auth token")]
    MissingToken,

    #[error("The backend returned no user for this session")]
    MissingUser,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Administrator role required")]
    NotAdmin,
}

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Network error: {0}")]
    Network(#[from] GatewayError),

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: i64 },

    #[error("Order {order_id} is already {status}")]
    Conflict { order_id: OrderId, status: OrderStatus },

    #[error("Order {order_id}: {} stock update(s) failed, status left unchanged", .report.failed.len())]
    PartialFailure { order_id: OrderId, report: StockReport },

    #[error("{0}")]
    Cart(#[from] CartError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StorefrontError {
    pub fn product_not_found(id: ProductId) -> Self { Self::NotFound { resource: "Product", id } }
    pub fn order_not_found(id: OrderId) -> Self { Self::NotFound { resource: "Order", id } }

    /// Text suitable for the end user. Network details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Something went wrong talking to the store. Please try again.".to_string(),
            Self::Storage(_) => "Local data could not be saved. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<OrderError> for StorefrontError {
    fn from(e: OrderError) -> Self {
        match e { OrderError::NotPending { order_id, status } => Self::Conflict { order_id, status } }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
