//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;
use super::{OrderId, ProductId, UserId};

/// Order lifecycle. `Shipped` and `Cancelled` are terminal. The wire values are the backend's.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "pendiente", alias = "pending")]
    Pending,
    #[serde(rename = "enviado", alias = "shipped")]
    Shipped,
    #[serde(rename = "cancelado", alias = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool { self != Self::Pending }
    pub fn as_str(self) -> &'static str {
        match self { Self::Pending => "pending", Self::Shipped => "shipped", Self::Cancelled => "cancelled" }
    }
    /// Value the backend stores and filters on.
    pub fn wire_value(self) -> &'static str {
        match self { Self::Pending => "pendiente", Self::Shipped => "enviado", Self::Cancelled => "cancelado" }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Money,
    #[serde(default)]
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }
}

/// Order as stored upstream. The backend accepts any status write, so the transition rules
/// below are the only thing keeping terminal orders terminal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default, rename = "products_bought")]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total: Money,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<UserId>,
}

impl Order {
    pub fn id(&self) -> OrderId { self.id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    /// Confirm and reject both require a pending order.
    pub fn ensure_pending(&self) -> Result<(), OrderError> {
        if self.status.is_terminal() { return Err(OrderError::NotPending { order_id: self.id, status: self.status }); }
        Ok(())
    }

    /// Status patch that ships this order on behalf of `admin_id`.
    pub fn ship(&self, admin_id: UserId) -> Result<(StatusPatch, DomainEvent), OrderError> {
        self.ensure_pending()?;
        let patch = StatusPatch { status: OrderStatus::Shipped, confirmed_by: Some(admin_id) };
        Ok((patch, DomainEvent::Order(OrderEvent::Shipped { order_id: self.id, confirmed_by: admin_id })))
    }

    pub fn cancel(&self) -> Result<(StatusPatch, DomainEvent), OrderError> {
        self.ensure_pending()?;
        let patch = StatusPatch { status: OrderStatus::Cancelled, confirmed_by: None };
        Ok((patch, DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id })))
    }
}

/// Body of `PATCH /order/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusPatch {
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<UserId>,
}

/// Body of `POST /order`. `card_number` only ever holds the masked number.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub user_email: String,
    #[serde(rename = "products_bought")]
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub status: OrderStatus,
    pub card_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NotPending { order_id: OrderId, status: OrderStatus } }
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::NotPending { order_id, status } => write!(f, "Order {order_id} is already {status}") }
    }
}
