//! Admin Confirmation Flow
//!
//! Confirming ships an order and takes its quantities out of stock; rejecting cancels it and
//! puts them back. The backend offers no transaction across the stock writes and the status
//! patch, so the work is split into a plan, computed from one catalog read, and an apply step
//! whose per-line results are collected into a [`StockReport`]. The [`TransitionPolicy`] then
//! decides whether the order status may still move.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::instrument;

use crate::domain::aggregates::{adjusted_stock, Order, OrderError, OrderId, ProductId, StatusPatch, StockDirection, UserId};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::gateway::{CatalogGateway, GatewayError, OrderGateway, ProductQuery};
use crate::{Result, StorefrontError};

pub const DEFAULT_PRODUCT_LIMIT: u32 = 200;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Any missing product or failed stock write leaves the order status untouched.
    #[default]
    Strict,
    /// Missing products are skipped and the status always moves.
    Lenient,
}

impl FromStr for TransitionPolicy {
    type Err = StorefrontError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(StorefrontError::Config(format!("unknown fulfillment policy '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockChange {
    pub product_id: ProductId,
    pub quantity: u32,
    pub from: u32,
    pub to: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StockFailureReason {
    ProductMissing,
    WriteFailed { status: Option<u16>, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockFailure {
    pub product_id: ProductId,
    pub quantity: u32,
    pub reason: StockFailureReason,
}

/// Per-line outcome of a stock batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StockReport {
    pub succeeded: Vec<StockChange>,
    pub failed: Vec<StockFailure>,
}

impl StockReport {
    pub fn is_complete(&self) -> bool { self.failed.is_empty() }
}

#[derive(Clone, Debug)]
pub struct FulfillmentOutcome {
    pub order: Order,
    pub report: StockReport,
}

pub struct OrderFulfillment {
    orders: Arc<dyn OrderGateway>,
    catalog: Arc<dyn CatalogGateway>,
    policy: TransitionPolicy,
    product_limit: u32,
}

impl OrderFulfillment {
    pub fn new(orders: Arc<dyn OrderGateway>, catalog: Arc<dyn CatalogGateway>) -> Self {
        Self { orders, catalog, policy: TransitionPolicy::default(), product_limit: DEFAULT_PRODUCT_LIMIT }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self { self.policy = policy; self }
    pub fn with_product_limit(mut self, limit: u32) -> Self { self.product_limit = limit; self }

    /// Ships a pending order on behalf of `admin_id`, decrementing stock for each line.
    #[instrument(skip(self, token))]
    pub async fn confirm_order(&self, order_id: OrderId, admin_id: UserId, token: &str) -> Result<FulfillmentOutcome> {
        self.settle(order_id, token, StockDirection::Decrement, |order| order.ship(admin_id)).await
    }

    /// Cancels a pending order and restores its stock.
    #[instrument(skip(self, token))]
    pub async fn reject_order(&self, order_id: OrderId, token: &str) -> Result<FulfillmentOutcome> {
        self.settle(order_id, token, StockDirection::Increment, Order::cancel).await
    }

    async fn settle(
        &self,
        order_id: OrderId,
        token: &str,
        direction: StockDirection,
        transition: impl FnOnce(&Order) -> std::result::Result<(StatusPatch, DomainEvent), OrderError>,
    ) -> Result<FulfillmentOutcome> {
        let order = self.orders.get_order(order_id, token).await.map_err(|e| {
            if e.is_not_found() { StorefrontError::order_not_found(order_id) } else { e.into() }
        })?;
        let (patch, event) = transition(&order)?;

        let products = self.catalog.list_products(&ProductQuery::first(self.product_limit), token).await?;
        let stock: HashMap<ProductId, u32> = products.iter().map(|p| (p.id, p.stock)).collect();
        let (changes, mut report) = plan(&order, &stock, direction);

        if !report.is_complete() {
            match self.policy {
                TransitionPolicy::Strict => return Err(StorefrontError::PartialFailure { order_id, report }),
                TransitionPolicy::Lenient => {
                    for missing in &report.failed {
                        tracing::warn!(order_id, product_id = missing.product_id, "product not found, skipping line");
                    }
                }
            }
        }

        for change in changes {
            match self.catalog.update_stock(change.product_id, change.to, token).await {
                Ok(_) => {
                    let event = OrderEvent::StockAdjusted { product_id: change.product_id, from: change.from, to: change.to };
                    tracing::debug!(?event, "stock adjusted");
                    report.succeeded.push(change);
                }
                Err(e) => {
                    tracing::error!(order_id, product_id = change.product_id, error = %e, "stock update failed");
                    report.failed.push(write_failure(&change, &e));
                }
            }
        }

        if self.policy == TransitionPolicy::Strict && !report.is_complete() {
            return Err(StorefrontError::PartialFailure { order_id, report });
        }

        let order = self.orders.update_order_status(order_id, &patch, token).await?;
        tracing::info!(?event, adjusted = report.succeeded.len(), failed = report.failed.len(), "order settled");
        Ok(FulfillmentOutcome { order, report })
    }
}

/// Resolves each order line against the catalog. Lines of the same product accumulate against
/// a running stock value so repeated lines are not computed from the same starting point.
fn plan(order: &Order, stock: &HashMap<ProductId, u32>, direction: StockDirection) -> (Vec<StockChange>, StockReport) {
    let mut running = stock.clone();
    let mut changes = Vec::with_capacity(order.items().len());
    let mut report = StockReport::default();

    for item in order.items() {
        let Some(current) = running.get_mut(&item.product_id) else {
            report.failed.push(StockFailure { product_id: item.product_id, quantity: item.quantity, reason: StockFailureReason::ProductMissing });
            continue;
        };
        let from = *current;
        let to = adjusted_stock(from, item.quantity, direction);
        *current = to;
        changes.push(StockChange { product_id: item.product_id, quantity: item.quantity, from, to });
    }
    (changes, report)
}

fn write_failure(change: &StockChange, e: &GatewayError) -> StockFailure {
    StockFailure {
        product_id: change.product_id,
        quantity: change.quantity,
        reason: StockFailureReason::WriteFailed { status: e.status(), message: e.to_string() },
    }
}
