//! Cart Aggregate
//!
//! The shopper's working selection. Quantities are capped by the stock value the catalog showed
//! when the product was added; nothing here is re-validated against the backend and nothing is
//! reserved upstream, so two shoppers can both hold the last unit.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::Money;
use super::product::Product;
use super::ProductId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "price")]
    pub unit_price: Money,
    pub quantity: u32,
    /// Last authoritative stock seen for this product; the quantity ceiling.
    #[serde(default, alias = "stock")]
    pub stock_snapshot: u32,
    /// Stock left after this line's latest reservation. Display only.
    #[serde(default)]
    pub remaining_stock: u32,
    #[serde(default, alias = "image", deserialize_with = "lenient_image")]
    pub image_ref: Option<String>,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderPayload {
    pub items: Vec<PayloadItem>,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PayloadItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

#[derive(Clone, Debug, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
    events: Vec<DomainEvent>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    /// Rebuilds a cart from persisted lines. A product appearing twice keeps its first line, and
    /// lines with no quantity are dropped.
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        for mut line in lines {
            if line.quantity == 0 || cart.line(line.product_id).is_some() { continue; }
            // Lines persisted without a snapshot had at least their own quantity available.
            line.stock_snapshot = line.stock_snapshot.max(line.quantity);
            cart.lines.push(line);
        }
        cart
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> { self.lines.iter().find(|l| l.product_id == product_id) }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn count(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }
    pub fn total(&self) -> Money { self.lines.iter().map(CartLine::line_total).sum() }

    /// Adds `qty` units of `product`, capped by `product.stock`. Returns the line's new quantity.
    pub fn add(&mut self, product: &Product, qty: u32) -> Result<u32, CartError> {
        if qty == 0 { return Err(CartError::InvalidQuantity); }
        let stock = product.stock;

        let Some(pos) = self.lines.iter().position(|l| l.product_id == product.id) else {
            if stock == 0 { return Err(CartError::OutOfStock(product.id)); }
            let quantity = qty.min(stock);
            self.lines.push(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity,
                stock_snapshot: stock,
                remaining_stock: stock - quantity,
                image_ref: product.primary_image().map(str::to_string),
            });
            self.raise_event(DomainEvent::Cart(CartEvent::ItemAdded { product_id: product.id, quantity }));
            return Ok(quantity);
        };

        let line = &mut self.lines[pos];
        let new_qty = line.quantity.saturating_add(qty).min(stock);
        if new_qty == 0 {
            self.lines.remove(pos);
            self.raise_event(DomainEvent::Cart(CartEvent::ItemRemoved { product_id: product.id }));
            return Err(CartError::OutOfStock(product.id));
        }
        let reserved_now = new_qty.saturating_sub(line.quantity);
        line.quantity = new_qty;
        line.stock_snapshot = stock;
        line.remaining_stock = stock.saturating_sub(reserved_now);
        if line.image_ref.is_none() { line.image_ref = product.primary_image().map(str::to_string); }
        self.raise_event(DomainEvent::Cart(CartEvent::QuantityChanged { product_id: product.id, quantity: new_qty }));
        Ok(new_qty)
    }

    /// Removes the line for `product_id`. Returns whether a line was there.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        let removed = self.lines.len() != before;
        if removed { self.raise_event(DomainEvent::Cart(CartEvent::ItemRemoved { product_id })); }
        removed
    }

    /// Sets a line's quantity, capped by its stock snapshot. Below one removes the line; an
    /// unknown product is ignored. Returns the resulting quantity, if the line still exists.
    pub fn update_quantity(&mut self, product_id: ProductId, qty: u32) -> Option<u32> {
        if qty < 1 {
            self.remove(product_id);
            return None;
        }
        let line = self.lines.iter_mut().find(|l| l.product_id == product_id)?;
        line.quantity = qty.min(line.stock_snapshot);
        let quantity = line.quantity;
        self.raise_event(DomainEvent::Cart(CartEvent::QuantityChanged { product_id, quantity }));
        Some(quantity)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.raise_event(DomainEvent::Cart(CartEvent::Cleared));
    }

    pub fn order_payload(&self) -> OrderPayload {
        OrderPayload {
            items: self.lines.iter().map(|l| PayloadItem { product_id: l.product_id, quantity: l.quantity, price: l.unit_price }).collect(),
            total: self.total(),
        }
    }

    /// Whether the aggregate changed since events were last drained.
    pub fn has_pending_events(&self) -> bool { !self.events.is_empty() }
    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

/// Older carts stored the image as a string, an upload object or a list of either.
fn lenient_image<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    fn pick(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(o) => ["url", "path"].iter().find_map(|k| o.get(*k).and_then(pick)),
            Value::Array(items) => items.first().and_then(pick),
            _ => None,
        }
    }
    Ok(Option::<Value>::deserialize(deserializer)?.as_ref().and_then(pick))
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { InvalidQuantity, OutOfStock(ProductId) }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuantity => write!(f, "Quantity must be at least 1"),
            Self::OutOfStock(id) => write!(f, "Product {id} is out of stock"),
        }
    }
}
