//! Persisted cart.
//!
//! Wraps the [`Cart`] aggregate and writes its lines to local storage after every change, so a
//! restart comes back to the same cart.

use std::sync::Arc;

use crate::domain::aggregates::{Cart, CartLine, OrderPayload, Product, ProductId};
use crate::domain::value_objects::Money;
use crate::storage::{read_json, write_json, LocalStorage, CART_KEY};
use crate::Result;

#[derive(Debug)]
pub struct CartStore {
    cart: Cart,
    storage: Arc<dyn LocalStorage>,
}

impl CartStore {
    /// Loads the persisted cart. A missing or unreadable record yields an empty cart.
    pub fn load(storage: Arc<dyn LocalStorage>) -> Self {
        let lines = match read_json::<Vec<CartLine>>(storage.as_ref(), CART_KEY) {
            Ok(lines) => lines.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable persisted cart");
                Vec::new()
            }
        };
        Self { cart: Cart::from_lines(lines), storage }
    }

    pub fn lines(&self) -> &[CartLine] { self.cart.lines() }
    pub fn is_empty(&self) -> bool { self.cart.is_empty() }
    pub fn count(&self) -> u32 { self.cart.count() }
    pub fn total(&self) -> Money { self.cart.total() }
    pub fn order_payload(&self) -> OrderPayload { self.cart.order_payload() }

    /// Adds `qty` units of `product`. A sold-out re-add drops the line and still returns
    /// `OutOfStock`; the drop is persisted before the error is returned.
    pub fn add_to_cart(&mut self, product: &Product, qty: u32) -> Result<u32> {
        let added = self.cart.add(product, qty);
        if self.cart.has_pending_events() { self.persist()?; }
        Ok(added?)
    }

    pub fn remove_from_cart(&mut self, product_id: ProductId) -> Result<bool> {
        let removed = self.cart.remove(product_id);
        self.persist()?;
        Ok(removed)
    }

    pub fn update_quantity(&mut self, product_id: ProductId, qty: u32) -> Result<Option<u32>> {
        let quantity = self.cart.update_quantity(product_id, qty);
        self.persist()?;
        Ok(quantity)
    }

    pub fn clear_cart(&mut self) -> Result<()> {
        self.cart.clear();
        self.persist()
    }

    fn persist(&mut self) -> Result<()> {
        for event in self.cart.take_events() {
            tracing::debug!(?event, "cart event");
        }
        write_json(self.storage.as_ref(), CART_KEY, self.cart.lines())?;
        Ok(())
    }
}
