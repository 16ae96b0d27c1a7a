//! Domain events
use crate::domain::aggregates::{OrderId, ProductId, UserId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainEvent {
    Cart(CartEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartEvent {
    ItemAdded { product_id: ProductId, quantity: u32 },
    QuantityChanged { product_id: ProductId, quantity: u32 },
    ItemRemoved { product_id: ProductId },
    Cleared,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderEvent {
    Shipped { order_id: OrderId, confirmed_by: UserId },
    Cancelled { order_id: OrderId },
    StockAdjusted { product_id: ProductId, from: u32, to: u32 },
}
