//! Application services: the stateful flows built on the aggregates, storage and gateway.

pub mod cart_store;
pub mod checkout;
pub mod fulfillment;
pub mod session;

pub use cart_store::CartStore;
pub use checkout::{CheckoutFlow, CheckoutForm, CheckoutState};
pub use fulfillment::{OrderFulfillment, StockReport, TransitionPolicy};
pub use session::{RenewalOutcome, Session, SessionStore};
