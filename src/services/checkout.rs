//! Order Placement Flow
//!
//! `Idle -> Validating -> Submitting -> Succeeded | Failed`. Validation is local and never
//! reaches the network; a failed submission leaves the cart as it was so the shopper can retry.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::instrument;
use validator::Validate;

use super::{CartStore, SessionStore};
use crate::domain::aggregates::{NewOrder, OrderId, OrderItem, OrderStatus};
use crate::domain::value_objects::{CardError, CardExpiry, CardNumber, Cvv};
use crate::gateway::OrderGateway;
use crate::{AuthError, Result, StorefrontError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Your cart is empty.")]
    EmptyCart,

    #[error("{message}")]
    Field { field: &'static str, message: String },
}

/// Fields in the order they are checked and reported.
const FIELD_ORDER: [(&str, &str); 6] = [
    ("first_name", "Enter the card holder's first name."),
    ("last_name", "Enter the card holder's last name."),
    ("card_number", "The card number is not valid."),
    ("expiry", "The expiry date is not valid."),
    ("cvv", "The CVV is not valid."),
    ("address", "Enter a billing address."),
];

#[derive(Clone, Default, Validate)]
pub struct CheckoutForm {
    #[validate(custom = "not_blank")]
    pub first_name: String,
    #[validate(custom = "not_blank")]
    pub last_name: String,
    #[validate(custom = "valid_card_number")]
    pub card_number: String,
    #[validate(custom = "valid_expiry")]
    pub expiry: String,
    #[validate(custom = "valid_cvv")]
    pub cvv: String,
    #[validate(custom = "not_blank")]
    pub address: String,
}

impl fmt::Debug for CheckoutForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutForm")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("card_number", &"***")
            .field("expiry", &self.expiry)
            .field("cvv", &"***")
            .field("address", &self.address)
            .finish()
    }
}

impl CheckoutForm {
    /// First failing field, in form order.
    pub fn check(&self) -> std::result::Result<(), ValidationError> {
        let Err(errors) = self.validate() else { return Ok(()) };
        let by_field = errors.field_errors();
        for (field, fallback) in FIELD_ORDER {
            if let Some(error) = by_field.get(field).and_then(|errs| errs.first()) {
                let message = error.message.as_ref().map_or_else(|| fallback.to_string(), |m| m.to_string());
                return Err(ValidationError::Field { field, message });
            }
        }
        Ok(())
    }
}

fn not_blank(value: &str) -> std::result::Result<(), validator::ValidationError> {
    if value.trim().is_empty() { return Err(validator::ValidationError::new("blank")); }
    Ok(())
}

fn card_failure(e: CardError) -> validator::ValidationError {
    let mut error = validator::ValidationError::new("card");
    error.message = Some(Cow::Owned(e.to_string()));
    error
}

fn valid_card_number(value: &str) -> std::result::Result<(), validator::ValidationError> {
    CardNumber::parse(value).map(|_| ()).map_err(card_failure)
}

fn valid_expiry(value: &str) -> std::result::Result<(), validator::ValidationError> {
    CardExpiry::parse(value).map(|_| ()).map_err(card_failure)
}

fn valid_cvv(value: &str) -> std::result::Result<(), validator::ValidationError> {
    Cvv::parse(value).map(|_| ()).map_err(card_failure)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CheckoutState {
    #[default]
    Idle,
    Validating,
    Submitting,
    Succeeded { order_id: OrderId },
    Failed { message: String },
}

pub struct CheckoutFlow {
    orders: Arc<dyn OrderGateway>,
    confirmation_delay: Duration,
    state: CheckoutState,
}

impl CheckoutFlow {
    pub fn new(orders: Arc<dyn OrderGateway>, confirmation_delay: Duration) -> Self {
        Self { orders, confirmation_delay, state: CheckoutState::Idle }
    }

    pub fn state(&self) -> &CheckoutState { &self.state }

    /// Places the cart as a pending order. On success the cart is cleared once the confirmation
    /// delay has passed; on failure it is left untouched.
    #[instrument(skip_all)]
    pub async fn submit(&mut self, cart: &mut CartStore, session: &SessionStore, form: &CheckoutForm) -> Result<OrderId> {
        self.state = CheckoutState::Validating;
        let (order, token) = match Self::build_order(cart, session, form) {
            Ok(built) => built,
            Err(e) => return Err(self.fail(e)),
        };

        self.state = CheckoutState::Submitting;
        let placed = match self.orders.create_order(&order, &token).await {
            Ok(placed) => placed,
            Err(e) => {
                tracing::error!(error = %e, "order placement failed");
                return Err(self.fail(e.into()));
            }
        };

        tracing::info!(order_id = placed.id, total = %order.total, items = order.items.len(), "order placed");
        self.state = CheckoutState::Succeeded { order_id: placed.id };
        tokio::time::sleep(self.confirmation_delay).await;
        if let Err(e) = cart.clear_cart() {
            tracing::error!(order_id = placed.id, error = %e, "order placed but the cart could not be cleared");
        }
        Ok(placed.id)
    }

    /// The order body and the bearer token it is placed with.
    fn build_order(cart: &CartStore, session: &SessionStore, form: &CheckoutForm) -> Result<(NewOrder, String)> {
        if cart.is_empty() { return Err(ValidationError::EmptyCart.into()); }
        let signed_in = session.session().filter(|s| !s.token.is_empty()).ok_or(AuthError::NotSignedIn)?;
        let user = &signed_in.user;
        form.check()?;
        let card = CardNumber::parse(&form.card_number)
            .map_err(|e| ValidationError::Field { field: "card_number", message: e.to_string() })?;

        let payload = cart.order_payload();
        let items = cart
            .lines()
            .iter()
            .map(|line| OrderItem { product_id: line.product_id, name: line.name.clone(), price: line.unit_price, quantity: line.quantity })
            .collect();
        let order = NewOrder {
            user_id: user.id,
            user_email: user.email.clone(),
            items,
            total: payload.total,
            status: OrderStatus::Pending,
            card_number: card.masked(),
        };
        Ok((order, signed_in.token.clone()))
    }

    fn fail(&mut self, e: StorefrontError) -> StorefrontError {
        self.state = CheckoutState::Failed { message: e.user_message() };
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Order, Product, Role};
    use crate::domain::value_objects::Money;
    use crate::gateway::{GatewayError, MockOrderGateway};
    use crate::storage::MemoryStorage;
    use crate::test::signed_in;
    use testresult::TestResult;

    fn valid_form() -> CheckoutForm {
        CheckoutForm {
            first_name: "Son".into(),
            last_name: "Goku".into(),
            card_number: "4111 1111 1111 1111".into(),
            expiry: "12/26".into(),
            cvv: "123".into(),
            address: "Kame House, South Island".into(),
        }
    }

    fn field_message(form: &CheckoutForm) -> Option<String> {
        match form.check() {
            Err(ValidationError::Field { message, .. }) => Some(message),
            _ => None,
        }
    }

    fn cart_with(storage: Arc<MemoryStorage>) -> CartStore {
        let mut cart = CartStore::load(storage);
        let product = Product { id: 1, name: "Budokai 3".into(), price: Money::from_units(29990), stock: 5, ..Product::default() };
        cart.add_to_cart(&product, 2).unwrap();
        cart
    }

    #[test]
    fn test_card_checks_have_distinct_messages() {
        assert_eq!(valid_form().check(), Ok(()));

        let short_card = field_message(&CheckoutForm { card_number: "4111111111".into(), ..valid_form() });
        let bad_month = field_message(&CheckoutForm { expiry: "13/25".into(), ..valid_form() });
        let short_cvv = field_message(&CheckoutForm { cvv: "12".into(), ..valid_form() });

        let messages = [short_card, bad_month, short_cvv].map(Option::unwrap_or_default);
        assert!(messages.iter().all(|m| !m.is_empty()));
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert_ne!(messages[0], messages[2]);
    }

    #[test]
    fn test_first_failing_field_is_reported() {
        let form = CheckoutForm { first_name: " ".into(), cvv: "1".into(), address: String::new(), ..valid_form() };
        assert!(matches!(form.check(), Err(ValidationError::Field { field: "first_name", .. })));
        let form = CheckoutForm { cvv: "1".into(), address: String::new(), ..valid_form() };
        assert!(matches!(form.check(), Err(ValidationError::Field { field: "cvv", .. })));
        let form = CheckoutForm { address: "   ".into(), ..valid_form() };
        assert_eq!(field_message(&form).as_deref(), Some("Enter a billing address."));
    }

    #[test]
    fn test_form_debug_hides_card_data() {
        let debug = format!("{:?}", valid_form());
        assert!(!debug.contains("4111"));
        assert!(!debug.contains("123"));
    }

    #[tokio::test]
    async fn test_submit_sends_masked_card_and_clears_cart() -> TestResult {
        let mut orders = MockOrderGateway::new();
        orders
            .expect_create_order()
            .withf(|order, token| {
                let body = serde_json::to_value(order).unwrap_or_default();
                body["card_number"] == "**** **** **** 1111"
                    && body.get("cvv").is_none()
                    && body["status"] == "pendiente"
                    && body["products_bought"][0]["name"] == "Budokai 3"
                    && !token.is_empty()
            })
            .times(1)
            .returning(|order, _| Ok(Order {
                id: 77, user_id: Some(order.user_id), user_email: Some(order.user_email.clone()), items: order.items.clone(),
                total: order.total, status: OrderStatus::Pending, created_at: None, confirmed_by: None,
            }));
        let storage = Arc::new(MemoryStorage::new());
        let mut cart = cart_with(storage.clone());
        let session = signed_in(Role::Customer).await?;
        let mut flow = CheckoutFlow::new(Arc::new(orders), Duration::ZERO);

        assert_eq!(flow.submit(&mut cart, &session, &valid_form()).await?, 77);
        assert_eq!(flow.state(), &CheckoutState::Succeeded { order_id: 77 });
        assert!(cart.is_empty());
        assert!(CartStore::load(storage).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_cart() -> TestResult {
        let mut orders = MockOrderGateway::new();
        orders.expect_create_order().returning(|_, _| Err(GatewayError::Status { status: 500, body: "boom".into() }));
        let mut cart = cart_with(Arc::new(MemoryStorage::new()));
        let session = signed_in(Role::Customer).await?;
        let mut flow = CheckoutFlow::new(Arc::new(orders), Duration::ZERO);

        let err = flow.submit(&mut cart, &session, &valid_form()).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Network(_)));
        assert!(matches!(flow.state(), CheckoutState::Failed { message } if !message.contains("boom")));
        assert_eq!(cart.count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_gateway() -> TestResult {
        let session = signed_in(Role::Customer).await?;
        let mut flow = CheckoutFlow::new(Arc::new(MockOrderGateway::new()), Duration::ZERO);

        let mut empty = CartStore::load(Arc::new(MemoryStorage::new()));
        let err = flow.submit(&mut empty, &session, &valid_form()).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(ValidationError::EmptyCart)));

        let mut cart = cart_with(Arc::new(MemoryStorage::new()));
        let form = CheckoutForm { expiry: "1226".into(), ..valid_form() };
        assert!(matches!(flow.submit(&mut cart, &session, &form).await, Err(StorefrontError::Validation(_))));
        assert_eq!(cart.count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_signed_out_checkout_is_refused() -> TestResult {
        let mut session = signed_in(Role::Customer).await?;
        session.logout().await?;
        let mut flow = CheckoutFlow::new(Arc::new(MockOrderGateway::new()), Duration::ZERO);
        let mut cart = cart_with(Arc::new(MemoryStorage::new()));

        let err = flow.submit(&mut cart, &session, &valid_form()).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Auth(AuthError::NotSignedIn)));
        assert!(matches!(flow.state(), CheckoutState::Failed { .. }));
        assert_eq!(cart.count(), 2);
        Ok(())
    }
}
