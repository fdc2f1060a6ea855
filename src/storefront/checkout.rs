//! Checkout: turns the cart into an order.
//!
//! Validation runs locally before anything is sent. The cart is cleared only after the
//! server has accepted the order; a failed submission leaves it untouched and keeps the
//! idempotency key so a retry cannot create a second order.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dto::orders::CreateOrderRequest,
    models::{CASH_ON_DELIVERY, Order, OrderItem, ShippingAddress},
    storefront::{
        cart::{CartAction, CartState, CartStore},
        error::{ClientError, ClientResult, ErrorKind},
        session::Session,
    },
};

const CART_CHANGED: &str =
    "Your cart changed since the last attempt, please review it and place the order again";
const INTERRUPTED: &str = "Placing the order was interrupted, please try again";

#[automock]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn create_order(
        &self,
        token: &str,
        idempotency_key: &str,
        request: &CreateOrderRequest,
    ) -> ClientResult<Order>;

    async fn my_orders(&self, token: &str) -> ClientResult<Vec<Order>>;
}

/// Shipping details as typed into the checkout form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingForm {
    pub name: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Please fill in: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Quantity is too large")]
    QuantityTooLarge,

    #[error("Order total is too large")]
    TotalTooLarge,
}

/// Build the order body from the cart and shipping form.
pub fn build_order_request(
    cart: &CartState,
    form: &ShippingForm,
) -> Result<CreateOrderRequest, ValidationError> {
    if cart.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    let name = form.name.trim();
    let email = form.email.trim();
    let address = form.address.trim();

    let missing: Vec<&'static str> = [("name", name), ("email", email), ("address", address)]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| field)
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }
    if !email.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }

    let order_items = cart
        .cart_items
        .iter()
        .map(|line| {
            Ok(OrderItem {
                product: line.product_id,
                qty: i32::try_from(line.qty).map_err(|_| ValidationError::QuantityTooLarge)?,
                price: line.price,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let total_price = cart
        .checked_total_price()
        .ok_or(ValidationError::TotalTooLarge)?;

    Ok(CreateOrderRequest {
        order_items,
        shipping_address: ShippingAddress {
            name: name.to_string(),
            email: email.to_string(),
            address: address.to_string(),
        },
        payment_method: CASH_ON_DELIVERY.to_string(),
        total_price,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutState {
    /// Nothing to check out; the form is not shown.
    EmptyCart,
    Editing { error: Option<Alert> },
    Submitting,
    Confirmed(Order),
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submit(#[from] ClientError),

    #[error("An order is already being placed")]
    InFlight,
}

#[derive(Debug)]
pub struct CheckoutFlow {
    state: CheckoutState,
    idempotency_key: Uuid,
}

impl CheckoutFlow {
    pub fn new(cart: &CartState) -> Self {
        Self {
            state: Self::initial_state(cart),
            idempotency_key: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    /// Key sent with the next submission.
    pub fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    /// Re-evaluate after the cart changed while the form was open.
    pub fn refresh(&mut self, cart: &CartState) {
        match &self.state {
            CheckoutState::Submitting | CheckoutState::Confirmed(_) => {}
            CheckoutState::Editing { .. } if !cart.is_empty() => {}
            _ => self.state = Self::initial_state(cart),
        }
    }

    /// Place the order for the current cart.
    ///
    /// On success the cart is cleared and a fresh key is generated for any later checkout.
    /// On failure the cart and key are kept and the error is shown on the form. A conflict
    /// means the key was already spent on an order with other contents, so a new key is
    /// drawn for the next attempt.
    pub async fn submit<G>(
        &mut self,
        cart: &CartStore,
        form: &ShippingForm,
        session: &Session,
        gateway: &G,
    ) -> Result<Order, CheckoutError>
    where
        G: OrderGateway + ?Sized,
    {
        if self.state == CheckoutState::Submitting {
            return Err(CheckoutError::InFlight);
        }

        let snapshot = cart.snapshot();
        let request = match build_order_request(&snapshot, form) {
            Ok(request) => request,
            Err(err) => {
                self.state = match err {
                    ValidationError::EmptyCart => CheckoutState::EmptyCart,
                    _ => CheckoutState::Editing {
                        error: Some(Alert {
                            kind: ErrorKind::Validation,
                            message: err.to_string(),
                        }),
                    },
                };
                return Err(err.into());
            }
        };

        let key = self.idempotency_key.to_string();
        tracing::debug!(idempotency_key = %key, items = request.order_items.len(), "submitting order");
        let in_flight = InFlight::enter(&mut self.state);

        match gateway.create_order(&session.token, &key, &request).await {
            Ok(order) => {
                tracing::info!(order_id = %order.id, "order confirmed");
                cart.dispatch(CartAction::ClearCart);
                self.idempotency_key = Uuid::new_v4();
                in_flight.settle(CheckoutState::Confirmed(order.clone()));
                Ok(order)
            }
            Err(err @ ClientError::Conflict(_)) => {
                // The key already belongs to an order with different contents.
                tracing::warn!(error = %err, "idempotency key reused for a changed cart");
                self.idempotency_key = Uuid::new_v4();
                in_flight.settle(CheckoutState::Editing {
                    error: Some(Alert {
                        kind: ErrorKind::Validation,
                        message: CART_CHANGED.to_string(),
                    }),
                });
                Err(err.into())
            }
            Err(err) => {
                tracing::warn!(error = %err, "order submission failed");
                in_flight.settle(CheckoutState::Editing {
                    error: Some(Alert {
                        kind: err.kind(),
                        message: err.user_message(),
                    }),
                });
                Err(err.into())
            }
        }
    }

    fn initial_state(cart: &CartState) -> CheckoutState {
        if cart.is_empty() {
            CheckoutState::EmptyCart
        } else {
            CheckoutState::Editing { error: None }
        }
    }
}

/// Holds the flow in `Submitting` while a request is pending.
///
/// If the submission future is dropped before the server answers, the flow goes back to
/// `Editing` with the same idempotency key, so the shopper can retry without a duplicate.
struct InFlight<'a> {
    state: &'a mut CheckoutState,
}

impl<'a> InFlight<'a> {
    fn enter(state: &'a mut CheckoutState) -> Self {
        *state = CheckoutState::Submitting;
        Self { state }
    }

    fn settle(self, next: CheckoutState) {
        *self.state = next;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if *self.state == CheckoutState::Submitting {
            *self.state = CheckoutState::Editing {
                error: Some(Alert {
                    kind: ErrorKind::Network,
                    message: INTERRUPTED.to_string(),
                }),
            };
        }
    }
}

/// Orders placed by the signed-in user.
pub async fn order_history<G>(gateway: &G, session: &Session) -> ClientResult<Vec<Order>>
where
    G: OrderGateway + ?Sized,
{
    gateway.my_orders(&session.token).await
}
