//! Cart state machine.
//!
//! [`CartState`] is changed only through [`CartAction`]s. Every transition is pure and
//! total: it never fails and never performs I/O. [`CartStore`] owns one state per shopper
//! session and notifies subscribers after each change.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::Product;

/// The product fields a cart line keeps, captured when the product is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub product_id: Uuid,
    pub title: String,
    pub price: i64,
    pub images: Vec<String>,
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            title: product.title.clone(),
            price: product.price,
            images: product.images.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    pub title: String,
    /// Unit price at add time, never re-fetched.
    pub price: i64,
    pub qty: u32,
    pub images: Vec<String>,
}

impl CartLine {
    /// Line total, saturating at `i64::MAX`.
    pub fn subtotal(&self) -> i64 {
        self.price.saturating_mul(i64::from(self.qty))
    }

    fn checked_subtotal(&self) -> Option<i64> {
        self.price.checked_mul(i64::from(self.qty))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Merge into the existing line for the product or append a new one.
    AddItem {
        product: ProductSnapshot,
        quantity: NonZeroU32,
    },
    /// Set a line's quantity; zero removes the line.
    UpdateQty { product_id: Uuid, qty: u32 },
    RemoveItem { product_id: Uuid },
    ClearCart,
}

impl CartAction {
    /// Add a single unit of `product`.
    pub fn add(product: impl Into<ProductSnapshot>) -> Self {
        CartAction::AddItem {
            product: product.into(),
            quantity: NonZeroU32::MIN,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    pub cart_items: Vec<CartLine>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure transition: the state after `action`, leaving `self` untouched.
    pub fn reduce(&self, action: CartAction) -> CartState {
        let mut next = self.clone();
        next.apply(action);
        next
    }

    /// Apply `action` in place. Returns whether the state changed.
    pub fn apply(&mut self, action: CartAction) -> bool {
        match action {
            CartAction::AddItem { product, quantity } => {
                match self.line_mut(product.product_id) {
                    Some(line) => line.qty = line.qty.saturating_add(quantity.get()),
                    None => self.cart_items.push(CartLine {
                        product_id: product.product_id,
                        title: product.title,
                        price: product.price,
                        qty: quantity.get(),
                        images: product.images,
                    }),
                }
                true
            }
            CartAction::UpdateQty { product_id, qty: 0 } => self.remove(product_id),
            CartAction::UpdateQty { product_id, qty } => match self.line_mut(product_id) {
                Some(line) if line.qty != qty => {
                    line.qty = qty;
                    true
                }
                _ => false,
            },
            CartAction::RemoveItem { product_id } => self.remove(product_id),
            CartAction::ClearCart => {
                let changed = !self.cart_items.is_empty();
                self.cart_items.clear();
                changed
            }
        }
    }

    pub fn line(&self, product_id: Uuid) -> Option<&CartLine> {
        self.cart_items.iter().find(|l| l.product_id == product_id)
    }

    /// Derived total: Σ price × qty, saturating at `i64::MAX` for display.
    pub fn total_price(&self) -> i64 {
        self.cart_items
            .iter()
            .fold(0i64, |total, line| total.saturating_add(line.subtotal()))
    }

    /// Exact total, `None` when it does not fit in an `i64`.
    pub fn checked_total_price(&self) -> Option<i64> {
        self.cart_items.iter().try_fold(0i64, |total, line| {
            line.checked_subtotal()
                .and_then(|subtotal| total.checked_add(subtotal))
        })
    }

    pub fn item_count(&self) -> u64 {
        self.cart_items.iter().map(|l| u64::from(l.qty)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cart_items.is_empty()
    }

    fn line_mut(&mut self, product_id: Uuid) -> Option<&mut CartLine> {
        self.cart_items.iter_mut().find(|l| l.product_id == product_id)
    }

    fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.cart_items.len();
        self.cart_items.retain(|l| l.product_id != product_id);
        self.cart_items.len() != before
    }
}

/// Owned cart for one shopper session.
///
/// Created at session start and reset at sign-out. Views hold a receiver from
/// [`CartStore::subscribe`] and re-render when it reports a change; transitions that leave
/// the state unchanged do not notify.
#[derive(Debug)]
pub struct CartStore {
    tx: watch::Sender<CartState>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::with_state(CartState::default())
    }

    /// Start from a previously persisted state.
    pub fn with_state(state: CartState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx }
    }

    pub fn dispatch(&self, action: CartAction) -> bool {
        self.tx.send_if_modified(|state| state.apply(action))
    }

    pub fn snapshot(&self) -> CartState {
        self.tx.borrow().clone()
    }

    pub fn total_price(&self) -> i64 {
        self.tx.borrow().total_price()
    }

    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.tx.subscribe()
    }

    /// Drop every selection, used when the shopper signs out.
    pub fn reset(&self) {
        self.dispatch(CartAction::ClearCart);
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(price: i64) -> ProductSnapshot {
        ProductSnapshot {
            product_id: Uuid::new_v4(),
            title: format!("Watch {price}"),
            price,
            images: vec!["watch.png".into()],
        }
    }

    fn add_n(product: &ProductSnapshot, n: u32) -> CartAction {
        CartAction::AddItem {
            product: product.clone(),
            quantity: NonZeroU32::new(n).unwrap(),
        }
    }

    #[test]
    fn repeated_adds_merge_into_one_line() {
        let watch = snapshot(1000);
        let mut cart = CartState::new();
        for _ in 0..5 {
            cart.apply(CartAction::add(watch.clone()));
        }

        assert_eq!(cart.cart_items.len(), 1);
        assert_eq!(cart.line(watch.product_id).unwrap().qty, 5);
    }

    #[test]
    fn add_with_quantity_sums_quantities() {
        let watch = snapshot(700);
        let cart = CartState::new()
            .reduce(add_n(&watch, 2))
            .reduce(add_n(&watch, 3))
            .reduce(CartAction::add(watch.clone()));

        assert_eq!(cart.cart_items.len(), 1);
        assert_eq!(cart.line(watch.product_id).unwrap().qty, 6);
    }

    #[test]
    fn add_keeps_the_first_price_snapshot() {
        let mut watch = snapshot(1000);
        let mut cart = CartState::new().reduce(CartAction::add(watch.clone()));
        watch.price = 1500;
        cart.apply(CartAction::add(watch.clone()));

        let line = cart.line(watch.product_id).unwrap();
        assert_eq!(line.price, 1000);
        assert_eq!(line.qty, 2);
    }

    #[test]
    fn distinct_products_append_in_order() {
        let a = snapshot(1);
        let b = snapshot(2);
        let cart = CartState::new()
            .reduce(CartAction::add(a.clone()))
            .reduce(CartAction::add(b.clone()))
            .reduce(CartAction::add(a.clone()));

        let ids: Vec<Uuid> = cart.cart_items.iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![a.product_id, b.product_id]);
    }

    #[test]
    fn reduce_does_not_touch_the_input() {
        let before = CartState::new().reduce(CartAction::add(snapshot(10)));
        let after = before.reduce(CartAction::ClearCart);
        assert_eq!(before.cart_items.len(), 1);
        assert!(after.is_empty());
    }

    #[test]
    fn update_qty_sets_the_line() {
        let watch = snapshot(250);
        let mut cart = CartState::new().reduce(CartAction::add(watch.clone()));
        assert!(cart.apply(CartAction::UpdateQty {
            product_id: watch.product_id,
            qty: 4,
        }));
        assert_eq!(cart.line(watch.product_id).unwrap().qty, 4);
        assert_eq!(cart.total_price(), 1000);
    }

    #[test]
    fn update_qty_to_zero_removes_the_line() {
        let watch = snapshot(250);
        let mut cart = CartState::new().reduce(CartAction::add(watch.clone()));
        cart.apply(CartAction::UpdateQty {
            product_id: watch.product_id,
            qty: 0,
        });
        assert!(cart.is_empty());
    }

    #[test]
    fn update_qty_for_unknown_product_is_a_noop() {
        let mut cart = CartState::new().reduce(CartAction::add(snapshot(250)));
        let before = cart.clone();
        assert!(!cart.apply(CartAction::UpdateQty {
            product_id: Uuid::new_v4(),
            qty: 3,
        }));
        assert_eq!(cart, before);
    }

    #[test]
    fn remove_twice_is_idempotent() {
        let a = snapshot(100);
        let b = snapshot(200);
        let cart = CartState::new()
            .reduce(CartAction::add(a.clone()))
            .reduce(CartAction::add(b.clone()));

        let once = cart.reduce(CartAction::RemoveItem {
            product_id: a.product_id,
        });
        let twice = once.reduce(CartAction::RemoveItem {
            product_id: a.product_id,
        });

        assert_eq!(once, twice);
        assert_eq!(twice.cart_items.len(), 1);
        assert!(twice.line(b.product_id).is_some());
    }

    #[test]
    fn clear_always_empties() {
        let empty = CartState::new().reduce(CartAction::ClearCart);
        assert!(empty.is_empty());

        let full = (0..4).fold(CartState::new(), |cart, i| {
            cart.reduce(CartAction::add(snapshot(i * 100)))
        });
        assert!(full.reduce(CartAction::ClearCart).is_empty());
    }

    #[test]
    fn total_matches_worked_example() {
        let cart = CartState::new()
            .reduce(add_n(&snapshot(1000), 2))
            .reduce(CartAction::add(snapshot(500)));
        assert_eq!(cart.total_price(), 2500);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn total_is_order_independent() {
        let mut cart = CartState::new()
            .reduce(add_n(&snapshot(1000), 2))
            .reduce(CartAction::add(snapshot(500)))
            .reduce(add_n(&snapshot(333), 3));
        let total = cart.total_price();

        cart.cart_items.reverse();
        assert_eq!(cart.total_price(), total);
        cart.cart_items.rotate_left(1);
        assert_eq!(cart.total_price(), total);
    }

    #[test]
    fn huge_totals_do_not_wrap() {
        let cart = CartState::new()
            .reduce(add_n(&snapshot(1 << 62), 4))
            .reduce(CartAction::add(snapshot(1)));

        assert_eq!(cart.total_price(), i64::MAX);
        assert_eq!(cart.checked_total_price(), None);

        let small = CartState::new().reduce(add_n(&snapshot(1000), 2));
        assert_eq!(small.checked_total_price(), Some(2000));
    }

    #[test]
    fn serialized_state_uses_wire_names() {
        let cart = CartState::new().reduce(CartAction::add(snapshot(10)));
        let json = serde_json::to_value(&cart).unwrap();
        assert!(json["cartItems"][0]["productId"].is_string());
        assert_eq!(json["cartItems"][0]["qty"], 1);
    }

    #[tokio::test]
    async fn store_notifies_subscribers_on_change_only() {
        let store = CartStore::new();
        let mut rx = store.subscribe();
        let watch = snapshot(900);

        assert!(store.dispatch(CartAction::add(watch.clone())));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().item_count(), 1);

        assert!(!store.dispatch(CartAction::RemoveItem {
            product_id: Uuid::new_v4(),
        }));
        assert!(!rx.has_changed().unwrap());

        store.reset();
        assert!(rx.has_changed().unwrap());
        assert!(store.snapshot().is_empty());
    }
}
