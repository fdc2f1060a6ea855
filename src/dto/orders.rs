use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem, ShippingAddress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub total_price: i64,
}

impl CreateOrderRequest {
    /// Sum of price × qty over the submitted lines, `None` when it does not fit in an `i64`.
    pub fn items_total(&self) -> Option<i64> {
        self.order_items.iter().try_fold(0i64, |total, item| {
            item.price
                .checked_mul(i64::from(item.qty))
                .and_then(|line| total.checked_add(line))
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}
