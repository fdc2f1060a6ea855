use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CreateOrderRequest, OrderList},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CASH_ON_DELIVERY, Order, OrderItem, ShippingAddress},
    response::{ApiResponse, Meta},
    state::AppState,
};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;
const KEY_REUSED: &str = "Idempotency-Key was already used for a different order";

/// Result of an order submission: a fresh order or the replay of an earlier one.
#[derive(Debug)]
pub enum Placement {
    Created(Order),
    Replayed(Order),
}

impl Placement {
    pub fn into_order(self) -> Order {
        match self {
            Placement::Created(order) | Placement::Replayed(order) => order,
        }
    }
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    idempotency_key: Option<String>,
    payload: CreateOrderRequest,
) -> AppResult<Placement> {
    let idempotency_key = normalize_idempotency_key(idempotency_key)?;
    validate_order_request(&payload)?;
    let fingerprint = request_fingerprint(&payload)?;

    if let Some(key) = idempotency_key.as_deref() {
        if let Some(existing) = find_replay(state.db(), user.user_id, key, &fingerprint).await? {
            tracing::info!(order_id = %existing.id, "order replayed for idempotency key");
            return Ok(Placement::Replayed(existing));
        }
    }

    ensure_products_exist(state, &payload.order_items).await?;

    let order_id = Uuid::new_v4();
    let txn = state.db().begin().await?;

    let inserted = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        shipping_name: Set(payload.shipping_address.name.trim().to_string()),
        shipping_email: Set(payload.shipping_address.email.trim().to_string()),
        shipping_address: Set(payload.shipping_address.address.trim().to_string()),
        payment_method: Set(payload.payment_method.clone()),
        total_price: Set(payload.total_price),
        idempotency_key: Set(idempotency_key.clone()),
        request_fingerprint: Set(Some(fingerprint.clone())),
        created_at: NotSet,
    }
    .insert(&txn)
    .await;

    let order = match inserted {
        Ok(order) => order,
        Err(err) => {
            // A concurrent submission with the same key won the race.
            if let (Some(SqlErr::UniqueConstraintViolation(_)), Some(key)) =
                (err.sql_err(), idempotency_key.as_deref())
            {
                txn.rollback().await?;
                return find_replay(state.db(), user.user_id, key, &fingerprint)
                    .await?
                    .map(Placement::Replayed)
                    .ok_or(AppError::OrmError(err));
            }
            return Err(err.into());
        }
    };

    let mut items = Vec::with_capacity(payload.order_items.len());
    for (position, item) in payload.order_items.iter().enumerate() {
        let row = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product),
            qty: Set(item.qty),
            price: Set(item.price),
            position: Set(position as i32),
        }
        .insert(&txn)
        .await?;
        items.push(row);
    }

    txn.commit().await?;

    audit::record(
        state.db(),
        Some(user.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    tracing::info!(order_id = %order.id, user_id = %user.user_id, "order created");
    Ok(Placement::Created(order_from_entity(order, items)))
}

pub async fn list_my_orders(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderList>> {
    let rows = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .find_with_related(OrderItems)
        .all(state.db())
        .await?;

    let items: Vec<Order> = rows
        .into_iter()
        .map(|(order, items)| order_from_entity(order, items))
        .collect();

    let meta = Meta::new(items.len() as i64);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_my_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(state.db())
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let items = order.find_related(OrderItems).all(state.db()).await?;
    Ok(ApiResponse::success(
        "OK",
        order_from_entity(order, items),
        Some(Meta::empty()),
    ))
}

/// Checks everything that can be checked without the database.
///
/// The submitted unit prices are trusted (they are the cart's price snapshot), but the
/// total has to match them so a tampered or stale total is never persisted.
pub fn validate_order_request(payload: &CreateOrderRequest) -> AppResult<()> {
    if payload.order_items.is_empty() {
        return Err(AppError::BadRequest("No items".into()));
    }
    for item in &payload.order_items {
        if item.qty < 1 {
            return Err(AppError::BadRequest(format!(
                "Invalid quantity for product {}",
                item.product
            )));
        }
        if item.price < 0 {
            return Err(AppError::BadRequest(format!(
                "Invalid price for product {}",
                item.product
            )));
        }
    }
    validate_shipping_address(&payload.shipping_address)?;

    if payload.payment_method != CASH_ON_DELIVERY {
        return Err(AppError::BadRequest(format!(
            "Unsupported payment method, only {CASH_ON_DELIVERY} is accepted"
        )));
    }

    let expected = payload
        .items_total()
        .ok_or_else(|| AppError::BadRequest("order total overflows".into()))?;
    if payload.total_price != expected {
        return Err(AppError::BadRequest(format!(
            "totalPrice {} does not match order items total {expected}",
            payload.total_price
        )));
    }
    Ok(())
}

fn validate_shipping_address(address: &ShippingAddress) -> AppResult<()> {
    let missing: Vec<&str> = [
        ("name", &address.name),
        ("email", &address.email),
        ("address", &address.address),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "shippingAddress is missing: {}",
            missing.join(", ")
        )))
    }
}

fn normalize_idempotency_key(key: Option<String>) -> AppResult<Option<String>> {
    match key.map(|k| k.trim().to_string()) {
        None => Ok(None),
        Some(k) if k.is_empty() => Ok(None),
        Some(k) if k.len() > MAX_IDEMPOTENCY_KEY_LEN => Err(AppError::BadRequest(
            "Idempotency-Key is too long".into(),
        )),
        Some(k) => Ok(Some(k)),
    }
}

async fn ensure_products_exist(state: &AppState, items: &[OrderItem]) -> AppResult<()> {
    let wanted: HashSet<Uuid> = items.iter().map(|item| item.product).collect();
    let found: HashSet<Uuid> = Products::find()
        .filter(ProdCol::Id.is_in(wanted.iter().copied()))
        .all(state.db())
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();

    match wanted.difference(&found).next() {
        Some(missing) => Err(AppError::BadRequest(format!("Unknown product {missing}"))),
        None => Ok(()),
    }
}

/// Stable digest of what the order would contain, used to tell a true replay from a
/// reused key.
pub fn request_fingerprint(payload: &CreateOrderRequest) -> AppResult<String> {
    let normalized = CreateOrderRequest {
        shipping_address: ShippingAddress {
            name: payload.shipping_address.name.trim().to_string(),
            email: payload.shipping_address.email.trim().to_string(),
            address: payload.shipping_address.address.trim().to_string(),
        },
        ..payload.clone()
    };
    let body = serde_json::to_vec(&normalized).map_err(|e| AppError::Internal(e.into()))?;

    let mut hasher = Sha256::new();
    hasher.update(&body);
    Ok(hex::encode(hasher.finalize()))
}

/// The caller's earlier order for `key`, or a conflict when that order was placed with a
/// different body.
async fn find_replay<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    key: &str,
    fingerprint: &str,
) -> AppResult<Option<Order>> {
    let Some(order) = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user_id))
                .add(OrderCol::IdempotencyKey.eq(key)),
        )
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    if order.request_fingerprint.as_deref() != Some(fingerprint) {
        tracing::warn!(order_id = %order.id, "idempotency key reused with a different order body");
        return Err(AppError::Conflict(KEY_REUSED.into()));
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(conn)
        .await?;
    Ok(Some(order_from_entity(order, items)))
}

fn order_from_entity(model: OrderModel, mut items: Vec<OrderItemModel>) -> Order {
    items.sort_by_key(|item| item.position);
    Order {
        id: model.id,
        user: model.user_id,
        order_items: items
            .into_iter()
            .map(|item| OrderItem {
                product: item.product_id,
                qty: item.qty,
                price: item.price,
            })
            .collect(),
        shipping_address: ShippingAddress {
            name: model.shipping_name,
            email: model.shipping_email,
            address: model.shipping_address,
        },
        payment_method: model.payment_method,
        total_price: model.total_price,
        idempotency_key: model.idempotency_key,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            order_items: vec![
                OrderItem {
                    product: Uuid::new_v4(),
                    qty: 2,
                    price: 1000,
                },
                OrderItem {
                    product: Uuid::new_v4(),
                    qty: 1,
                    price: 500,
                },
            ],
            shipping_address: ShippingAddress {
                name: "Ayesha".into(),
                email: "ayesha@example.com".into(),
                address: "12 Mall Road, Lahore".into(),
            },
            payment_method: CASH_ON_DELIVERY.into(),
            total_price: 2500,
        }
    }

    #[test]
    fn consistent_request_is_accepted() {
        assert!(validate_order_request(&request()).is_ok());
    }

    #[test]
    fn mismatched_total_is_rejected() {
        let mut payload = request();
        payload.total_price = 100;
        let err = validate_order_request(&payload).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let mut payload = request();
        payload.order_items[0].price = 1 << 62;
        payload.order_items[0].qty = 4;
        payload.total_price = 0;
        let err = validate_order_request(&payload).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(err.to_string(), "order total overflows");
    }

    #[test]
    fn empty_items_are_rejected() {
        let mut payload = request();
        payload.order_items.clear();
        payload.total_price = 0;
        assert_eq!(validate_order_request(&payload).unwrap_err().to_string(), "No items");
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut payload = request();
        payload.order_items[1].qty = 0;
        payload.total_price = 2000;
        assert!(validate_order_request(&payload).is_err());
    }

    #[test]
    fn blank_shipping_fields_are_listed() {
        let mut payload = request();
        payload.shipping_address.name = "  ".into();
        payload.shipping_address.address = String::new();
        let err = validate_order_request(&payload).unwrap_err();
        assert_eq!(err.to_string(), "shippingAddress is missing: name, address");
    }

    #[test]
    fn other_payment_methods_are_rejected() {
        let mut payload = request();
        payload.payment_method = "Card".into();
        assert!(validate_order_request(&payload).is_err());
    }

    #[test]
    fn fingerprint_ignores_padding_but_not_contents() {
        let base = request_fingerprint(&request()).unwrap();

        let mut padded = request();
        padded.shipping_address.name = "  Ayesha ".into();
        assert_eq!(request_fingerprint(&padded).unwrap(), base);

        let mut more = request();
        more.order_items[1].qty = 2;
        more.total_price = 3000;
        assert_ne!(request_fingerprint(&more).unwrap(), base);
        assert_eq!(base.len(), 64);
    }

    #[test]
    fn idempotency_key_normalization() {
        assert_eq!(normalize_idempotency_key(None).unwrap(), None);
        assert_eq!(normalize_idempotency_key(Some("  ".into())).unwrap(), None);
        assert_eq!(
            normalize_idempotency_key(Some(" abc ".into())).unwrap().as_deref(),
            Some("abc")
        );
        assert!(normalize_idempotency_key(Some("x".repeat(300))).is_err());
    }

    #[test]
    fn items_follow_position() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let order = order_from_entity(
            OrderModel {
                id: order_id,
                user_id: Uuid::new_v4(),
                shipping_name: "A".into(),
                shipping_email: "a@example.com".into(),
                shipping_address: "Street".into(),
                payment_method: CASH_ON_DELIVERY.into(),
                total_price: 300,
                idempotency_key: None,
                request_fingerprint: None,
                created_at: now.into(),
            },
            vec![
                OrderItemModel {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id: second,
                    qty: 1,
                    price: 200,
                    position: 1,
                },
                OrderItemModel {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id: first,
                    qty: 1,
                    price: 100,
                    position: 0,
                },
            ],
        );
        let products: Vec<Uuid> = order.order_items.iter().map(|i| i.product).collect();
        assert_eq!(products, vec![first, second]);
    }
}
