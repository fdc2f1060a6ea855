use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use http_body_util::BodyExt;
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::{Value, json};
use storefront_api::{
    app::{HttpSettings, create_app},
    dto::orders::CreateOrderRequest,
    entity::{order_items, orders, products},
    models::{CASH_ON_DELIVERY, OrderItem, Role, ShippingAddress, User},
    services::{auth_service::issue_token, order_service::request_fingerprint},
    state::{AppState, AuthSettings},
};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "router-test-secret";

fn auth_settings() -> AuthSettings {
    AuthSettings {
        jwt_secret: SECRET.into(),
        jwt_ttl_hours: 1,
    }
}

fn app_with(db: MockDatabase) -> Router {
    let state = AppState::new(db.into_connection(), auth_settings());
    create_app(state, &HttpSettings::default()).expect("app")
}

fn empty_app() -> Router {
    app_with(MockDatabase::new(DatabaseBackend::Postgres))
}

fn token_for(role: Role) -> String {
    token_for_user(Uuid::new_v4(), role)
}

fn token_for_user(id: Uuid, role: Role) -> String {
    let user = User {
        id,
        name: "Tester".into(),
        email: "tester@example.com".into(),
        role,
        created_at: Utc::now(),
    };
    issue_token(&auth_settings(), &user).expect("token")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn order_body(total_price: i64) -> Value {
    json!({
        "orderItems": [
            { "product": Uuid::new_v4(), "qty": 2, "price": 1000 },
            { "product": Uuid::new_v4(), "qty": 1, "price": 500 }
        ],
        "shippingAddress": {
            "name": "Bilal",
            "email": "bilal@example.com",
            "address": "12 Mall Road"
        },
        "paymentMethod": "Cash on Delivery",
        "totalPrice": total_price
    })
}

#[tokio::test]
async fn unknown_slug_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<products::Model>::new()]);
    let request = Request::get("/api/products/unknown-slug")
        .body(Body::empty())
        .expect("request");

    let (status, body) = send(app_with(db), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Product not found");
}

#[tokio::test]
async fn product_list_is_wrapped_in_the_envelope() {
    let now = Utc::now().fixed_offset();
    let model = products::Model {
        id: Uuid::new_v4(),
        title: "Seiko 5".into(),
        slug: "seiko-5".into(),
        description: None,
        brand: Some("Seiko".into()),
        category: Some("Men".into()),
        price: 25000,
        count_in_stock: 4,
        images: json!(["seiko.png"]),
        rating: 4.5,
        num_reviews: 2,
        created_at: now,
        updated_at: now,
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![model]]);
    let request = Request::get("/api/products")
        .body(Body::empty())
        .expect("request");

    let (status, body) = send(app_with(db), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["slug"], "seiko-5");
    assert_eq!(body["data"][0]["countInStock"], 4);
    assert_eq!(body["meta"]["total"], 1);
}

#[tokio::test]
async fn creating_a_product_without_token_is_unauthorized() {
    let request = json_request(
        "POST",
        "/api/products",
        None,
        json!({ "title": "Casio", "price": 100 }),
    );

    let (status, body) = send(empty_app(), request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized, no token");
}

#[tokio::test]
async fn shoppers_cannot_create_products() {
    let token = token_for(Role::User);
    let request = json_request(
        "POST",
        "/api/products",
        Some(&token),
        json!({ "title": "Casio", "price": 100 }),
    );

    let (status, _) = send(empty_app(), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let user = User {
        id: Uuid::new_v4(),
        name: "Mallory".into(),
        email: "mallory@example.com".into(),
        role: Role::Admin,
        created_at: Utc::now(),
    };
    let forged = issue_token(
        &AuthSettings {
            jwt_secret: "other-secret".into(),
            jwt_ttl_hours: 1,
        },
        &user,
    )
    .expect("token");
    let request = Request::get("/api/orders/mine")
        .header(header::AUTHORIZATION, format!("Bearer {forged}"))
        .body(Body::empty())
        .expect("request");

    let (status, _) = send(empty_app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn orders_require_a_token() {
    let request = json_request("POST", "/api/orders", None, order_body(2500));
    let (status, _) = send(empty_app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn order_total_must_match_items() {
    let token = token_for(Role::User);
    let request = json_request("POST", "/api/orders", Some(&token), order_body(100));

    let (status, body) = send(empty_app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "totalPrice 100 does not match order items total 2500"
    );
}

#[tokio::test]
async fn empty_order_is_rejected() {
    let token = token_for(Role::User);
    let mut body = order_body(0);
    body["orderItems"] = json!([]);
    let request = json_request("POST", "/api/orders", Some(&token), body);

    let (status, body) = send(empty_app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No items");
}

#[tokio::test]
async fn unknown_endpoint_is_not_found() {
    let request = Request::get("/api/nope")
        .body(Body::empty())
        .expect("request");

    let (status, body) = send(empty_app(), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "API endpoint not found");
    assert_eq!(body["data"]["path"], "/api/nope");
}

#[tokio::test]
async fn health_is_served_at_both_paths() {
    for path in ["/health", "/api/health"] {
        let request = Request::get(path).body(Body::empty()).expect("request");
        let (status, body) = send(empty_app(), request).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(body["data"]["status"], "ok");
    }
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let request = Request::get("/health").body(Body::empty()).expect("request");
    let response = empty_app().oneshot(request).await.expect("response");
    assert!(response.headers().contains_key("x-request-id"));
}

fn order_request() -> CreateOrderRequest {
    CreateOrderRequest {
        order_items: vec![OrderItem {
            product: Uuid::new_v4(),
            qty: 2,
            price: 1000,
        }],
        shipping_address: ShippingAddress {
            name: "Bilal".into(),
            email: "bilal@example.com".into(),
            address: "12 Mall Road".into(),
        },
        payment_method: CASH_ON_DELIVERY.into(),
        total_price: 2000,
    }
}

fn stored_order(user_id: Uuid, key: &str, fingerprint: &str) -> orders::Model {
    orders::Model {
        id: Uuid::new_v4(),
        user_id,
        shipping_name: "Bilal".into(),
        shipping_email: "bilal@example.com".into(),
        shipping_address: "12 Mall Road".into(),
        payment_method: CASH_ON_DELIVERY.into(),
        total_price: 2000,
        idempotency_key: Some(key.into()),
        request_fingerprint: Some(fingerprint.into()),
        created_at: Utc::now().fixed_offset(),
    }
}

fn keyed_order_request(token: &str, key: &str, body: &CreateOrderRequest) -> Request<Body> {
    let mut request = json_request(
        "POST",
        "/api/orders",
        Some(token),
        serde_json::to_value(body).expect("json"),
    );
    request
        .headers_mut()
        .insert("idempotency-key", key.parse().expect("header"));
    request
}

#[tokio::test]
async fn overflowing_order_total_is_rejected() {
    let token = token_for(Role::User);
    let mut body = order_body(0);
    body["orderItems"] = json!([{ "product": Uuid::new_v4(), "qty": 4, "price": 1_i64 << 62 }]);
    let request = json_request("POST", "/api/orders", Some(&token), body);

    let (status, body) = send(empty_app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "order total overflows");
}

#[tokio::test]
async fn another_users_order_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<orders::Model>::new()]);
    let token = token_for(Role::User);
    let request = Request::get(format!("/api/orders/{}", Uuid::new_v4()))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request");

    let (status, body) = send(app_with(db), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Order not found");
}

#[tokio::test]
async fn replayed_key_returns_the_original_order() {
    let user_id = Uuid::new_v4();
    let payload = order_request();
    let fingerprint = request_fingerprint(&payload).expect("fingerprint");
    let stored = stored_order(user_id, "key-1", &fingerprint);
    let item = order_items::Model {
        id: Uuid::new_v4(),
        order_id: stored.id,
        product_id: payload.order_items[0].product,
        qty: 2,
        price: 1000,
        position: 0,
    };
    let order_id = stored.id;
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![stored]])
        .append_query_results([vec![item]]);

    let token = token_for_user(user_id, Role::User);
    let (status, body) = send(app_with(db), keyed_order_request(&token, "key-1", &payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Order already created");
    assert_eq!(body["data"]["id"], order_id.to_string());
    assert_eq!(body["data"]["orderItems"][0]["qty"], 2);
}

#[tokio::test]
async fn reused_key_with_another_cart_conflicts() {
    let user_id = Uuid::new_v4();
    let first = order_request();
    let stored = stored_order(
        user_id,
        "key-1",
        &request_fingerprint(&first).expect("fingerprint"),
    );
    let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![stored]]);

    let mut changed = first.clone();
    changed.order_items.push(OrderItem {
        product: Uuid::new_v4(),
        qty: 1,
        price: 500,
    });
    changed.total_price = 2500;

    let token = token_for_user(user_id, Role::User);
    let (status, body) = send(app_with(db), keyed_order_request(&token, "key-1", &changed)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "Idempotency-Key was already used for a different order"
    );
}
