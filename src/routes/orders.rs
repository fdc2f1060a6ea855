use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, OrderList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::{ApiResponse, Meta},
    services::order_service::{self, Placement},
    state::AppState,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(create_order))
        .route("/mine", get(list_my_orders))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Client generated key; replays return the original order")
    ),
    responses(
        (status = 201, description = "Order created", body = ApiResponse<Order>),
        (status = 200, description = "Order already created for this idempotency key", body = ApiResponse<Order>),
        (status = 400, description = "Invalid order"),
        (status = 401, description = "Missing or invalid token"),
        (status = 409, description = "Idempotency key already used for a different order")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let placement = order_service::create_order(&state, &user, idempotency_key, payload).await?;
    let (status, message) = match &placement {
        Placement::Created(_) => (StatusCode::CREATED, "Order created"),
        Placement::Replayed(_) => (StatusCode::OK, "Order already created"),
    };
    Ok((
        status,
        Json(ApiResponse::success(
            message,
            placement.into_order(),
            Some(Meta::empty()),
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/orders/mine",
    responses(
        (status = 200, description = "Orders of the caller, newest first", body = ApiResponse<OrderList>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_my_orders(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<Order>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::get_my_order(&state, &user, id).await?;
    Ok(Json(resp))
}
