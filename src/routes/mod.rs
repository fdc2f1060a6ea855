use axum::{Router, routing::get};

use crate::state::AppState;

pub mod auth;
pub mod doc;
pub mod health;
pub mod orders;
pub mod products;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .nest("/orders", orders::router())
}
