use std::time::Duration;

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri, header},
    routing::get,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::{
    config::AppConfig,
    response::{ApiResponse, Meta},
    routes::{create_api_router, doc::scalar_docs, health, orders::IDEMPOTENCY_KEY_HEADER},
    state::AppState,
};

/// HTTP-level limits and CORS origin applied around the API.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub client_url: String,
    pub body_limit_bytes: usize,
    pub concurrency_limit: usize,
}

impl HttpSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client_url: config.client_url.clone(),
            body_limit_bytes: config.body_limit_bytes,
            concurrency_limit: config.concurrency_limit,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            client_url: "http://localhost:5173".into(),
            body_limit_bytes: 10 * 1024 * 1024,
            concurrency_limit: 100,
        }
    }
}

pub fn create_app(state: AppState, settings: &HttpSettings) -> anyhow::Result<Router> {
    let request_id_header = HeaderName::from_static("x-request-id");
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_request(|_request: &Request<_>, _span: &tracing::Span| {
            tracing::debug!("request started");
        })
        .on_response(|response: &Response<_>, latency: Duration, _span: &tracing::Span| {
            tracing::info!(
                status = %response.status(),
                ms = %latency.as_millis(),
                "request finished"
            );
        });

    let cors = CorsLayer::new()
        .allow_origin(settings.client_url.parse::<HeaderValue>()?)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
        ])
        .allow_credentials(true);

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router())
        .merge(scalar_docs())
        .fallback(not_found)
        .layer(trace_layer)
        .layer(cors)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(settings.body_limit_bytes))
        .layer(ConcurrencyLimitLayer::new(settings.concurrency_limit))
        .with_state(state);

    Ok(app)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let body = ApiResponse::success(
        "API endpoint not found",
        serde_json::json!({ "path": uri.path() }),
        Some(Meta::empty()),
    );
    (StatusCode::NOT_FOUND, Json(body))
}
