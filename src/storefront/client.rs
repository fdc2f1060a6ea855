//! HTTP client for the storefront API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        orders::CreateOrderRequest,
        products::{CreateProductRequest, UpdateProductRequest},
    },
    models::{Order, Product, User},
    response::ApiResponse,
    storefront::{
        catalog::CatalogGateway,
        checkout::OrderGateway,
        error::{ClientError, ClientResult},
        session::{Session, SessionProvider},
    },
};

const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://localhost:3000`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 30,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Talks to the `/api` routes and unwraps the response envelope.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> ClientResult<T> {
        let request = Self::authorized(self.client.get(self.url(path)), token);
        Self::handle_response(request.send().await?).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> ClientResult<T> {
        let request = Self::authorized(self.client.post(self.url(path)).json(body), token);
        Self::handle_response(request.send().await?).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = Self::authorized(self.client.put(self.url(path)).json(body), Some(token));
        Self::handle_response(request.send().await?).await
    }

    async fn delete(&self, path: &str, token: &str) -> ClientResult<()> {
        let request = Self::authorized(self.client.delete(self.url(path)), Some(token));
        Self::handle_response::<serde_json::Value>(request.send().await?)
            .await
            .map(|_| ())
    }

    /// Map the status to a [`ClientError`] or unwrap `data` from the envelope.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
                .map(|body| body.message)
                .unwrap_or(text);
            tracing::debug!(status = status.as_u16(), %message, "request rejected");

            return Err(match status {
                StatusCode::BAD_REQUEST
                | StatusCode::PAYLOAD_TOO_LARGE
                | StatusCode::UNSUPPORTED_MEDIA_TYPE
                | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation(message),
                StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
                StatusCode::FORBIDDEN => ClientError::Forbidden(message),
                StatusCode::NOT_FOUND => ClientError::NotFound(message),
                StatusCode::CONFLICT => ClientError::Conflict(message),
                _ => ClientError::Server {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        serde_json::from_str::<ApiResponse<T>>(&text)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?
            .data
            .ok_or_else(|| ClientError::InvalidResponse("Missing response data".to_string()))
    }
}

#[async_trait]
impl SessionProvider for ApiClient {
    async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = self.post("auth/login", None, &request).await?;
        Ok(resp.into())
    }

    async fn register(&self, request: &RegisterRequest) -> ClientResult<User> {
        self.post("auth/register", None, request).await
    }
}

#[async_trait]
impl CatalogGateway for ApiClient {
    async fn list_products(&self) -> ClientResult<Vec<Product>> {
        self.get("products", None).await
    }

    async fn product_by_slug(&self, slug: &str) -> ClientResult<Product> {
        self.get(&format!("products/{slug}"), None).await
    }

    async fn create_product(
        &self,
        token: &str,
        request: &CreateProductRequest,
    ) -> ClientResult<Product> {
        self.post("products", Some(token), request).await
    }

    async fn update_product(
        &self,
        token: &str,
        id: Uuid,
        request: &UpdateProductRequest,
    ) -> ClientResult<Product> {
        self.put(&format!("products/{id}"), token, request).await
    }

    async fn delete_product(&self, token: &str, id: Uuid) -> ClientResult<()> {
        self.delete(&format!("products/{id}"), token).await
    }
}

#[async_trait]
impl OrderGateway for ApiClient {
    async fn create_order(
        &self,
        token: &str,
        idempotency_key: &str,
        request: &CreateOrderRequest,
    ) -> ClientResult<Order> {
        let builder = self
            .client
            .post(self.url("orders"))
            .header(IDEMPOTENCY_KEY, idempotency_key)
            .json(request);
        let response = Self::authorized(builder, Some(token)).send().await?;
        Self::handle_response(response).await
    }

    async fn my_orders(&self, token: &str) -> ClientResult<Vec<Order>> {
        self.get("orders/mine", Some(token)).await
    }
}
