//! HTTP/JSON client for the back-office backend.

use std::sync::Arc;

use backoffice_core::{CustomerId, Money, OrderId};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::config::BackendConfig;

use super::types::{
    AuditEntry, CancelRequest, CreateOrderRequest, ErrorBody, Order, OrderListQuery, OrderPage,
    PaymentConfirmation, PaymentStatusUpdate, RefundRequest, StatusUpdate, VoucherValidation,
    VoucherValidationRequest,
};
use super::{ApiError, ApiResult, OrderBackend};

/// Default wait when a 429 response carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Back-office REST API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<SecretString>,
    session_id: Option<String>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built (e.g.,
    /// the TLS backend fails to initialise).
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        // Url::join replaces the last path segment unless the base ends in '/'
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url,
                api_token: config.api_token.clone(),
                session_id: config.session_id.clone(),
            }),
        })
    }

    /// Get the base URL routes are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Resolve a route relative to the base URL.
    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::Network(format!("invalid route {path}: {e}")))
    }

    /// Start a request with authentication and session headers applied.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .inner
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(token) = &self.inner.api_token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(session_id) = &self.inner.session_id {
            builder = builder.header("X-Session-ID", session_id);
        }
        builder
    }

    /// Send a request and decode a JSON response body.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = builder.send().await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Map non-success responses to the matching `ApiError`.
async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ApiError::RateLimited(retry_after));
    }

    let text = response.text().await.unwrap_or_default();
    let message = error_message(status, &text);
    debug!(status = status.as_u16(), %message, "Backend returned an error");

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        _ => ApiError::Rejected {
            status: status.as_u16(),
            message,
        },
    })
}

/// Prefer the backend's `message` field, then the raw body, then the reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string())
}

impl OrderBackend for BackendClient {
    #[instrument(skip(self))]
    async fn list_orders(&self, query: &OrderListQuery) -> ApiResult<OrderPage> {
        let mut url = self.endpoint("orders")?;
        let pairs = query.to_query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        self.send(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn get_order(&self, id: OrderId) -> ApiResult<Order> {
        let url = self.endpoint(&format!("orders/{id}"))?;
        self.send(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    async fn create_order(&self, request: &CreateOrderRequest) -> ApiResult<Order> {
        let url = self.endpoint("orders")?;
        self.send(self.request(Method::POST, url).json(request)).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn update_order_status(&self, id: OrderId, update: &StatusUpdate) -> ApiResult<Order> {
        let url = self.endpoint(&format!("orders/{id}/status"))?;
        self.send(self.request(Method::PUT, url).json(update)).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn update_payment_status(
        &self,
        id: OrderId,
        update: &PaymentStatusUpdate,
    ) -> ApiResult<Order> {
        let url = self.endpoint(&format!("orders/{id}/payment-status"))?;
        self.send(self.request(Method::PUT, url).json(update)).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn cancel_order(&self, id: OrderId, request: &CancelRequest) -> ApiResult<Order> {
        let url = self.endpoint(&format!("orders/{id}/cancel"))?;
        self.send(self.request(Method::POST, url).json(request)).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn confirm_payment(
        &self,
        id: OrderId,
        confirmation: &PaymentConfirmation,
    ) -> ApiResult<Order> {
        let url = self.endpoint(&format!("orders/{id}/confirm-payment"))?;
        self.send(self.request(Method::POST, url).json(confirmation))
            .await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn refund_order(&self, id: OrderId, request: &RefundRequest) -> ApiResult<Order> {
        let url = self.endpoint(&format!("orders/{id}/refund"))?;
        self.send(self.request(Method::POST, url).json(request)).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn order_audit_history(&self, id: OrderId) -> ApiResult<Vec<AuditEntry>> {
        let url = self.endpoint(&format!("orders/{id}/audit-history"))?;
        self.send(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self))]
    async fn validate_voucher(
        &self,
        code: &str,
        customer_id: Option<CustomerId>,
        order_total: Money,
    ) -> ApiResult<VoucherValidation> {
        let url = self.endpoint("vouchers/validate")?;
        let body = VoucherValidationRequest {
            code: code.to_string(),
            customer_id,
            order_total,
        };
        self.send(self.request(Method::POST, url).json(&body)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(base: &str) -> BackendConfig {
        BackendConfig {
            base_url: Url::parse(base).unwrap(),
            api_token: None,
            session_id: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = BackendClient::new(&config("http://localhost:8080/api/v1")).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/api/v1/");
        assert_eq!(
            client.endpoint("orders/7").unwrap().as_str(),
            "http://localhost:8080/api/v1/orders/7"
        );
    }

    #[test]
    fn test_order_routes_resolve_under_base_path() {
        let client = BackendClient::new(&config("https://backoffice.internal/api/")).unwrap();
        assert_eq!(
            client.endpoint("orders/7/confirm-payment").unwrap().as_str(),
            "https://backoffice.internal/api/orders/7/confirm-payment"
        );
        assert_eq!(
            client.endpoint("orders/7/audit-history").unwrap().as_str(),
            "https://backoffice.internal/api/orders/7/audit-history"
        );
    }

    #[test]
    fn test_error_message_prefers_json_message() {
        let message = error_message(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"voucher expired"}"#,
        );
        assert_eq!(message, "voucher expired");
    }

    #[test]
    fn test_error_message_falls_back_to_body_then_reason() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(error_message(StatusCode::NOT_FOUND, "  "), "Not Found");
    }
}
