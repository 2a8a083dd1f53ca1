//! Back-office backend API.
//!
//! # Architecture
//!
//! - [`OrderBackend`] is the boundary to the remote backend: everything the
//!   order desk needs from the server goes through it
//! - [`BackendClient`] implements it over HTTP/JSON with `reqwest`
//! - Every call returns a tagged `Result<T, ApiError>`; callers match on the
//!   error kind instead of probing response shapes
//!
//! # Example
//!
//! ```rust,ignore
//! use backoffice_admin::api::{BackendClient, OrderBackend, OrderListQuery};
//!
//! let client = BackendClient::new(&config.backend)?;
//!
//! let page = client.list_orders(&OrderListQuery::page(0, 20)).await?;
//! let order = client.get_order(page.content[0].id).await?;
//! ```

mod client;
pub mod types;

pub use client::BackendClient;
pub use types::*;

use std::future::Future;

use backoffice_core::{CustomerId, Money, OrderId};
use thiserror::Error;

/// Result alias for backend calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur when talking to the backend.
///
/// Cloneable so that callers sharing one deduplicated request all receive the
/// same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request could not be delivered (connection refused, DNS, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The backend refused the request.
    #[error("Rejected by backend ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message from the backend, if any.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::Unauthorized(_) | Self::NotFound(_) | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Operations the order desk needs from the backend.
///
/// Route shapes belong to the backend; implementors only have to honour
/// these signatures.
pub trait OrderBackend: Send + Sync + 'static {
    /// Fetch one page of orders.
    fn list_orders(
        &self,
        query: &OrderListQuery,
    ) -> impl Future<Output = ApiResult<OrderPage>> + Send;

    /// Fetch a single order.
    fn get_order(&self, id: OrderId) -> impl Future<Output = ApiResult<Order>> + Send;

    /// Create an order, returning the backend-confirmed record.
    fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> impl Future<Output = ApiResult<Order>> + Send;

    /// Request an order status transition.
    fn update_order_status(
        &self,
        id: OrderId,
        update: &StatusUpdate,
    ) -> impl Future<Output = ApiResult<Order>> + Send;

    /// Change an order's payment status.
    fn update_payment_status(
        &self,
        id: OrderId,
        update: &PaymentStatusUpdate,
    ) -> impl Future<Output = ApiResult<Order>> + Send;

    /// Cancel an order.
    fn cancel_order(
        &self,
        id: OrderId,
        request: &CancelRequest,
    ) -> impl Future<Output = ApiResult<Order>> + Send;

    /// Record that an order has been paid.
    fn confirm_payment(
        &self,
        id: OrderId,
        confirmation: &PaymentConfirmation,
    ) -> impl Future<Output = ApiResult<Order>> + Send;

    /// Refund part or all of an order.
    fn refund_order(
        &self,
        id: OrderId,
        request: &RefundRequest,
    ) -> impl Future<Output = ApiResult<Order>> + Send;

    /// Fetch the change history of an order, oldest first.
    fn order_audit_history(
        &self,
        id: OrderId,
    ) -> impl Future<Output = ApiResult<Vec<AuditEntry>>> + Send;

    /// Validate a voucher code for a customer and order total.
    fn validate_voucher(
        &self,
        code: &str,
        customer_id: Option<CustomerId>,
        order_total: Money,
    ) -> impl Future<Output = ApiResult<VoucherValidation>> + Send;
}
