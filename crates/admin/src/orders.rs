//! Cached, deduplicated access to backend orders.
//!
//! Reads go cache, then in-flight dedup, then backend; successful responses
//! are cached for the per-resource TTL. Writes invalidate the cache entries
//! they make stale and detach reads already in flight for them, so a read
//! issued after a write never receives or re-caches pre-write data.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backoffice_core::{CustomerId, Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus};
use futures::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::api::{
    ApiResult, AuditEntry, BatchCancellation, CancelRequest, CreateOrderRequest, Order,
    OrderBackend, OrderListQuery, OrderPage, PaymentConfirmation, PaymentStatusUpdate,
    RefundRequest, StatusUpdate, VoucherValidation,
};
use crate::cache::{
    CacheKey, InFlight, KeyPattern, ORDER_AUDIT, ORDER_DETAIL, ORDER_LIST, ResponseCache,
};
use crate::config::CacheConfig;

/// Orders fetched concurrently per preload batch.
const PRELOAD_BATCH_SIZE: usize = 10;

/// Cache key for one order.
#[must_use]
pub fn detail_key(id: OrderId) -> CacheKey {
    CacheKey::new(ORDER_DETAIL, &json!({ "id": id }))
}

/// Cache key for one order listing, after normalizing the query.
#[must_use]
pub fn list_key(query: &OrderListQuery) -> CacheKey {
    CacheKey::new(ORDER_LIST, &query.normalized())
}

/// Cache key for one order's change history.
#[must_use]
pub fn audit_key(id: OrderId) -> CacheKey {
    CacheKey::new(ORDER_AUDIT, &json!({ "id": id }))
}

/// Order operations over an [`OrderBackend`].
pub struct OrderService<B> {
    backend: Arc<B>,
    cache: ResponseCache,
    list_ttl: Duration,
    detail_ttl: Duration,
    pending_lists: InFlight<OrderPage>,
    pending_details: InFlight<Order>,
    pending_audits: InFlight<Vec<AuditEntry>>,
}

impl<B: OrderBackend> OrderService<B> {
    /// Create a service over a backend and a shared cache.
    #[must_use]
    pub fn new(backend: B, cache: ResponseCache, config: &CacheConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            cache,
            list_ttl: config.order_list_ttl,
            detail_ttl: config.order_detail_ttl,
            pending_lists: InFlight::new(),
            pending_details: InFlight::new(),
            pending_audits: InFlight::new(),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Serve `key` from the cache, or join/start a fetch that caches its
    /// result unless a write detaches it first.
    async fn read_through<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        pending: &InFlight<T>,
        fetch: F,
    ) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        if let Some(hit) = self.cache.get_as::<T>(key.as_str()) {
            return Ok(hit);
        }

        let cache = self.cache.clone();
        let cache_key = key.clone();
        pending
            .run(key.as_str(), fetch, move |value| {
                cache.set_json(cache_key.as_str(), value, Some(ttl));
            })
            .await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch one page of orders.
    ///
    /// The query is normalized first, so queries the backend treats alike
    /// share one cache entry.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the page is not cached and the request
    /// fails. Concurrent callers for the same query share one request and
    /// its result.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, query: &OrderListQuery) -> ApiResult<OrderPage> {
        let query = query.normalized();
        let key = CacheKey::new(ORDER_LIST, &query);
        let backend = Arc::clone(&self.backend);

        self.read_through(&key, self.list_ttl, &self.pending_lists, move || async move {
            let page = backend.list_orders(&query).await?;
            debug!(count = page.content.len(), "Fetched order page");
            Ok(page)
        })
        .await
    }

    /// Fetch a single order.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the order is not cached and the
    /// request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> ApiResult<Order> {
        let backend = Arc::clone(&self.backend);
        self.read_through(
            &detail_key(id),
            self.detail_ttl,
            &self.pending_details,
            move || async move { backend.get_order(id).await },
        )
        .await
    }

    /// Fetch an order's change history, oldest first.
    ///
    /// Cached for the detail TTL and dropped whenever the order is written.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the history is not cached and the
    /// request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn audit_history(&self, id: OrderId) -> ApiResult<Vec<AuditEntry>> {
        let backend = Arc::clone(&self.backend);
        self.read_through(
            &audit_key(id),
            self.detail_ttl,
            &self.pending_audits,
            move || async move { backend.order_audit_history(id).await },
        )
        .await
    }

    /// Validate a voucher code. Never cached.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the request fails.
    #[instrument(skip(self))]
    pub async fn validate_voucher(
        &self,
        code: &str,
        customer_id: Option<CustomerId>,
        order_total: Money,
    ) -> ApiResult<VoucherValidation> {
        self.backend
            .validate_voucher(code, customer_id, order_total)
            .await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create an order.
    ///
    /// On success every cached listing is dropped and the new order's detail
    /// is cached.
    ///
    /// # Errors
    ///
    /// Returns the backend error if creation fails; the cache is untouched.
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_order(&self, request: &CreateOrderRequest) -> ApiResult<Order> {
        let order = self.backend.create_order(request).await?;

        self.invalidate_lists();
        self.cache
            .set_json(detail_key(order.id).as_str(), &order, Some(self.detail_ttl));

        info!(order_id = %order.id, code = %order.code, "Order created");
        Ok(order)
    }

    /// Move an order to a new status.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the transition is refused.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        reason: &str,
    ) -> ApiResult<Order> {
        let update = StatusUpdate {
            status,
            reason: reason.to_string(),
        };
        let order = self.backend.update_order_status(id, &update).await?;
        self.invalidate_order(id);
        info!(%status, "Order status updated");
        Ok(order)
    }

    /// Change an order's payment status.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the change is refused.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
        note: Option<&str>,
    ) -> ApiResult<Order> {
        let update = PaymentStatusUpdate {
            payment_status,
            note: note.map(str::to_string),
        };
        let order = self.backend.update_payment_status(id, &update).await?;
        self.invalidate_order(id);
        info!(%payment_status, "Payment status updated");
        Ok(order)
    }

    /// Record that an order has been paid with `method`.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the confirmation is refused.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn confirm_payment(
        &self,
        id: OrderId,
        method: PaymentMethod,
        transaction_ref: Option<&str>,
    ) -> ApiResult<Order> {
        let confirmation = PaymentConfirmation {
            payment_method: method,
            transaction_ref: transaction_ref.map(str::to_string),
        };
        let order = self.backend.confirm_payment(id, &confirmation).await?;
        self.invalidate_order(id);
        info!(%method, "Payment confirmed");
        Ok(order)
    }

    /// Refund `amount` of an order.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the refund is refused.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn refund_order(&self, id: OrderId, amount: Money, reason: &str) -> ApiResult<Order> {
        let request = RefundRequest {
            amount,
            reason: reason.to_string(),
        };
        let order = self.backend.refund_order(id, &request).await?;
        self.invalidate_order(id);
        info!(%amount, "Order refunded");
        Ok(order)
    }

    /// Cancel an order.
    ///
    /// # Errors
    ///
    /// Returns the backend error if cancellation is refused.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel_order(&self, id: OrderId, reason: &str) -> ApiResult<Order> {
        let request = CancelRequest {
            reason: reason.to_string(),
        };
        let order = self.backend.cancel_order(id, &request).await?;
        self.invalidate_order(id);
        info!("Order cancelled");
        Ok(order)
    }

    /// Cancel several orders concurrently with the same reason.
    ///
    /// Each order succeeds or fails on its own; failures are logged and
    /// reported in the outcome alongside the cancelled orders.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn cancel_orders(&self, ids: &[OrderId], reason: &str) -> BatchCancellation {
        let results = join_all(ids.iter().map(|&id| self.cancel_order(id, reason))).await;

        let mut outcome = BatchCancellation::default();
        for (&id, result) in ids.iter().zip(results) {
            match result {
                Ok(order) => outcome.cancelled.push(order),
                Err(e) => {
                    warn!(order_id = %id, error = %e, "Failed to cancel order");
                    outcome.failed.push((id, e));
                }
            }
        }

        info!(
            cancelled = outcome.cancelled.len(),
            failed = outcome.failed.len(),
            "Batch cancellation finished"
        );
        outcome
    }

    // =========================================================================
    // Cache management
    // =========================================================================

    /// Drop every cached listing and detach list requests in flight.
    fn invalidate_lists(&self) -> usize {
        let lists = KeyPattern::resource(ORDER_LIST);
        self.pending_lists.forget(&lists);
        self.cache.invalidate_by_pattern(&lists)
    }

    /// Drop the cached detail and history of one order and every cached
    /// listing.
    ///
    /// Reads of those keys already in flight are detached: later callers
    /// start a fresh request and the detached ones no longer cache.
    /// Returns the number of cache entries removed.
    pub fn invalidate_order(&self, id: OrderId) -> usize {
        let detail = detail_key(id);
        let audit = audit_key(id);
        self.pending_details.forget(&KeyPattern::from(&detail));
        self.pending_audits.forget(&KeyPattern::from(&audit));

        usize::from(self.cache.remove(detail.as_str()))
            + usize::from(self.cache.remove(audit.as_str()))
            + self.invalidate_lists()
    }

    /// Warm the cache with orders that are not cached yet.
    ///
    /// Orders are fetched in concurrent batches; failures are logged and
    /// skipped. Returns the number of orders loaded.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn preload_orders(&self, ids: &[OrderId]) -> usize {
        let missing: Vec<OrderId> = ids
            .iter()
            .copied()
            .filter(|&id| !self.cache.contains(detail_key(id).as_str()))
            .collect();

        let mut loaded = 0;
        for batch in missing.chunks(PRELOAD_BATCH_SIZE) {
            let results = join_all(batch.iter().map(|&id| self.get_order(id))).await;
            for (id, result) in batch.iter().zip(results) {
                match result {
                    Ok(_) => loaded += 1,
                    Err(e) => warn!(order_id = %id, error = %e, "Failed to preload order"),
                }
            }
        }

        debug!(loaded, "Preloaded orders");
        loaded
    }
}
