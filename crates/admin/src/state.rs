//! Application state shared across the order desk.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::api::{BackendClient, Order, OrderBackend};
use crate::cache::ResponseCache;
use crate::config::AdminConfig;
use crate::drafts::DraftManager;
use crate::error::AppError;
use crate::orders::OrderService;

/// Application state shared across all handlers.
///
/// Cheap to clone; clones share the cache, the backend and the drafts.
pub struct AppState<B = BackendClient> {
    inner: Arc<AppStateInner<B>>,
}

struct AppStateInner<B> {
    config: AdminConfig,
    orders: OrderService<B>,
    // Held across the submit request, so an async mutex
    drafts: Mutex<DraftManager>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AppState {
    /// Build state talking to the configured HTTP backend.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Api` if the HTTP client cannot be built.
    pub fn new(config: AdminConfig) -> Result<Self, AppError> {
        let backend = BackendClient::new(&config.backend)?;
        Ok(Self::with_backend(config, backend))
    }
}

impl<B: OrderBackend> AppState<B> {
    /// Build state over any backend.
    #[must_use]
    pub fn with_backend(config: AdminConfig, backend: B) -> Self {
        let cache = ResponseCache::new(&config.cache);
        Self::with_parts(config, backend, cache)
    }

    /// Build state over a backend and an existing cache.
    #[must_use]
    pub fn with_parts(config: AdminConfig, backend: B, cache: ResponseCache) -> Self {
        let orders = OrderService::new(backend, cache, &config.cache);
        let drafts = DraftManager::new(config.drafts.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                orders,
                drafts: Mutex::new(drafts),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService<B> {
        &self.inner.orders
    }

    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        self.inner.orders.cache()
    }

    /// Lock the draft manager.
    pub async fn drafts(&self) -> MutexGuard<'_, DraftManager> {
        self.inner.drafts.lock().await
    }

    /// Submit the active draft, reporting any failure.
    ///
    /// # Errors
    ///
    /// Returns the draft or backend error after it has been reported.
    pub async fn submit_active_draft(&self) -> Result<Option<Order>, AppError> {
        let mut drafts = self.drafts().await;
        drafts
            .submit_active_draft(self.orders())
            .await
            .map_err(|e| {
                let err = AppError::from(e);
                err.report();
                err
            })
    }
}
