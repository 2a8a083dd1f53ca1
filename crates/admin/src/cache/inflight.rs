//! In-flight request deduplication.
//!
//! Concurrent callers asking for the same key share one backend call: the
//! first caller starts it, later callers await the same [`Shared`] future and
//! receive a clone of its result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

use super::KeyPattern;
use crate::api::ApiResult;

type SharedRequest<T> = Shared<BoxFuture<'static, ApiResult<T>>>;

struct Pending<T> {
    requests: HashMap<String, (u64, SharedRequest<T>)>,
    next_id: u64,
}

/// Map of outstanding requests keyed by cache key.
pub struct InFlight<T> {
    pending: Arc<Mutex<Pending<T>>>,
}

fn lock<T>(pending: &Mutex<Pending<T>>) -> MutexGuard<'_, Pending<T>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(Pending {
                requests: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Run `request` for `key`, or join the request already running for it.
    ///
    /// On success `store` receives the value, unless the request was
    /// [forgotten](InFlight::forget) while it ran. `store` runs under the map
    /// lock, so it cannot interleave with `forget`.
    ///
    /// The entry is removed as soon as the shared future completes, whichever
    /// caller happens to drive it.
    pub async fn run<F, Fut, S>(&self, key: &str, request: F, store: S) -> ApiResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
        S: FnOnce(&T) + Send + 'static,
    {
        let shared = {
            let mut pending = lock(&self.pending);
            if let Some((_, existing)) = pending.requests.get(key) {
                debug!(key, "Joining in-flight request");
                existing.clone()
            } else {
                pending.next_id += 1;
                let id = pending.next_id;
                let map = Arc::clone(&self.pending);
                let owned_key = key.to_string();
                let fut = request();
                let shared = async move {
                    let result = fut.await;
                    let mut pending = lock(&map);
                    let current = pending
                        .requests
                        .get(&owned_key)
                        .is_some_and(|(entry_id, _)| *entry_id == id);
                    if current {
                        pending.requests.remove(&owned_key);
                        if let Ok(value) = &result {
                            store(value);
                        }
                    } else {
                        debug!(key = %owned_key, "Request was forgotten, not storing result");
                    }
                    result
                }
                .boxed()
                .shared();
                pending
                    .requests
                    .insert(key.to_string(), (id, shared.clone()));
                shared
            }
        };
        shared.await
    }

    /// Detach every outstanding request the pattern selects.
    ///
    /// Callers already waiting still get their result, but later calls start
    /// a new request and the detached ones no longer store. Returns the number
    /// of requests detached.
    pub fn forget(&self, pattern: &KeyPattern) -> usize {
        let mut pending = lock(&self.pending);
        let before = pending.requests.len();
        pending.requests.retain(|key, _| !pattern.matches(key));
        before - pending.requests.len()
    }

    /// Number of requests currently outstanding.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.pending).requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
