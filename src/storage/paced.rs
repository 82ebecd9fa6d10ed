use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::core::error::StorageError;

use super::ObjectStore;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

// ---------------------------------------------------------------------------
// PacedStore
// ---------------------------------------------------------------------------

/// Wraps an `ObjectStore` so every request waits for a GCRA permit first.
///
/// Pacing only shapes request timing against backend throttling; the
/// results of the wrapped store pass through untouched. A rate of 0
/// disables the limiter.
#[derive(Clone)]
pub struct PacedStore<S> {
    inner: S,
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl<S> PacedStore<S> {
    pub fn new(inner: S, max_ops_per_second: u32) -> Self {
        let limiter = NonZeroU32::new(max_ops_per_second)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        Self { inner, limiter }
    }

    pub fn unpaced(inner: S) -> Self {
        Self {
            inner,
            limiter: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn is_paced(&self) -> bool {
        self.limiter.is_some()
    }

    async fn permit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl<S: ObjectStore> ObjectStore for PacedStore<S> {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.permit().await;
        self.inner.exists(key).await
    }

    async fn get_content(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.permit().await;
        self.inner.get_content(key).await
    }

    async fn put_content(
        &self,
        key: &str,
        content: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.permit().await;
        self.inner.put_content(key, content, content_type).await
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.permit().await;
        self.inner.list_prefix(prefix).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.permit().await;
        self.inner.delete(key).await
    }

    async fn check_access(&self) -> Result<(), StorageError> {
        self.permit().await;
        self.inner.check_access().await
    }
}
