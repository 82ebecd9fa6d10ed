pub mod memory;
pub mod paced;
#[cfg(feature = "s3")]
pub mod s3;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::error::StorageError;

/// MIME type of every playlist object this tool writes.
pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

// ---------------------------------------------------------------------------
// ObjectStore trait
// ---------------------------------------------------------------------------

/// Capability wrapper over the bucket holding HLS content.
///
/// Production wraps `aws-sdk-s3`; tests use `InMemoryObjectStore`.
/// A missing object is never an error: `exists` answers `false`,
/// `get_content` answers `None` and `delete` succeeds.
pub trait ObjectStore: Send + Sync {
    /// Whether an object exists. Errors only on transport or auth failure.
    fn exists(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, StorageError>> + Send;

    /// Read an object as text.
    fn get_content(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Write a text object, overwriting any existing one.
    fn put_content(
        &self,
        key: &str,
        content: &str,
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Keys under a prefix, in lexicographic order.
    fn list_prefix(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, StorageError>> + Send;

    /// Delete a single object. Deleting a missing key succeeds.
    fn delete(&self, key: &str)
        -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Cheap request proving the bucket is reachable with the configured credentials.
    fn check_access(&self) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// List a prefix and delete every key under it.
    ///
    /// Each delete is independently fallible; failures are counted, never
    /// raised. A failed listing counts as one error.
    fn delete_prefix(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = PrefixDeletion> + Send {
        async move {
            let keys = match self.list_prefix(prefix).await {
                Ok(keys) => keys,
                Err(e) => {
                    warn!(prefix, error = %e, "failed to list objects for prefix delete");
                    return PrefixDeletion {
                        deleted: 0,
                        errors: 1,
                    };
                }
            };

            if keys.is_empty() {
                debug!(prefix, "no objects under prefix");
                return PrefixDeletion::default();
            }

            let mut outcome = PrefixDeletion::default();
            for key in &keys {
                match self.delete(key).await {
                    Ok(()) => outcome.deleted += 1,
                    Err(e) => {
                        warn!(key = %key, error = %e, "failed to delete object");
                        outcome.errors += 1;
                    }
                }
            }

            debug!(
                prefix,
                deleted = outcome.deleted,
                errors = outcome.errors,
                "prefix delete finished"
            );
            outcome
        }
    }
}

/// Result of a prefix delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrefixDeletion {
    pub deleted: u64,
    pub errors: u64,
}

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

/// Determine the object type label for metrics.
pub fn object_type_label(key: &str) -> &'static str {
    if key.ends_with("/default.m3u8") {
        "master_playlist"
    } else if key.ends_with(".m3u8") {
        "rendition_playlist"
    } else if key.ends_with(".ts") {
        "segment"
    } else {
        "other"
    }
}
