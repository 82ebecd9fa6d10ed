use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::core::error::StorageError;

use super::ObjectStore;

// ---------------------------------------------------------------------------
// InMemoryObjectStore (for testing)
// ---------------------------------------------------------------------------

/// Operations the in-memory store counts and can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Exists,
    Get,
    Put,
    List,
    Delete,
    CheckAccess,
}

/// In-memory storage backend for unit and integration tests.
///
/// Objects live in a `BTreeMap` behind a `RwLock`, so listings come back
/// sorted like S3's. Failures can be injected per operation and key.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    faults: Arc<Mutex<Faults>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

#[derive(Debug, Default)]
struct Faults {
    keys: HashMap<StoreOp, HashSet<String>>,
    all: HashSet<StoreOp>,
    calls: HashMap<StoreOp, u64>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing fault injection and call counts.
    pub async fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Make `op` fail for exactly this key.
    pub fn fail_key(&self, op: StoreOp, key: &str) {
        self.faults()
            .keys
            .entry(op)
            .or_default()
            .insert(key.to_string());
    }

    /// Make every call of `op` fail.
    pub fn fail_all(&self, op: StoreOp) {
        self.faults().all.insert(op);
    }

    pub fn clear_faults(&self) {
        let mut faults = self.faults();
        faults.keys.clear();
        faults.all.clear();
    }

    /// How many times `op` has been called (including failed calls).
    pub fn calls(&self, op: StoreOp) -> u64 {
        self.faults().calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.content_type.clone())
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        // A poisoned lock only means a test panicked mid-update; the data is still usable.
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the call and report whether it should fail.
    fn record(&self, op: StoreOp, key: &str) -> bool {
        let mut faults = self.faults();
        *faults.calls.entry(op).or_default() += 1;
        faults.all.contains(&op) || faults.keys.get(&op).is_some_and(|keys| keys.contains(key))
    }
}

fn injected(key: &str) -> String {
    format!("injected failure for {}", key)
}

impl ObjectStore for InMemoryObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        if self.record(StoreOp::Exists, key) {
            return Err(StorageError::HeadFailed {
                key: key.to_string(),
                reason: injected(key),
            });
        }
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn get_content(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.record(StoreOp::Get, key) {
            return Err(StorageError::GetFailed {
                key: key.to_string(),
                reason: injected(key),
            });
        }
        let objects = self.objects.read().await;
        match objects.get(key) {
            None => Ok(None),
            Some(obj) => String::from_utf8(obj.data.to_vec())
                .map(Some)
                .map_err(|_| StorageError::NotText {
                    key: key.to_string(),
                }),
        }
    }

    async fn put_content(
        &self,
        key: &str,
        content: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.record(StoreOp::Put, key) {
            return Err(StorageError::PutFailed {
                key: key.to_string(),
                reason: injected(key),
            });
        }
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: Bytes::from(content.to_string()),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        if self.record(StoreOp::List, prefix) {
            return Err(StorageError::ListFailed {
                prefix: prefix.to_string(),
                reason: injected(prefix),
            });
        }
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.record(StoreOp::Delete, key) {
            return Err(StorageError::DeleteFailed {
                key: key.to_string(),
                reason: injected(key),
            });
        }
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn check_access(&self) -> Result<(), StorageError> {
        if self.record(StoreOp::CheckAccess, "") {
            return Err(StorageError::ListFailed {
                prefix: String::new(),
                reason: "injected failure: bucket unreachable".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PrefixDeletion, HLS_CONTENT_TYPE};

    #[tokio::test]
    async fn test_put_and_get_content() {
        let store = InMemoryObjectStore::new();
        let content = "#EXTM3U\n#EXT-X-VERSION:3\n";

        store
            .put_content("abc/default.m3u8", content, HLS_CONTENT_TYPE)
            .await
            .unwrap();

        let read = store.get_content("abc/default.m3u8").await.unwrap();
        assert_eq!(read.as_deref(), Some(content));
        assert_eq!(
            store.content_type("abc/default.m3u8").await.as_deref(),
            Some(HLS_CONTENT_TYPE)
        );
    }

    #[tokio::test]
    async fn test_missing_object_is_not_an_error() {
        let store = InMemoryObjectStore::new();
        assert!(!store.exists("nope").await.unwrap());
        assert_eq!(store.get_content("nope").await.unwrap(), None);
        store.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_prefix_is_sorted_and_scoped() {
        let store = InMemoryObjectStore::new();
        store.insert("abc/720p/1.ts", "b").await;
        store.insert("abc/720p/0.ts", "a").await;
        store.insert("abc/720p.m3u8", "p").await;
        store.insert("abd/720p/0.ts", "x").await;

        let keys = store.list_prefix("abc/720p/").await.unwrap();
        assert_eq!(keys, vec!["abc/720p/0.ts", "abc/720p/1.ts"]);
    }

    #[tokio::test]
    async fn test_delete_prefix_counts_failures() {
        let store = InMemoryObjectStore::new();
        store.insert("abc/1080p/0.ts", "a").await;
        store.insert("abc/1080p/1.ts", "b").await;
        store.insert("abc/1080p/2.ts", "c").await;
        store.fail_key(StoreOp::Delete, "abc/1080p/1.ts");

        let outcome = store.delete_prefix("abc/1080p/").await;
        assert_eq!(
            outcome,
            PrefixDeletion {
                deleted: 2,
                errors: 1
            }
        );
        assert!(store.contains("abc/1080p/1.ts").await);
        assert_eq!(store.object_count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_prefix_list_failure_counts_one_error() {
        let store = InMemoryObjectStore::new();
        store.insert("abc/1080p/0.ts", "a").await;
        store.fail_all(StoreOp::List);

        let outcome = store.delete_prefix("abc/1080p/").await;
        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.errors, 1);
        assert_eq!(store.object_count().await, 1);
    }

    #[tokio::test]
    async fn test_call_counting() {
        let store = InMemoryObjectStore::new();
        store.exists("a").await.unwrap();
        store.exists("b").await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.calls(StoreOp::Exists), 2);
        assert_eq!(store.calls(StoreOp::Delete), 1);
        assert_eq!(store.calls(StoreOp::Put), 0);
    }
}
