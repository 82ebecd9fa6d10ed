use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::error::CatalogError;
use crate::core::types::{OptimizationMetadata, Video, VideoStatus};

use super::{OwnerQuery, VideoCatalog};

// ---------------------------------------------------------------------------
// InMemoryCatalog
// ---------------------------------------------------------------------------

/// Catalog backed by a `Vec<Video>` behind a `RwLock`.
///
/// Used directly by tests and as the working set of `JsonFileCatalog`.
/// `set_unavailable` and `fail_updates` inject failures.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    videos: Arc<RwLock<Vec<Video>>>,
    unavailable: Arc<AtomicBool>,
    failing_updates: Arc<AtomicBool>,
}

impl InMemoryCatalog {
    pub fn new(videos: Vec<Video>) -> Self {
        Self {
            videos: Arc::new(RwLock::new(videos)),
            ..Self::default()
        }
    }

    /// Make `check_access` fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `mark_optimized` fail.
    pub fn fail_updates(&self, failing: bool) {
        self.failing_updates.store(failing, Ordering::SeqCst);
    }

    pub async fn get(&self, id: &str) -> Option<Video> {
        self.videos.read().await.iter().find(|v| v.id == id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<Video> {
        self.videos.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.videos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.videos.read().await.is_empty()
    }
}

impl VideoCatalog for InMemoryCatalog {
    async fn find_by_owner(
        &self,
        owner: &str,
        query: &OwnerQuery,
    ) -> Result<Vec<Video>, CatalogError> {
        let videos = self.videos.read().await;
        let mut found: Vec<Video> = videos
            .iter()
            .filter(|v| v.owner == owner)
            .filter(|v| v.status != VideoStatus::Deleted)
            .filter(|v| query.include_optimized || !v.is_optimized())
            .cloned()
            .collect();
        found.sort_by_key(|v| v.created);
        Ok(found)
    }

    async fn find_by_permlink(
        &self,
        permlink: &str,
        owner: &str,
    ) -> Result<Option<Video>, CatalogError> {
        let videos = self.videos.read().await;
        Ok(videos
            .iter()
            .find(|v| v.owner == owner && v.permlink.as_deref() == Some(permlink))
            .cloned())
    }

    async fn mark_optimized(
        &self,
        id: &str,
        metadata: &OptimizationMetadata,
    ) -> Result<(), CatalogError> {
        if self.failing_updates.load(Ordering::SeqCst) {
            return Err(CatalogError::PersistFailed {
                reason: "injected update failure".to_string(),
            });
        }
        let mut videos = self.videos.write().await;
        let video = videos
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| CatalogError::VideoNotFound { id: id.to_string() })?;
        video.optimization = Some(metadata.clone());
        Ok(())
    }

    async fn check_access(&self) -> Result<(), CatalogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable {
                reason: "injected outage".to_string(),
            });
        }
        Ok(())
    }
}
