use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::error::CatalogError;
use crate::core::types::{OptimizationMetadata, Video};

use super::memory::InMemoryCatalog;
use super::{OwnerQuery, VideoCatalog};

// ---------------------------------------------------------------------------
// JsonFileCatalog
// ---------------------------------------------------------------------------

/// Catalog stored as a JSON array of videos on disk.
///
/// Loaded once at open; every `mark_optimized` rewrites the whole file
/// through a temporary sibling and a rename so a crash never leaves a
/// half-written catalog behind.
pub struct JsonFileCatalog {
    path: PathBuf,
    videos: InMemoryCatalog,
}

impl JsonFileCatalog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CatalogError::Unavailable {
                reason: format!("cannot read {}: {}", path.display(), e),
            })?;
        let videos: Vec<Video> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), videos = videos.len(), "video catalog loaded");

        Ok(Self {
            path,
            videos: InMemoryCatalog::new(videos),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, videos: &[Video]) -> Result<(), CatalogError> {
        let json = serde_json::to_string_pretty(videos)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CatalogError::PersistFailed {
                reason: format!("cannot write {}: {}", tmp.display(), e),
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CatalogError::PersistFailed {
                reason: format!("cannot replace {}: {}", self.path.display(), e),
            })?;

        debug!(path = %self.path.display(), "video catalog persisted");
        Ok(())
    }
}

impl VideoCatalog for JsonFileCatalog {
    async fn find_by_owner(
        &self,
        owner: &str,
        query: &OwnerQuery,
    ) -> Result<Vec<Video>, CatalogError> {
        self.videos.find_by_owner(owner, query).await
    }

    async fn find_by_permlink(
        &self,
        permlink: &str,
        owner: &str,
    ) -> Result<Option<Video>, CatalogError> {
        self.videos.find_by_permlink(permlink, owner).await
    }

    async fn mark_optimized(
        &self,
        id: &str,
        metadata: &OptimizationMetadata,
    ) -> Result<(), CatalogError> {
        // Disk first; memory only changes once the new file is in place.
        let mut videos = self.videos.snapshot().await;
        let video = videos
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| CatalogError::VideoNotFound { id: id.to_string() })?;
        video.optimization = Some(metadata.clone());
        self.persist(&videos).await?;
        self.videos.mark_optimized(id, metadata).await
    }

    async fn check_access(&self) -> Result<(), CatalogError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| CatalogError::Unavailable {
                reason: format!("{}: {}", self.path.display(), e),
            })
    }
}
