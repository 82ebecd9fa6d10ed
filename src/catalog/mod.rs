pub mod file;
pub mod memory;

use crate::core::error::CatalogError;
use crate::core::types::{OptimizationMetadata, Video};

// ---------------------------------------------------------------------------
// VideoCatalog trait
// ---------------------------------------------------------------------------

/// Read/flag access to the video metadata store.
///
/// The only mutation is recording optimization metadata; a video's
/// `status` is never changed, so a reduced video never looks deleted.
pub trait VideoCatalog: Send + Sync {
    /// Every non-deleted video of an owner, oldest first.
    fn find_by_owner(
        &self,
        owner: &str,
        query: &OwnerQuery,
    ) -> impl std::future::Future<Output = Result<Vec<Video>, CatalogError>> + Send;

    /// Look up one video by its per-owner permlink.
    fn find_by_permlink(
        &self,
        permlink: &str,
        owner: &str,
    ) -> impl std::future::Future<Output = Result<Option<Video>, CatalogError>> + Send;

    /// Attach optimization metadata to a video.
    fn mark_optimized(
        &self,
        id: &str,
        metadata: &OptimizationMetadata,
    ) -> impl std::future::Future<Output = Result<(), CatalogError>> + Send;

    /// Fail fast when the catalog cannot be reached at all.
    fn check_access(&self) -> impl std::future::Future<Output = Result<(), CatalogError>> + Send;
}

/// Options for `find_by_owner`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerQuery {
    /// Also return videos that already carry optimization metadata.
    pub include_optimized: bool,
}
