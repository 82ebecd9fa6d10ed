use serde::Serialize;
use tracing::debug;

use crate::core::error::StorageError;
use crate::core::types::{rendition_playlist_key, segment_prefix, Rendition};
use crate::storage::ObjectStore;

// ---------------------------------------------------------------------------
// Rendition inventory
// ---------------------------------------------------------------------------

/// Which renditions of a video exist, in quality order.
///
/// `smallest` is the minimum of `available`; `to_delete` is everything
/// else. Construction sorts and dedups, so discovery order never matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenditionInventory {
    available: Vec<Rendition>,
}

impl RenditionInventory {
    pub fn new(mut available: Vec<Rendition>) -> Self {
        available.sort();
        available.dedup();
        Self { available }
    }

    pub fn available(&self) -> &[Rendition] {
        &self.available
    }

    /// The lowest-quality rendition present, the one a reduction keeps.
    pub fn smallest(&self) -> Option<Rendition> {
        self.available.first().copied()
    }

    /// Renditions a reduction removes: all present except the smallest.
    pub fn to_delete(&self) -> &[Rendition] {
        self.available.get(1..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    /// Exactly one rendition left: the terminal state of a reduction.
    pub fn is_reduced(&self) -> bool {
        self.available.len() == 1
    }
}

/// Probe each rendition's playlist object, lowest quality first.
pub async fn inspect<S: ObjectStore>(
    store: &S,
    permlink: &str,
) -> Result<RenditionInventory, StorageError> {
    let mut available = Vec::with_capacity(Rendition::ALL.len());
    for rendition in Rendition::ALL {
        if store
            .exists(&rendition_playlist_key(permlink, rendition))
            .await?
        {
            available.push(rendition);
        }
    }

    let inventory = RenditionInventory::new(available);
    debug!(
        permlink,
        available = ?inventory.available(),
        smallest = ?inventory.smallest(),
        "rendition inventory"
    );
    Ok(inventory)
}

// ---------------------------------------------------------------------------
// Removal targets
// ---------------------------------------------------------------------------

/// Object keys and prefixes to remove for a set of discarded renditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalTargets {
    /// `<permlink>/<rendition>.m3u8`, one per rendition.
    pub playlists: Vec<String>,
    /// `<permlink>/<rendition>/`, one per rendition.
    pub prefixes: Vec<String>,
}

impl RemovalTargets {
    pub fn for_renditions(permlink: &str, renditions: &[Rendition]) -> Self {
        Self {
            playlists: renditions
                .iter()
                .map(|r| rendition_playlist_key(permlink, *r))
                .collect(),
            prefixes: renditions
                .iter()
                .map(|r| segment_prefix(permlink, *r))
                .collect(),
        }
    }
}
