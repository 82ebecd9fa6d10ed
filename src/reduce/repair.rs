use serde::Serialize;
use tracing::{info, warn};

use crate::core::error::StorageError;
use crate::core::types::{master_playlist_key, rendition_playlist_key, segment_prefix, Rendition};
use crate::package::{playlist, segments};
use crate::storage::{ObjectStore, HLS_CONTENT_TYPE};

use super::orchestrator::RunMode;

// ---------------------------------------------------------------------------
// Playlist repair
// ---------------------------------------------------------------------------

/// Per-rendition result of a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuiltRendition {
    pub rendition: Rendition,
    pub segments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub permlink: String,
    pub dry_run: bool,
    pub renditions: Vec<RebuiltRendition>,
    /// Rendition the regenerated master playlist points at.
    pub master: Option<Rendition>,
}

/// Regenerate rendition playlists from the segments actually present, then
/// a single-rendition master for the smallest rendition that has any.
///
/// Segment URIs in a rendition playlist are relative to the master, so
/// they carry the `<rendition>/` prefix.
pub async fn rebuild_playlists<S: ObjectStore>(
    store: &S,
    permlink: &str,
    mode: RunMode,
) -> Result<RebuildReport, StorageError> {
    let mut report = RebuildReport {
        permlink: permlink.to_string(),
        dry_run: mode.is_dry_run(),
        renditions: Vec::new(),
        master: None,
    };

    for rendition in Rendition::ALL {
        let keys = store.list_prefix(&segment_prefix(permlink, rendition)).await?;
        let names = segments::segment_filenames(&keys);
        if names.is_empty() {
            continue;
        }

        let path_prefix = format!("{}/", rendition);
        let content = playlist::synthesize_rendition(&names, &path_prefix);
        if !mode.is_dry_run() {
            store
                .put_content(
                    &rendition_playlist_key(permlink, rendition),
                    &content,
                    HLS_CONTENT_TYPE,
                )
                .await?;
        }
        info!(permlink, rendition = %rendition, segments = names.len(), dry_run = mode.is_dry_run(), "rendition playlist rebuilt");

        report.renditions.push(RebuiltRendition {
            rendition,
            segments: names.len(),
        });
    }

    let Some(smallest) = report.renditions.first().map(|r| r.rendition) else {
        warn!(permlink, "no segments found under any rendition, nothing to rebuild");
        return Ok(report);
    };

    if !mode.is_dry_run() {
        store
            .put_content(
                &master_playlist_key(permlink),
                &playlist::synthesize_master(smallest),
                HLS_CONTENT_TYPE,
            )
            .await?;
    }
    info!(permlink, rendition = %smallest, "master playlist rebuilt");
    report.master = Some(smallest);

    Ok(report)
}
