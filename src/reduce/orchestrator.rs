use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::catalog::VideoCatalog;
use crate::core::config::{ReductionConfig, MAX_BATCH_SIZE_CAP};
use crate::core::error::ReduceError;
use crate::core::types::{
    master_playlist_key, OptimizationMetadata, Rendition, StorageBackend, Video,
};
use crate::observability::metrics as obs;
use crate::package::playlist;
use crate::storage::paced::PacedStore;
use crate::storage::{ObjectStore, HLS_CONTENT_TYPE};

use super::inventory::{self, RemovalTargets};
use super::repair::{self, RebuildReport};
use super::report::{estimate_bytes_freed, RunSummary, SkipReason, VideoOutcome, VideoReport};

/// Operation type tag for per-owner batch runs.
pub const OPERATION_DIET_USER: &str = "storage-diet-user";
/// Operation type tag for single-video runs.
pub const OPERATION_SLIM_VIDEO: &str = "storage-slim-video";

// ---------------------------------------------------------------------------
// Run parameters
// ---------------------------------------------------------------------------

/// Whether a run may mutate the store and catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Execute,
    /// Every read-side step runs; every mutating step is skipped.
    DryRun,
}

impl RunMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            RunMode::DryRun
        } else {
            RunMode::Execute
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// Request-rate policy: per-operation limit plus a pause between chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// 0 means unlimited.
    pub max_ops_per_second: u32,
    pub batch_pause: Duration,
}

impl Pacing {
    pub fn unlimited() -> Self {
        Self {
            max_ops_per_second: 0,
            batch_pause: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReducerSettings {
    pub pacing: Pacing,
    pub savings_ratio: f64,
    /// Upload the rewritten master before any delete.
    pub stage_master_first: bool,
}

impl From<&ReductionConfig> for ReducerSettings {
    fn from(config: &ReductionConfig) -> Self {
        Self {
            pacing: Pacing {
                max_ops_per_second: config.max_ops_per_second,
                batch_pause: config.batch_pause(),
            },
            savings_ratio: config.savings_ratio,
            stage_master_first: config.stage_master_first,
        }
    }
}

impl Default for ReducerSettings {
    fn default() -> Self {
        Self::from(&ReductionConfig::default())
    }
}

/// Who asked for a reduction, recorded in the optimization metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub optimization_type: String,
    pub optimized_by: String,
}

impl Operator {
    /// `slim-user:<owner>:<months>months`
    pub fn slim_user(owner: &str, months: u32) -> Self {
        Self {
            optimization_type: OPERATION_DIET_USER.to_string(),
            optimized_by: format!("slim-user:{}:{}months", owner, months),
        }
    }

    /// `slim-video:<owner>/<permlink>`
    pub fn slim_video(owner: &str, permlink: &str) -> Self {
        Self {
            optimization_type: OPERATION_SLIM_VIDEO.to_string(),
            optimized_by: format!("slim-video:{}/{}", owner, permlink),
        }
    }
}

/// True when `master` exists and offers exactly `keep`.
fn master_matches(master: Option<&str>, keep: Rendition) -> bool {
    master
        .and_then(|m| playlist::referenced_renditions(m).ok())
        .is_some_and(|refs| refs == [keep])
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// Drives reductions against an object store and a video catalog.
///
/// Videos are handled strictly one at a time. Per-video failures become
/// `VideoOutcome::Failed`; only `preflight` failures abort a run.
pub struct Reducer<S, C> {
    store: PacedStore<S>,
    catalog: C,
    settings: ReducerSettings,
}

impl<S: ObjectStore, C: VideoCatalog> Reducer<S, C> {
    pub fn new(store: S, catalog: C, settings: ReducerSettings) -> Self {
        Self {
            store: PacedStore::new(store, settings.pacing.max_ops_per_second),
            catalog,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        self.store.inner()
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn settings(&self) -> &ReducerSettings {
        &self.settings
    }

    /// Prove both collaborators are reachable before touching any video.
    pub async fn preflight(&self) -> Result<(), ReduceError> {
        self.store
            .check_access()
            .await
            .map_err(ReduceError::StoreUnreachable)?;
        self.catalog
            .check_access()
            .await
            .map_err(ReduceError::CatalogUnreachable)?;
        debug!("object store and catalog reachable");
        Ok(())
    }

    /// Reduce one video to its smallest rendition.
    ///
    /// Never returns an error: every failure is folded into the report.
    pub async fn reduce_video(
        &self,
        video: &Video,
        operator: &Operator,
        mode: RunMode,
    ) -> VideoReport {
        let mut report = VideoReport::new(video);
        report.outcome = match self.try_reduce(video, operator, mode, &mut report).await {
            Ok(outcome) => outcome,
            Err(e) => VideoOutcome::Failed {
                message: e.to_string(),
                degraded: false,
            },
        };

        match &report.outcome {
            VideoOutcome::Reduced => info!(
                video_id = %video.id,
                permlink = report.permlink.as_deref().unwrap_or_default(),
                kept = ?report.kept,
                removed = ?report.removed,
                objects_deleted = report.objects_deleted,
                delete_errors = report.delete_errors,
                "video reduced"
            ),
            VideoOutcome::Planned => info!(
                video_id = %video.id,
                permlink = report.permlink.as_deref().unwrap_or_default(),
                kept = ?report.kept,
                removed = ?report.removed,
                estimated_bytes_freed = report.estimated_bytes_freed,
                "dry run: would reduce video"
            ),
            VideoOutcome::Skipped { reason } => {
                info!(video_id = %video.id, label = %report.label, reason = %reason, "video skipped")
            }
            VideoOutcome::Failed { message, degraded } => error!(
                video_id = %video.id,
                permlink = report.permlink.as_deref().unwrap_or_default(),
                degraded,
                error = %message,
                "video reduction failed"
            ),
        }
        obs::inc_videos_processed(report.outcome.label());
        report
    }

    async fn try_reduce(
        &self,
        video: &Video,
        operator: &Operator,
        mode: RunMode,
        report: &mut VideoReport,
    ) -> Result<VideoOutcome, ReduceError> {
        let permlink = match video.permlink.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => {
                return Ok(VideoOutcome::Skipped {
                    reason: SkipReason::NoPermlink,
                })
            }
        };
        match video.backend() {
            StorageBackend::S3 => {}
            other => {
                return Ok(VideoOutcome::Skipped {
                    reason: SkipReason::UnsupportedBackend(other),
                })
            }
        }

        let inventory = inventory::inspect(&self.store, permlink).await?;
        report.available = inventory.available().to_vec();

        let Some(keep) = inventory.smallest() else {
            return Ok(VideoOutcome::Skipped {
                reason: SkipReason::NoContentFound,
            });
        };
        report.kept = Some(keep);

        let discard = inventory.to_delete();
        if discard.is_empty() {
            let current = self.store.get_content(&master_playlist_key(permlink)).await?;
            if master_matches(current.as_deref(), keep) {
                return Ok(VideoOutcome::Skipped {
                    reason: SkipReason::AlreadyOptimized,
                });
            }
            return self
                .repair_master(video, operator, mode, report, permlink, keep)
                .await;
        }
        report.removed = discard.to_vec();
        report.estimated_bytes_freed =
            estimate_bytes_freed(video.size_bytes(), self.settings.savings_ratio);

        if mode.is_dry_run() {
            return Ok(VideoOutcome::Planned);
        }

        let master_key = master_playlist_key(permlink);
        let master = playlist::synthesize_master(keep);

        if self.settings.stage_master_first {
            if let Err(e) = self
                .store
                .put_content(&master_key, &master, HLS_CONTENT_TYPE)
                .await
            {
                return Ok(VideoOutcome::Failed {
                    message: format!("failed to stage master playlist before deletes: {}", e),
                    degraded: false,
                });
            }
            obs::inc_master_playlists_written(keep.as_str());
        }

        let targets = RemovalTargets::for_renditions(permlink, discard);
        for key in &targets.playlists {
            match self.store.delete(key).await {
                Ok(()) => report.objects_deleted += 1,
                Err(e) => {
                    warn!(permlink, key = %key, error = %e, "failed to delete rendition playlist");
                    report.delete_errors += 1;
                }
            }
        }
        for prefix in &targets.prefixes {
            let deletion = self.store.delete_prefix(prefix).await;
            debug!(permlink, prefix = %prefix, deleted = deletion.deleted, errors = deletion.errors, "segment prefix cleared");
            report.objects_deleted += deletion.deleted;
            report.delete_errors += deletion.errors;
        }
        obs::add_objects_deleted(report.objects_deleted);
        obs::add_delete_errors(report.delete_errors);

        if !self.settings.stage_master_first {
            if let Err(e) = self
                .store
                .put_content(&master_key, &master, HLS_CONTENT_TYPE)
                .await
            {
                return Ok(VideoOutcome::Failed {
                    message: format!(
                        "discarded renditions deleted but master playlist upload failed: {}",
                        e
                    ),
                    degraded: true,
                });
            }
            obs::inc_master_playlists_written(keep.as_str());
        }

        self.record_optimized(video, operator, report).await
    }

    /// Only one rendition is stored but the master points elsewhere, which is
    /// what an interrupted reduction leaves behind. Rewrite it and flag the video.
    async fn repair_master(
        &self,
        video: &Video,
        operator: &Operator,
        mode: RunMode,
        report: &mut VideoReport,
        permlink: &str,
        keep: Rendition,
    ) -> Result<VideoOutcome, ReduceError> {
        let master_key = master_playlist_key(permlink);
        error!(
            video_id = %video.id,
            key = %master_key,
            kept = %keep,
            "master playlist does not match the stored rendition"
        );
        if mode.is_dry_run() {
            return Ok(VideoOutcome::Planned);
        }
        if let Err(e) = self
            .store
            .put_content(&master_key, &playlist::synthesize_master(keep), HLS_CONTENT_TYPE)
            .await
        {
            return Ok(VideoOutcome::Failed {
                message: format!("master playlist references missing renditions and rewrite failed: {}", e),
                degraded: true,
            });
        }
        obs::inc_master_playlists_written(keep.as_str());
        report.master_repaired = true;
        warn!(video_id = %video.id, key = %master_key, kept = %keep, "master playlist rewritten");

        self.record_optimized(video, operator, report).await
    }

    async fn record_optimized(
        &self,
        video: &Video,
        operator: &Operator,
        report: &mut VideoReport,
    ) -> Result<VideoOutcome, ReduceError> {
        let metadata = OptimizationMetadata {
            optimized_at: Utc::now(),
            optimization_type: operator.optimization_type.clone(),
            optimized_by: operator.optimized_by.clone(),
            estimated_bytes_freed: report.estimated_bytes_freed,
        };
        if let Err(e) = self.catalog.mark_optimized(&video.id, &metadata).await {
            return Ok(VideoOutcome::Failed {
                message: format!("storage reduced but optimization flag not recorded: {}", e),
                degraded: false,
            });
        }
        report.catalog_updated = true;
        obs::add_estimated_bytes_freed(report.estimated_bytes_freed);

        Ok(VideoOutcome::Reduced)
    }

    /// Reduce a collection in chunks of `batch_size`, pausing between chunks.
    ///
    /// Runs `preflight` first; that is the only way this returns `Err`.
    /// Every video is visited even when earlier ones fail.
    pub async fn run_batch(
        &self,
        videos: &[Video],
        batch_size: usize,
        operator: &Operator,
        mode: RunMode,
    ) -> Result<RunSummary, ReduceError> {
        if batch_size == 0 {
            return Err(ReduceError::InvalidParameters {
                reason: "batch size must be positive".to_string(),
            });
        }
        let batch_size = batch_size.min(MAX_BATCH_SIZE_CAP);

        self.preflight().await?;

        let mut summary = RunSummary::new(mode.is_dry_run());
        let total_batches = videos.len().div_ceil(batch_size);

        for (index, chunk) in videos.chunks(batch_size).enumerate() {
            summary.batches += 1;
            info!(
                batch = index + 1,
                of = total_batches,
                videos = chunk.len(),
                "processing batch"
            );

            for video in chunk {
                let report = self.reduce_video(video, operator, mode).await;
                summary.record(report);
            }

            let pause = self.settings.pacing.batch_pause;
            if index + 1 < total_batches && !pause.is_zero() {
                debug!(pause_ms = pause.as_millis() as u64, "pausing between batches");
                tokio::time::sleep(pause).await;
            }
        }

        info!(
            processed = summary.processed,
            reduced = summary.reduced,
            planned = summary.planned,
            skipped = summary.skipped_total(),
            failed = summary.failed,
            objects_deleted = summary.objects_deleted,
            "batch run finished"
        );
        Ok(summary)
    }

    /// Regenerate every playlist of a video from the segments in the store.
    pub async fn rebuild_playlists(
        &self,
        permlink: &str,
        mode: RunMode,
    ) -> Result<RebuildReport, ReduceError> {
        self.store
            .check_access()
            .await
            .map_err(ReduceError::StoreUnreachable)?;
        Ok(repair::rebuild_playlists(&self.store, permlink, mode).await?)
    }
}
