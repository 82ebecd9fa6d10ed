use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::core::types::{Rendition, StorageBackend, Video};

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = MIB * 1024.0;
const TIB: f64 = GIB * 1024.0;

// ---------------------------------------------------------------------------
// Per-video outcome
// ---------------------------------------------------------------------------

/// Structural reasons a video is left untouched. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "backend", rename_all = "snake_case")]
pub enum SkipReason {
    NoPermlink,
    UnsupportedBackend(StorageBackend),
    NoContentFound,
    AlreadyOptimized,
}

impl SkipReason {
    /// Stable snake_case key used in summaries and metric labels.
    pub fn key(&self) -> &'static str {
        match self {
            SkipReason::NoPermlink => "no_permlink",
            SkipReason::UnsupportedBackend(_) => "unsupported_backend",
            SkipReason::NoContentFound => "no_content_found",
            SkipReason::AlreadyOptimized => "already_optimized",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoPermlink => write!(f, "no permlink"),
            SkipReason::UnsupportedBackend(b) => write!(f, "unsupported backend: {}", b),
            SkipReason::NoContentFound => write!(f, "no content found"),
            SkipReason::AlreadyOptimized => write!(f, "already optimized"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VideoOutcome {
    /// Renditions removed, master rewritten and the catalog updated.
    Reduced,
    /// Dry run: the same analysis as `Reduced`, nothing mutated.
    Planned,
    Skipped { reason: SkipReason },
    /// `degraded` marks a video whose discarded renditions are gone but
    /// whose master playlist was not rewritten.
    Failed { message: String, degraded: bool },
}

impl VideoOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            VideoOutcome::Reduced => "reduced",
            VideoOutcome::Planned => "planned",
            VideoOutcome::Skipped { .. } => "skipped",
            VideoOutcome::Failed { .. } => "failed",
        }
    }
}

/// Everything one pass over a video decided and did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoReport {
    pub video_id: String,
    pub label: String,
    pub permlink: Option<String>,
    pub available: Vec<Rendition>,
    pub kept: Option<Rendition>,
    pub removed: Vec<Rendition>,
    pub objects_deleted: u64,
    pub delete_errors: u64,
    pub estimated_bytes_freed: u64,
    pub catalog_updated: bool,
    /// The master was rewritten because it pointed at renditions no longer stored.
    pub master_repaired: bool,
    pub outcome: VideoOutcome,
}

impl VideoReport {
    pub fn new(video: &Video) -> Self {
        Self {
            video_id: video.id.clone(),
            label: video.label().to_string(),
            permlink: video.permlink.clone(),
            available: Vec::new(),
            kept: None,
            removed: Vec::new(),
            objects_deleted: 0,
            delete_errors: 0,
            estimated_bytes_freed: 0,
            catalog_updated: false,
            master_repaired: false,
            outcome: VideoOutcome::Planned,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, VideoOutcome::Failed { .. })
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Aggregate of every video a run touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub processed: u64,
    pub reduced: u64,
    pub planned: u64,
    pub skipped: BTreeMap<String, u64>,
    pub failed: u64,
    pub degraded: u64,
    pub batches: u64,
    pub objects_deleted: u64,
    pub delete_errors: u64,
    pub catalog_updated: u64,
    pub estimated_bytes_freed: u64,
    pub errors: Vec<String>,
    pub videos: Vec<VideoReport>,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn record(&mut self, report: VideoReport) {
        self.processed += 1;
        self.objects_deleted += report.objects_deleted;
        self.delete_errors += report.delete_errors;
        if report.catalog_updated {
            self.catalog_updated += 1;
        }

        match &report.outcome {
            VideoOutcome::Reduced => {
                self.reduced += 1;
                self.estimated_bytes_freed += report.estimated_bytes_freed;
            }
            VideoOutcome::Planned => {
                self.planned += 1;
                self.estimated_bytes_freed += report.estimated_bytes_freed;
            }
            VideoOutcome::Skipped { reason } => {
                *self.skipped.entry(reason.key().to_string()).or_insert(0) += 1;
            }
            VideoOutcome::Failed { message, degraded } => {
                self.failed += 1;
                if *degraded {
                    self.degraded += 1;
                }
                self.errors
                    .push(format!("Failed to optimize video {}: {}", report.video_id, message));
            }
        }

        self.videos.push(report);
    }

    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

// ---------------------------------------------------------------------------
// Size and cost helpers
// ---------------------------------------------------------------------------

/// Bytes assumed freed by reducing a video of `size` bytes.
pub fn estimate_bytes_freed(size: u64, savings_ratio: f64) -> u64 {
    (size as f64 * savings_ratio.clamp(0.0, 1.0)).round() as u64
}

/// A byte count shown in GB (2 decimals) and TB (3 decimals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedBytes {
    pub gb: String,
    pub tb: String,
}

impl fmt::Display for FormattedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} GB ({} TB)", self.gb, self.tb)
    }
}

pub fn format_bytes(bytes: u64) -> FormattedBytes {
    FormattedBytes {
        gb: format!("{:.2}", bytes as f64 / GIB),
        tb: format!("{:.3}", bytes as f64 / TIB),
    }
}

pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MIB)
}

/// Storage cost avoided, from a per-GB daily rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostSavings {
    pub daily: f64,
    pub monthly: f64,
    pub annual: f64,
}

impl CostSavings {
    pub fn estimate(bytes_freed: u64, daily_cost_per_gb: f64) -> Self {
        let daily = bytes_freed as f64 / GIB * daily_cost_per_gb;
        Self {
            daily,
            monthly: daily * 30.0,
            annual: daily * 365.0,
        }
    }
}

impl fmt::Display for CostSavings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${:.4}/day, ${:.2}/month, ${:.2}/year",
            self.daily, self.monthly, self.annual
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::core::types::VideoStatus;

    fn report(id: &str, outcome: VideoOutcome) -> VideoReport {
        let video = Video {
            id: id.to_string(),
            owner: "alice".to_string(),
            permlink: Some(format!("p-{}", id)),
            title: None,
            filename: None,
            created: Utc::now(),
            size: Some(1000),
            status: VideoStatus::Published,
            optimization: None,
        };
        let mut report = VideoReport::new(&video);
        report.outcome = outcome;
        report
    }

    #[test]
    fn test_skip_reason_messages() {
        assert_eq!(SkipReason::NoPermlink.to_string(), "no permlink");
        assert_eq!(SkipReason::NoContentFound.to_string(), "no content found");
        assert_eq!(SkipReason::AlreadyOptimized.to_string(), "already optimized");
    }

    #[test]
    fn test_summary_accounting() {
        let mut summary = RunSummary::new(false);

        let mut reduced = report("a", VideoOutcome::Reduced);
        reduced.objects_deleted = 5;
        reduced.estimated_bytes_freed = 800;
        reduced.catalog_updated = true;
        summary.record(reduced);

        summary.record(report(
            "b",
            VideoOutcome::Skipped {
                reason: SkipReason::AlreadyOptimized,
            },
        ));
        summary.record(report(
            "c",
            VideoOutcome::Skipped {
                reason: SkipReason::AlreadyOptimized,
            },
        ));

        let mut failed = report(
            "d",
            VideoOutcome::Failed {
                message: "upload failed".to_string(),
                degraded: true,
            },
        );
        failed.objects_deleted = 2;
        failed.estimated_bytes_freed = 400;
        summary.record(failed);

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.reduced, 1);
        assert_eq!(summary.skipped.get("already_optimized"), Some(&2));
        assert_eq!(summary.skipped_total(), 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.degraded, 1);
        assert_eq!(summary.objects_deleted, 7);
        assert_eq!(summary.catalog_updated, 1);
        // Failed videos contribute no savings.
        assert_eq!(summary.estimated_bytes_freed, 800);
        assert_eq!(summary.errors, vec!["Failed to optimize video d: upload failed"]);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_estimate_bytes_freed() {
        assert_eq!(estimate_bytes_freed(1000, 0.8), 800);
        assert_eq!(estimate_bytes_freed(0, 0.8), 0);
        assert_eq!(estimate_bytes_freed(1000, 1.5), 1000);
    }

    #[test]
    fn test_format_bytes() {
        let two_gib = 2 * 1024 * 1024 * 1024;
        let formatted = format_bytes(two_gib);
        assert_eq!(formatted.gb, "2.00");
        assert_eq!(formatted.tb, "0.002");
        assert_eq!(formatted.to_string(), "2.00 GB (0.002 TB)");
        assert_eq!(format_megabytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_cost_savings() {
        let cost = CostSavings::estimate(1024 * 1024 * 1024 * 1000, 0.000_227_54);
        assert!((cost.daily - 0.22754).abs() < 1e-9);
        assert!((cost.monthly - 0.22754 * 30.0).abs() < 1e-9);
        assert!((cost.annual - 0.22754 * 365.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_serializes() {
        let mut summary = RunSummary::new(true);
        summary.record(report("a", VideoOutcome::Planned));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["videos"][0]["outcome"]["status"], "planned");
    }
}
