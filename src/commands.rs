use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{OwnerQuery, VideoCatalog};
use crate::cli::{MutationGate, RebuildArgs, SlimUserArgs, SlimVideoArgs, VideoRef};
use crate::core::config::AppConfig;
use crate::core::types::{Rendition, StorageBackend, Video};
use crate::reduce::eligibility::EligibilityFilter;
use crate::reduce::repair::RebuildReport;
use crate::reduce::report::{
    estimate_bytes_freed, format_bytes, format_megabytes, CostSavings, FormattedBytes,
};
use crate::reduce::{Operator, Reducer, RunSummary, VideoReport};
use crate::storage::ObjectStore;

const SAMPLE_VIDEOS: usize = 5;

// ---------------------------------------------------------------------------
// Command reports
// ---------------------------------------------------------------------------

/// Up-front analysis of a per-owner run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerAnalysis {
    pub owner: String,
    pub older_than_months: u32,
    pub batch_size: usize,
    pub videos_found: usize,
    pub eligible: usize,
    pub current_bytes: u64,
    pub estimated_savings_bytes: u64,
    pub cost_savings: CostSavings,
    pub samples: Vec<VideoSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSample {
    pub label: String,
    pub created: String,
    pub size_bytes: u64,
}

/// What a command did, printed at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum CommandReport {
    SlimUser {
        analysis: OwnerAnalysis,
        /// Absent when nothing was eligible.
        summary: Option<RunSummary>,
        note: Option<String>,
    },
    SlimVideo {
        video: String,
        backend: StorageBackend,
        report: Option<VideoReport>,
        note: Option<String>,
        failed: bool,
    },
    RebuildPlaylists {
        report: RebuildReport,
        note: Option<String>,
    },
}

impl CommandReport {
    pub fn has_failures(&self) -> bool {
        match self {
            CommandReport::SlimUser { summary, .. } => {
                summary.as_ref().is_some_and(RunSummary::has_failures)
            }
            CommandReport::SlimVideo { report, failed, .. } => {
                *failed || report.as_ref().is_some_and(VideoReport::is_failure)
            }
            CommandReport::RebuildPlaylists { .. } => false,
        }
    }

    /// Plain-text rendering for `--output human`.
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        match self {
            CommandReport::SlimUser {
                analysis,
                summary,
                note,
            } => {
                out.push_str(&format!(
                    "owner {}: {} videos, {} eligible (older than {} months)\n",
                    analysis.owner,
                    analysis.videos_found,
                    analysis.eligible,
                    analysis.older_than_months
                ));
                out.push_str(&format!(
                    "current size: {}\nestimated savings: {}\ncost savings: {}\n",
                    format_bytes(analysis.current_bytes),
                    format_bytes(analysis.estimated_savings_bytes),
                    analysis.cost_savings
                ));
                if let Some(summary) = summary {
                    out.push_str(&render_summary(summary));
                }
                if let Some(note) = note {
                    out.push_str(note);
                    out.push('\n');
                }
            }
            CommandReport::SlimVideo {
                video,
                backend,
                report,
                note,
                ..
            } => {
                out.push_str(&format!("video {} ({})\n", video, backend));
                if let Some(report) = report {
                    out.push_str(&render_video(report));
                }
                if let Some(note) = note {
                    out.push_str(note);
                    out.push('\n');
                }
            }
            CommandReport::RebuildPlaylists { report, note } => {
                for r in &report.renditions {
                    out.push_str(&format!("{}: {} segments\n", r.rendition, r.segments));
                }
                match report.master {
                    Some(m) => out.push_str(&format!("master playlist -> {}.m3u8\n", m)),
                    None => out.push_str("no segments found, nothing rebuilt\n"),
                }
                if let Some(note) = note {
                    out.push_str(note);
                    out.push('\n');
                }
            }
        }
        out
    }
}

fn render_summary(summary: &RunSummary) -> String {
    let mut out = format!(
        "processed {} in {} batches: {} reduced, {} planned, {} skipped, {} failed\n",
        summary.processed,
        summary.batches,
        summary.reduced,
        summary.planned,
        summary.skipped_total(),
        summary.failed
    );
    out.push_str(&format!(
        "objects deleted: {} ({} delete errors), catalog records updated: {}\n",
        summary.objects_deleted, summary.delete_errors, summary.catalog_updated
    ));
    out.push_str(&format!(
        "estimated storage freed: {}\n",
        format_bytes(summary.estimated_bytes_freed)
    ));
    for error in &summary.errors {
        out.push_str(&format!("  error: {}\n", error));
    }
    out
}

fn rendition_list(renditions: &[Rendition]) -> String {
    renditions
        .iter()
        .map(Rendition::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_video(report: &VideoReport) -> String {
    let mut out = format!("available: [{}]\n", rendition_list(&report.available));
    if let Some(kept) = report.kept {
        out.push_str(&format!("keep: {}, delete: [{}]\n", kept, rendition_list(&report.removed)));
    }
    out.push_str(&format!(
        "outcome: {}, objects deleted: {}, estimated savings: {}\n",
        report.outcome.label(),
        report.objects_deleted,
        format_megabytes(report.estimated_bytes_freed)
    ));
    if report.master_repaired {
        out.push_str("master playlist was stale and has been rewritten\n");
    }
    out
}

// ---------------------------------------------------------------------------
// slim-user
//
// Each flow takes a `Reducer`, so it runs the same over S3 and the
// in-memory doubles.
// ---------------------------------------------------------------------------

pub async fn slim_user<S: ObjectStore, C: VideoCatalog>(
    reducer: &Reducer<S, C>,
    args: &SlimUserArgs,
    config: &AppConfig,
) -> anyhow::Result<CommandReport> {
    let months = args
        .older_than_months
        .unwrap_or(config.reduction.older_than_months);
    if months == 0 {
        bail!("--older-than-months must be positive");
    }
    let requested = args
        .batch_size
        .unwrap_or(config.reduction.default_batch_size);
    if requested == 0 {
        bail!("--batch-size must be positive");
    }
    let batch_size = config.reduction.effective_batch_size(requested);
    if batch_size < requested {
        warn!(requested, batch_size, "batch size capped");
    }

    let gate = MutationGate::resolve(&args.safety, &config.safety);
    info!(owner = %args.username, months, batch_size, gate = ?gate, "slim-user starting");

    let videos = reducer
        .catalog()
        .find_by_owner(
            &args.username,
            &OwnerQuery {
                include_optimized: args.include_optimized,
            },
        )
        .await
        .with_context(|| format!("failed to load videos of {}", args.username))?;
    let videos_found = videos.len();

    let filter = EligibilityFilter::older_than_months(Utc::now(), months, args.include_optimized)?;
    for video in &videos {
        if let Err(reason) = filter.check(video) {
            debug!(video_id = %video.id, label = video.label(), reason = %reason, "not eligible");
        }
    }
    let eligible = filter.select(videos);

    let analysis = analyse(
        &args.username,
        months,
        batch_size,
        videos_found,
        &eligible,
        reducer.settings().savings_ratio,
        config.reduction.daily_cost_per_gb,
    );
    log_analysis(&analysis);

    if eligible.is_empty() {
        info!(owner = %args.username, "no eligible videos");
        return Ok(CommandReport::SlimUser {
            analysis,
            summary: None,
            note: Some("no eligible videos".to_string()),
        });
    }

    let summary = reducer
        .run_batch(
            &eligible,
            batch_size,
            &Operator::slim_user(&args.username, months),
            gate.run_mode(),
        )
        .await?;

    let freed = format_bytes(summary.estimated_bytes_freed);
    let cost = CostSavings::estimate(
        summary.estimated_bytes_freed,
        config.reduction.daily_cost_per_gb,
    );
    info!(
        owner = %args.username,
        processed = summary.processed,
        reduced = summary.reduced,
        failed = summary.failed,
        freed_gb = %freed.gb,
        freed_tb = %freed.tb,
        cost = %cost,
        "slim-user finished"
    );

    Ok(CommandReport::SlimUser {
        analysis,
        summary: Some(summary),
        note: gate.hint().map(str::to_string),
    })
}

fn analyse(
    owner: &str,
    months: u32,
    batch_size: usize,
    videos_found: usize,
    eligible: &[Video],
    savings_ratio: f64,
    daily_cost_per_gb: f64,
) -> OwnerAnalysis {
    let current_bytes: u64 = eligible.iter().map(Video::size_bytes).sum();
    let estimated_savings_bytes = estimate_bytes_freed(current_bytes, savings_ratio);
    OwnerAnalysis {
        owner: owner.to_string(),
        older_than_months: months,
        batch_size,
        videos_found,
        eligible: eligible.len(),
        current_bytes,
        estimated_savings_bytes,
        cost_savings: CostSavings::estimate(estimated_savings_bytes, daily_cost_per_gb),
        samples: eligible
            .iter()
            .take(SAMPLE_VIDEOS)
            .map(|v| VideoSample {
                label: v.label().to_string(),
                created: v.created.format("%Y-%m-%d").to_string(),
                size_bytes: v.size_bytes(),
            })
            .collect(),
    }
}

fn log_analysis(analysis: &OwnerAnalysis) {
    let current: FormattedBytes = format_bytes(analysis.current_bytes);
    let savings = format_bytes(analysis.estimated_savings_bytes);
    info!(
        owner = %analysis.owner,
        videos_found = analysis.videos_found,
        eligible = analysis.eligible,
        current = %current,
        estimated_savings = %savings,
        cost_savings = %analysis.cost_savings,
        "eligibility analysis"
    );
    for (i, sample) in analysis.samples.iter().enumerate() {
        info!(
            n = i + 1,
            label = %sample.label,
            created = %sample.created,
            size = %format_megabytes(sample.size_bytes),
            "sample video"
        );
    }
}

// ---------------------------------------------------------------------------
// slim-video
// ---------------------------------------------------------------------------

pub async fn slim_video<S: ObjectStore, C: VideoCatalog>(
    reducer: &Reducer<S, C>,
    args: &SlimVideoArgs,
    config: &AppConfig,
) -> anyhow::Result<CommandReport> {
    let VideoRef { owner, permlink } = &args.video;
    let video = reducer
        .catalog()
        .find_by_permlink(permlink, owner)
        .await
        .with_context(|| format!("failed to look up {}", args.video))?
        .ok_or_else(|| anyhow!("video not found: {}", args.video))?;

    let backend = video.backend();
    info!(
        video_id = %video.id,
        label = video.label(),
        status = ?video.status,
        backend = %backend,
        size = %format_megabytes(video.size_bytes()),
        "video found"
    );

    match backend {
        StorageBackend::S3 => {}
        StorageBackend::Ipfs => {
            info!(video = %args.video, "video is stored on IPFS, nothing to reduce");
            return Ok(CommandReport::SlimVideo {
                video: args.video.to_string(),
                backend,
                report: None,
                note: Some("stored on IPFS; only S3 videos can be reduced".to_string()),
                failed: false,
            });
        }
        StorageBackend::Unknown => {
            warn!(video = %args.video, "video storage backend unknown, refusing to touch it");
            return Ok(CommandReport::SlimVideo {
                video: args.video.to_string(),
                backend,
                report: None,
                note: Some("unknown storage backend; only S3 videos can be reduced".to_string()),
                failed: true,
            });
        }
    }

    if video.is_optimized() {
        warn!(video = %args.video, "video already flagged as optimized, proceeding anyway");
    }

    let gate = MutationGate::resolve(&args.safety, &config.safety);
    reducer.preflight().await?;
    let report = reducer
        .reduce_video(&video, &Operator::slim_video(owner, permlink), gate.run_mode())
        .await;

    Ok(CommandReport::SlimVideo {
        video: args.video.to_string(),
        backend,
        report: Some(report),
        note: gate.hint().map(str::to_string),
        failed: false,
    })
}

// ---------------------------------------------------------------------------
// rebuild-playlists
// ---------------------------------------------------------------------------

pub async fn rebuild_playlists<S: ObjectStore, C: VideoCatalog>(
    reducer: &Reducer<S, C>,
    args: &RebuildArgs,
    config: &AppConfig,
) -> anyhow::Result<CommandReport> {
    let gate = MutationGate::resolve(&args.safety, &config.safety);
    info!(permlink = %args.permlink, gate = ?gate, "rebuilding playlists");

    let report = reducer
        .rebuild_playlists(&args.permlink, gate.run_mode())
        .await
        .with_context(|| format!("failed to rebuild playlists for {}", args.permlink))?;

    Ok(CommandReport::RebuildPlaylists {
        report,
        note: gate.hint().map(str::to_string),
    })
}
