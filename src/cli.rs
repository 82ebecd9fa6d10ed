use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use url::Url;

use crate::core::config::SafetyConfig;
use crate::reduce::RunMode;

/// Command-line surface of the `videoslim` binary.
#[derive(Debug, Parser)]
#[command(
    name = "videoslim",
    version,
    about = "Reduce archived HLS videos to their smallest rendition",
    long_about = None
)]
pub struct Cli {
    /// Base configuration file (defaults to config/default.toml).
    #[arg(long, global = true, env = "VIDEOSLIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// How to print the final report.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reduce every eligible video of one owner.
    SlimUser(SlimUserArgs),
    /// Reduce a single video.
    SlimVideo(SlimVideoArgs),
    /// Regenerate a video's playlists from the segments in the bucket.
    RebuildPlaylists(RebuildArgs),
}

#[derive(Debug, Args)]
pub struct SlimUserArgs {
    #[arg(long, short = 'u')]
    pub username: String,

    /// Only videos created more than this many months ago.
    #[arg(long)]
    pub older_than_months: Option<u32>,

    /// Videos per batch (capped at the configured maximum).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Also reprocess videos already flagged as optimized.
    #[arg(long)]
    pub include_optimized: bool,

    #[command(flatten)]
    pub safety: SafetyArgs,
}

#[derive(Debug, Args)]
pub struct SlimVideoArgs {
    /// `https://<host>/watch?v=<owner>/<permlink>` or `<owner>/<permlink>`.
    pub video: VideoRef,

    #[command(flatten)]
    pub safety: SafetyArgs,
}

#[derive(Debug, Args)]
pub struct RebuildArgs {
    pub permlink: String,

    #[command(flatten)]
    pub safety: SafetyArgs,
}

#[derive(Debug, Clone, Copy, Default, Args)]
pub struct SafetyArgs {
    /// Analyse only; never delete, upload or update the catalog.
    #[arg(long)]
    pub dry_run: bool,

    /// Execute without the confirmation safeguard.
    #[arg(long)]
    pub no_confirm: bool,
}

// ---------------------------------------------------------------------------
// Confirmation gate
// ---------------------------------------------------------------------------

/// Whether a mutating command may actually mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationGate {
    Allowed,
    /// `--dry-run` was given.
    DryRunRequested,
    /// `safety.dry_run_mode` is set in the configuration.
    DryRunForced,
    /// Confirmation is required and `--no-confirm` was not given.
    AwaitingConfirmation,
}

impl MutationGate {
    pub fn resolve(args: &SafetyArgs, safety: &SafetyConfig) -> Self {
        if args.dry_run {
            MutationGate::DryRunRequested
        } else if safety.dry_run_mode {
            MutationGate::DryRunForced
        } else if safety.require_confirmation && !args.no_confirm {
            MutationGate::AwaitingConfirmation
        } else {
            MutationGate::Allowed
        }
    }

    pub fn run_mode(&self) -> RunMode {
        RunMode::from_dry_run(*self != MutationGate::Allowed)
    }

    /// What an operator has to do to turn this analysis into a real run.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            MutationGate::Allowed => None,
            MutationGate::DryRunRequested => {
                Some("dry run: no changes made; re-run without --dry-run and with --no-confirm to execute")
            }
            MutationGate::DryRunForced => {
                Some("dry run forced by safety.dry_run_mode; no changes made")
            }
            MutationGate::AwaitingConfirmation => {
                Some("confirmation required: no changes made; re-run with --no-confirm to execute")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Video references
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VideoRefError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL has no v=<owner>/<permlink> parameter")]
    MissingParameter,

    #[error("expected <owner>/<permlink>, got {0:?}")]
    Malformed(String),
}

/// A video addressed by owner and permlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub owner: String,
    pub permlink: String,
}

impl VideoRef {
    fn from_pair(pair: &str) -> Result<Self, VideoRefError> {
        match pair.split('/').collect::<Vec<_>>().as_slice() {
            [owner, permlink] if !owner.is_empty() && !permlink.is_empty() => Ok(Self {
                owner: owner.to_string(),
                permlink: permlink.to_string(),
            }),
            _ => Err(VideoRefError::Malformed(pair.to_string())),
        }
    }
}

impl FromStr for VideoRef {
    type Err = VideoRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.contains("://") {
            return Self::from_pair(s);
        }

        let url = Url::parse(s).map_err(|e| VideoRefError::InvalidUrl(e.to_string()))?;
        let pair = url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .ok_or(VideoRefError::MissingParameter)?;
        Self::from_pair(&pair)
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.permlink)
    }
}
