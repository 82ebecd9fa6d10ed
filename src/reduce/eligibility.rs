use chrono::{DateTime, Months, Utc};
use std::fmt;

use crate::core::error::ReduceError;
use crate::core::types::{StorageBackend, Video};

// ---------------------------------------------------------------------------
// Eligibility filter
// ---------------------------------------------------------------------------

/// Why a video was left out of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    NoPermlink,
    Backend(StorageBackend),
    TooRecent,
    AlreadyOptimized,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligible::NoPermlink => write!(f, "no permlink"),
            Ineligible::Backend(backend) => write!(f, "stored on {}", backend),
            Ineligible::TooRecent => write!(f, "newer than cutoff"),
            Ineligible::AlreadyOptimized => write!(f, "already optimized"),
        }
    }
}

/// Selection predicate for a batch run.
///
/// A video qualifies when it has a permlink, lives in S3, was created
/// strictly before `cutoff`, and is not yet optimized (unless
/// `include_optimized` asks for reprocessing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityFilter {
    pub cutoff: DateTime<Utc>,
    pub include_optimized: bool,
}

impl EligibilityFilter {
    /// Filter for videos older than `months` calendar months before `now`.
    pub fn older_than_months(
        now: DateTime<Utc>,
        months: u32,
        include_optimized: bool,
    ) -> Result<Self, ReduceError> {
        if months == 0 {
            return Err(ReduceError::InvalidParameters {
                reason: "age threshold must be at least one month".to_string(),
            });
        }
        let cutoff = now
            .checked_sub_months(Months::new(months))
            .ok_or_else(|| ReduceError::InvalidParameters {
                reason: format!("{} months before {} is out of range", months, now),
            })?;
        Ok(Self {
            cutoff,
            include_optimized,
        })
    }

    pub fn check(&self, video: &Video) -> Result<(), Ineligible> {
        if video.permlink.as_deref().map_or(true, str::is_empty) {
            return Err(Ineligible::NoPermlink);
        }
        match video.backend() {
            StorageBackend::S3 => {}
            other => return Err(Ineligible::Backend(other)),
        }
        if video.created >= self.cutoff {
            return Err(Ineligible::TooRecent);
        }
        if video.is_optimized() && !self.include_optimized {
            return Err(Ineligible::AlreadyOptimized);
        }
        Ok(())
    }

    pub fn is_eligible(&self, video: &Video) -> bool {
        self.check(video).is_ok()
    }

    /// Keep only eligible videos, preserving order.
    pub fn select(&self, videos: Vec<Video>) -> Vec<Video> {
        videos.into_iter().filter(|v| self.is_eligible(v)).collect()
    }
}
