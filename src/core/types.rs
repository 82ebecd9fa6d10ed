use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::PlaylistError;

// ---------------------------------------------------------------------------
// Renditions
// ---------------------------------------------------------------------------

/// One quality tier of a video's HLS content.
///
/// Declaration order is quality order: `360p < 480p < 720p < 1080p`.
/// The derived `Ord` is what every "smallest rendition" decision relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rendition {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

/// Fixed stream attributes advertised for a rendition in the master playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenditionSpec {
    pub bandwidth: u32,
    pub width: u32,
    pub height: u32,
}

impl Rendition {
    /// Every tier, ascending by quality.
    pub const ALL: [Rendition; 4] = [
        Rendition::P360,
        Rendition::P480,
        Rendition::P720,
        Rendition::P1080,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rendition::P360 => "360p",
            Rendition::P480 => "480p",
            Rendition::P720 => "720p",
            Rendition::P1080 => "1080p",
        }
    }

    pub fn spec(&self) -> RenditionSpec {
        match self {
            Rendition::P360 => RenditionSpec {
                bandwidth: 600_000,
                width: 640,
                height: 360,
            },
            Rendition::P480 => RenditionSpec {
                bandwidth: 800_000,
                width: 854,
                height: 480,
            },
            Rendition::P720 => RenditionSpec {
                bandwidth: 1_200_000,
                width: 1280,
                height: 720,
            },
            Rendition::P1080 => RenditionSpec {
                bandwidth: 2_000_000,
                width: 1920,
                height: 1080,
            },
        }
    }
}

impl fmt::Display for Rendition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rendition {
    type Err = PlaylistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rendition::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| PlaylistError::UnknownRendition {
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Storage backend classification
// ---------------------------------------------------------------------------

/// URI scheme marking content that lives on IPFS rather than in the bucket.
pub const IPFS_SCHEME: &str = "ipfs://";

/// Where a video's HLS content lives. Never stored; always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Ipfs,
    Unknown,
}

impl StorageBackend {
    /// Classify a video from its manifest/filename locator.
    ///
    /// `ipfs://...` is IPFS, any other non-empty locator is an S3 object
    /// name, and a missing or blank locator is unknown.
    pub fn classify(locator: Option<&str>) -> Self {
        match locator.map(str::trim) {
            Some(l) if l.starts_with(IPFS_SCHEME) => StorageBackend::Ipfs,
            Some(l) if !l.is_empty() => StorageBackend::S3,
            _ => StorageBackend::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::S3 => "s3",
            StorageBackend::Ipfs => "ipfs",
            StorageBackend::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

/// Lifecycle tag owned by the upstream ingest pipeline. Read, never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Published,
    Deleted,
    Uploaded,
    EncodingIpfs,
    Processing,
    Failed,
    Draft,
}

/// Audit record written back after a successful reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationMetadata {
    pub optimized_at: DateTime<Utc>,
    pub optimization_type: String,
    pub optimized_by: String,
    pub estimated_bytes_freed: u64,
}

/// One media asset as seen through the video catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub owner: String,
    #[serde(default)]
    pub permlink: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// S3 object name, or `ipfs://<cid>` for IPFS-hosted videos.
    #[serde(default)]
    pub filename: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub size: Option<u64>,
    pub status: VideoStatus,
    #[serde(default)]
    pub optimization: Option<OptimizationMetadata>,
}

impl Video {
    /// The locator backend classification looks at: the filename, falling
    /// back to the permlink when the filename is absent.
    pub fn locator(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .or(self.permlink.as_deref())
    }

    pub fn backend(&self) -> StorageBackend {
        StorageBackend::classify(self.locator())
    }

    pub fn is_optimized(&self) -> bool {
        self.optimization.is_some()
    }

    /// Human label for logs: title, then permlink, then id.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.permlink.as_deref())
            .unwrap_or(&self.id)
    }

    pub fn size_bytes(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Object keys
// ---------------------------------------------------------------------------

/// `<permlink>/default.m3u8`
pub fn master_playlist_key(permlink: &str) -> String {
    format!("{}/default.m3u8", permlink)
}

/// `<permlink>/<rendition>.m3u8`
pub fn rendition_playlist_key(permlink: &str, rendition: Rendition) -> String {
    format!("{}/{}.m3u8", permlink, rendition)
}

/// `<permlink>/<rendition>/`
pub fn segment_prefix(permlink: &str, rendition: Rendition) -> String {
    format!("{}/{}/", permlink, rendition)
}

/// `<permlink>/<rendition>/<index>.ts`
pub fn segment_key(permlink: &str, rendition: Rendition, index: u64) -> String {
    format!("{}/{}/{}.ts", permlink, rendition, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(filename: Option<&str>, permlink: Option<&str>) -> Video {
        Video {
            id: "v1".to_string(),
            owner: "alice".to_string(),
            permlink: permlink.map(str::to_string),
            title: None,
            filename: filename.map(str::to_string),
            created: Utc::now(),
            size: None,
            status: VideoStatus::Published,
            optimization: None,
        }
    }

    #[test]
    fn test_rendition_order() {
        assert!(Rendition::P360 < Rendition::P480);
        assert!(Rendition::P480 < Rendition::P720);
        assert!(Rendition::P720 < Rendition::P1080);
        let mut sorted = Rendition::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Rendition::ALL.to_vec());
    }

    #[test]
    fn test_rendition_parse() {
        assert_eq!("720p".parse::<Rendition>().unwrap(), Rendition::P720);
        assert!("240p".parse::<Rendition>().is_err());
        for r in Rendition::ALL {
            assert_eq!(r.as_str().parse::<Rendition>().unwrap(), r);
        }
    }

    #[test]
    fn test_rendition_serde_names() {
        let json = serde_json::to_string(&Rendition::P1080).unwrap();
        assert_eq!(json, "\"1080p\"");
    }

    #[test]
    fn test_classify_backend() {
        assert_eq!(
            StorageBackend::classify(Some("ipfs://QmXyz/manifest.m3u8")),
            StorageBackend::Ipfs
        );
        assert_eq!(
            StorageBackend::classify(Some("abcdefgh.mp4")),
            StorageBackend::S3
        );
        assert_eq!(StorageBackend::classify(Some("  ")), StorageBackend::Unknown);
        assert_eq!(StorageBackend::classify(None), StorageBackend::Unknown);
    }

    #[test]
    fn test_video_backend_falls_back_to_permlink() {
        assert_eq!(video(None, Some("zlsjctuz")).backend(), StorageBackend::S3);
        assert_eq!(
            video(Some("ipfs://Qm"), Some("zlsjctuz")).backend(),
            StorageBackend::Ipfs
        );
        assert_eq!(video(None, None).backend(), StorageBackend::Unknown);
    }

    #[test]
    fn test_object_keys() {
        assert_eq!(master_playlist_key("abc"), "abc/default.m3u8");
        assert_eq!(rendition_playlist_key("abc", Rendition::P480), "abc/480p.m3u8");
        assert_eq!(segment_prefix("abc", Rendition::P1080), "abc/1080p/");
        assert_eq!(segment_key("abc", Rendition::P360, 12), "abc/360p/12.ts");
    }
}
