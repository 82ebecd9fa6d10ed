use thiserror::Error;

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors originating from the object store gateway.
///
/// "Not found" is never one of these: existence checks answer `false`,
/// reads answer `None` and deletes succeed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("S3 PUT failed for key {key}: {reason}")]
    PutFailed { key: String, reason: String },

    #[error("S3 GET failed for key {key}: {reason}")]
    GetFailed { key: String, reason: String },

    #[error("S3 HEAD failed for key {key}: {reason}")]
    HeadFailed { key: String, reason: String },

    #[error("S3 LIST failed for prefix {prefix}: {reason}")]
    ListFailed { prefix: String, reason: String },

    #[error("S3 DELETE failed for key {key}: {reason}")]
    DeleteFailed { key: String, reason: String },

    #[error("access denied for {key}: {reason}")]
    Forbidden { key: String, reason: String },

    #[error("request for {key} timed out after {timeout_secs}s")]
    Timeout { key: String, timeout_secs: u64 },

    #[error("retries exhausted for {key}: {last_error}")]
    RetriesExhausted { key: String, last_error: String },

    #[error("object {key} is not valid UTF-8")]
    NotText { key: String },
}

// ---------------------------------------------------------------------------
// Catalog errors
// ---------------------------------------------------------------------------

/// Errors from the video metadata catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("video not found: {id}")]
    VideoNotFound { id: String },

    #[error("failed to persist catalog: {reason}")]
    PersistFailed { reason: String },

    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Playlist errors
// ---------------------------------------------------------------------------

/// Errors raised while reading playlist text or rendition names.
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("unknown rendition: {value}")]
    UnknownRendition { value: String },

    #[error("malformed playlist: {reason}")]
    Malformed { reason: String },
}

// ---------------------------------------------------------------------------
// Reduction errors
// ---------------------------------------------------------------------------

/// Errors that stop a reduction run outright.
///
/// Anything scoped to a single video is turned into a failed outcome
/// instead and never surfaces as one of these.
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("object store unreachable: {0}")]
    StoreUnreachable(#[source] StorageError),

    #[error("video catalog unreachable: {0}")]
    CatalogUnreachable(#[source] CatalogError),

    #[error("invalid run parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
