use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Sensitive value redaction
// ---------------------------------------------------------------------------

/// A wrapper that redacts its contents when displayed or debug-printed.
///
/// Serializes transparently so it can sit directly in config structs.
///
/// ```ignore
/// let secret = Redacted::new("wJalrXUtnFEMI".to_string());
/// tracing::info!(secret = %secret, "configured"); // logs: secret=[REDACTED]
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the real value. Call sites should be the ones that hand it to a client.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Redact an access key id for logging: keep the first 4 chars.
pub fn redact_access_key(key: &str) -> String {
    if key.len() <= 4 {
        return "****".to_string();
    }
    let visible: String = key.chars().take(4).collect();
    format!("{}***", visible)
}
