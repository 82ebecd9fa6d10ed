use std::future::Future;
use std::time::{Duration, Instant};

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::core::config::StorageConfig;
use crate::core::error::StorageError;
use crate::core::redact::redact_access_key;
use crate::observability::metrics as obs;

use super::{object_type_label, ObjectStore};

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

const INITIAL_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 10_000;
/// Upper bound on attempts per request, whatever the config says.
const MAX_ATTEMPTS: u32 = 10;

/// How a single failed attempt should be treated.
enum Failure {
    /// Retrying cannot help (forbidden, bad request, corrupt body).
    Permanent(StorageError),
    /// Network error, throttling, 5xx or timeout.
    Transient(String),
}

/// Per-attempt timeout plus bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryPolicy {
    request_timeout: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    fn new(request_timeout: Duration, max_retries: u32) -> Self {
        Self {
            request_timeout,
            max_attempts: max_retries.clamp(1, MAX_ATTEMPTS),
        }
    }

    /// Sleep before attempt `attempt` (0-based). Doubles from 100 ms, capped at 10 s.
    fn backoff(attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (attempt - 1).min(16);
        Duration::from_millis(INITIAL_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
    }

    /// Run one request with timeout and retry.
    async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        key: &str,
        mut call: F,
    ) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let start = Instant::now();
        let mut last_err = String::new();
        let mut timed_out = false;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let backoff = Self::backoff(attempt);
                debug!(
                    key,
                    operation,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying S3 request"
                );
                obs::inc_storage_retries(operation);
                tokio::time::sleep(backoff).await;
            }

            match tokio::time::timeout(self.request_timeout, call()).await {
                Ok(Ok(value)) => {
                    obs::record_storage_op_duration(
                        operation,
                        object_type_label(key),
                        start.elapsed().as_secs_f64(),
                    );
                    return Ok(value);
                }
                Ok(Err(Failure::Permanent(e))) => {
                    obs::inc_storage_error(operation, "permanent");
                    return Err(e);
                }
                Ok(Err(Failure::Transient(reason))) => {
                    warn!(key, operation, attempt, error = %reason, "S3 request failed");
                    timed_out = false;
                    last_err = reason;
                }
                Err(_) => {
                    warn!(
                        key,
                        operation,
                        attempt,
                        timeout_secs = self.request_timeout.as_secs(),
                        "S3 request timed out"
                    );
                    timed_out = true;
                }
            }
        }

        obs::inc_storage_error(operation, "retries_exhausted");
        if timed_out {
            return Err(StorageError::Timeout {
                key: key.to_string(),
                timeout_secs: self.request_timeout.as_secs(),
            });
        }
        Err(StorageError::RetriesExhausted {
            key: key.to_string(),
            last_error: last_err,
        })
    }
}

// ---------------------------------------------------------------------------
// S3ObjectStore
// ---------------------------------------------------------------------------

/// Production storage backend wrapping `aws-sdk-s3`.
///
/// Supports both AWS S3 and S3-compatible stores (Wasabi, MinIO, etc.)
/// via configurable endpoint and path-style addressing. Every request is
/// bounded by `request_timeout_secs` and transient failures are retried
/// with exponential backoff.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    retry: RetryPolicy,
}

impl S3ObjectStore {
    /// Create a new S3ObjectStore from configuration.
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            config.secret_access_key.expose(),
            None,
            None,
            "videoslim-config",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.path_style);

        if !config.endpoint.is_empty() {
            s3_config_builder = s3_config_builder.endpoint_url(&config.endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        let retry = RetryPolicy::new(
            Duration::from_secs(config.request_timeout_secs),
            config.max_retries,
        );
        if retry.max_attempts != config.max_retries {
            warn!(
                configured = config.max_retries,
                effective = retry.max_attempts,
                "storage.max_retries out of range, clamped"
            );
        }

        info!(
            bucket = %config.bucket,
            endpoint = %config.endpoint,
            access_key = %redact_access_key(&config.access_key_id),
            "S3 object store initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            retry,
        }
    }
}

/// HTTP status of a failed SDK call, when the service answered at all.
fn http_status<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    match err {
        SdkError::ServiceError(se) => Some(se.raw().status().as_u16()),
        SdkError::ResponseError(re) => Some(re.raw().status().as_u16()),
        _ => None,
    }
}

/// Sort an SDK failure into retry / no-retry.
fn classify<E>(
    key: &str,
    err: SdkError<E, HttpResponse>,
    wrap: impl FnOnce(String) -> StorageError,
) -> Failure
where
    E: std::error::Error + 'static,
{
    let status = http_status(&err);
    let reason = DisplayErrorContext(&err).to_string();
    match status {
        // 403 is never retried: credentials are wrong
        Some(403) => Failure::Permanent(StorageError::Forbidden {
            key: key.to_string(),
            reason,
        }),
        Some(429) => Failure::Transient(reason),
        Some(s) if (400..500).contains(&s) => Failure::Permanent(wrap(reason)),
        _ => Failure::Transient(reason),
    }
}

impl ObjectStore for S3ObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.retry.run("head", key, || async move {
            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(e) => {
                    let not_found = match &e {
                        SdkError::ServiceError(se) => se.err().is_not_found(),
                        _ => false,
                    };
                    if not_found || http_status(&e) == Some(404) {
                        return Ok(false);
                    }
                    Err(classify(key, e, |reason| StorageError::HeadFailed {
                        key: key.to_string(),
                        reason,
                    }))
                }
            }
        })
        .await
    }

    async fn get_content(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.retry.run("get", key, || async move {
            let output = match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    let no_such_key = match &e {
                        SdkError::ServiceError(se) => se.err().is_no_such_key(),
                        _ => false,
                    };
                    // Missing object, not a failure
                    if no_such_key || http_status(&e) == Some(404) {
                        return Ok(None);
                    }
                    return Err(classify(key, e, |reason| StorageError::GetFailed {
                        key: key.to_string(),
                        reason,
                    }));
                }
            };

            let body = output
                .body
                .collect()
                .await
                .map_err(|e| Failure::Transient(e.to_string()))?
                .into_bytes();

            String::from_utf8(body.to_vec())
                .map(Some)
                .map_err(|_| {
                    Failure::Permanent(StorageError::NotText {
                        key: key.to_string(),
                    })
                })
        })
        .await
    }

    async fn put_content(
        &self,
        key: &str,
        content: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let body = Bytes::from(content.to_string());
        self.retry.run("put", key, || {
            let body = body.clone();
            async move {
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .body(ByteStream::from(body))
                    .content_type(content_type)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| {
                        classify(key, e, |reason| StorageError::PutFailed {
                            key: key.to_string(),
                            reason,
                        })
                    })
            }
        })
        .await?;
        debug!(key, bytes = content.len(), "uploaded object");
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let token = continuation_token.clone();
            let page = self
                .retry.run("list", prefix, || {
                    let token = token.clone();
                    async move {
                        let mut req = self
                            .client
                            .list_objects_v2()
                            .bucket(&self.bucket)
                            .prefix(prefix);
                        if let Some(token) = token {
                            req = req.continuation_token(token);
                        }
                        req.send().await.map_err(|e| {
                            classify(prefix, e, |reason| StorageError::ListFailed {
                                prefix: prefix.to_string(),
                                reason,
                            })
                        })
                    }
                })
                .await?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            );

            match (page.is_truncated(), page.next_continuation_token()) {
                (Some(true), Some(next)) => continuation_token = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.retry.run("delete", key, || async move {
            match self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(_) => Ok(()),
                // Some S3-compatible stores answer 404 for a missing key; deletes are idempotent.
                Err(e) if http_status(&e) == Some(404) => Ok(()),
                Err(e) => Err(classify(key, e, |reason| StorageError::DeleteFailed {
                    key: key.to_string(),
                    reason,
                })),
            }
        })
        .await?;
        debug!(key, "deleted object");
        Ok(())
    }

    async fn check_access(&self) -> Result<(), StorageError> {
        let bucket = self.bucket.as_str();
        self.retry.run("list", bucket, || async move {
            self.client
                .list_objects_v2()
                .bucket(bucket)
                .max_keys(1)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    classify(bucket, e, |reason| StorageError::ListFailed {
                        prefix: String::new(),
                        reason,
                    })
                })
        })
        .await
    }
}
