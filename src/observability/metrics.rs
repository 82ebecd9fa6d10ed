use std::path::Path;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// ---------------------------------------------------------------------------
// Metrics catalog
// ---------------------------------------------------------------------------

/// Register all metric descriptors.
///
/// Call once after installing a recorder and before any metrics are recorded.
pub fn describe_all_metrics() {
    // -- Reduction --
    describe_counter!(
        "videoslim_videos_processed_total",
        "Videos handled by the reduction orchestrator, by outcome"
    );
    describe_counter!(
        "videoslim_objects_deleted_total",
        "Objects removed while discarding renditions"
    );
    describe_counter!(
        "videoslim_delete_errors_total",
        "Object deletes that failed during a reduction"
    );
    describe_counter!(
        "videoslim_estimated_bytes_freed_total",
        "Estimated bytes freed (size heuristic, not measured)"
    );
    describe_counter!(
        "videoslim_master_playlists_written_total",
        "Master playlists rewritten for a single rendition"
    );

    // -- Storage --
    describe_histogram!(
        "videoslim_storage_op_duration_seconds",
        "Object store request latency including retries"
    );
    describe_counter!(
        "videoslim_storage_retries_total",
        "Object store request retries"
    );
    describe_counter!(
        "videoslim_storage_errors_total",
        "Object store requests that ultimately failed"
    );
}

// ---------------------------------------------------------------------------
// Metric recording helpers
// ---------------------------------------------------------------------------

// -- Reduction --

pub fn inc_videos_processed(outcome: &str) {
    counter!("videoslim_videos_processed_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn add_objects_deleted(count: u64) {
    counter!("videoslim_objects_deleted_total").increment(count);
}

pub fn add_delete_errors(count: u64) {
    counter!("videoslim_delete_errors_total").increment(count);
}

pub fn add_estimated_bytes_freed(bytes: u64) {
    counter!("videoslim_estimated_bytes_freed_total").increment(bytes);
}

pub fn inc_master_playlists_written(rendition: &str) {
    counter!("videoslim_master_playlists_written_total", "rendition" => rendition.to_string())
        .increment(1);
}

// -- Storage --

pub fn record_storage_op_duration(operation: &str, object_type: &str, seconds: f64) {
    histogram!("videoslim_storage_op_duration_seconds", "operation" => operation.to_string(), "object_type" => object_type.to_string()).record(seconds);
}

pub fn inc_storage_retries(operation: &str) {
    counter!("videoslim_storage_retries_total", "operation" => operation.to_string()).increment(1);
}

pub fn inc_storage_error(operation: &str, error_type: &str) {
    counter!("videoslim_storage_errors_total", "operation" => operation.to_string(), "error_type" => error_type.to_string()).increment(1);
}

// ---------------------------------------------------------------------------
// Prometheus recorder installation
// ---------------------------------------------------------------------------

/// Install the Prometheus metrics recorder.
///
/// Sets the global `metrics` recorder backed by `metrics-exporter-prometheus`.
/// The returned handle renders the text exposition format.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Write a Prometheus text snapshot, e.g. for node_exporter's textfile collector.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render())?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        inc_videos_processed("reduced");
        add_objects_deleted(3);
        record_storage_op_duration("head", "rendition_playlist", 0.01);
    }
}
