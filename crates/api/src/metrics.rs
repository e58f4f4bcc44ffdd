//! Prometheus metrics for sync, classification, and invoicing.

use metrics::{counter, histogram};
use std::time::Instant;

/// Metric names
pub mod names {
    pub const SYNC_RUNS: &str = "calendar_sync_runs_total";
    pub const SYNC_EVENTS_UPSERTED: &str = "calendar_sync_events_upserted_total";
    pub const SYNC_DURATION: &str = "calendar_sync_duration_seconds";
    pub const JOBS_CLAIMED: &str = "sync_jobs_claimed_total";
    pub const EVENTS_CLASSIFIED: &str = "events_classified_total";
    pub const ENTRIES_RECOMPUTED: &str = "time_entries_recomputed_total";
    pub const INVOICES_CREATED: &str = "invoices_created_total";
}

/// Record a finished sync run
pub fn record_sync_run(status: &'static str, events_upserted: u64) {
    counter!(names::SYNC_RUNS, "status" => status).increment(1);
    counter!(names::SYNC_EVENTS_UPSERTED).increment(events_upserted);
}

pub fn record_job_claimed(job_type: &str) {
    counter!(names::JOBS_CLAIMED, "job_type" => job_type.to_string()).increment(1);
}

/// Record classification decisions by source
pub fn record_classified(source: &str, count: u64) {
    counter!(names::EVENTS_CLASSIFIED, "source" => source.to_string()).increment(count);
}

pub fn record_recompute(entries: u64) {
    counter!(names::ENTRIES_RECOMPUTED).increment(entries);
}

pub fn record_invoice_created() {
    counter!(names::INVOICES_CREATED).increment(1);
}

/// Helper struct for timing sync operations
pub struct SyncTimer {
    start: Instant,
}

impl SyncTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        histogram!(names::SYNC_DURATION).record(self.start.elapsed().as_secs_f64());
    }
}

/// Initialize the Prometheus metrics exporter
pub fn init_metrics() -> metrics_exporter_prometheus::PrometheusHandle {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    builder
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder")
}
