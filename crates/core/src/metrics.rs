// crates/core/src/metrics.rs
//! Metric names and recording helpers for the job engine.
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed (the server installs a Prometheus one).

use std::time::Duration;

use clipper_types::{JobKind, JobStatus};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

pub const JOBS_SUBMITTED: &str = "clipper_jobs_submitted_total";
pub const JOBS_FINISHED: &str = "clipper_jobs_finished_total";
pub const JOB_DURATION: &str = "clipper_job_duration_seconds";
pub const JOBS_IN_FLIGHT: &str = "clipper_jobs_in_flight";
pub const RATE_LIMITED: &str = "clipper_rate_limited_total";
pub const RATE_LIMIT_CLIENTS: &str = "clipper_rate_limit_clients";

/// Register descriptions for every engine metric with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(JOBS_SUBMITTED, "Jobs accepted by the launcher, by kind");
    describe_counter!(JOBS_FINISHED, "Jobs that reached a terminal status, by status");
    describe_histogram!(JOB_DURATION, "Wall time from executor start to terminal status in seconds");
    describe_gauge!(JOBS_IN_FLIGHT, "Jobs currently owned by the supervisor");
    describe_counter!(RATE_LIMITED, "Requests rejected by the admission controller");
    describe_gauge!(RATE_LIMIT_CLIENTS, "Client keys tracked by the admission controller");
}

pub fn record_submitted(kind: JobKind) {
    counter!(JOBS_SUBMITTED, "kind" => kind.as_str()).increment(1);
}

pub fn record_finished(status: JobStatus, elapsed: Duration) {
    counter!(JOBS_FINISHED, "status" => status.as_str()).increment(1);
    histogram!(JOB_DURATION).record(elapsed.as_secs_f64());
}

pub fn record_in_flight(count: usize) {
    gauge!(JOBS_IN_FLIGHT).set(count as f64);
}

pub fn record_rate_limited() {
    counter!(RATE_LIMITED).increment(1);
}

pub fn record_rate_limit_clients(count: usize) {
    gauge!(RATE_LIMIT_CLIENTS).set(count as f64);
}
