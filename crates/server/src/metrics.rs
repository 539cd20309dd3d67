//! Prometheus recorder and HTTP request metrics.
//!
//! Job-level metrics are defined in `clipper_core::metrics`; this module
//! installs the recorder they report to and adds per-endpoint request
//! counters.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();
    clipper_core::metrics::describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!(
        "clipper_http_requests_total",
        "Total number of API requests by endpoint and status"
    );
    describe_histogram!(
        "clipper_http_request_duration_seconds",
        "Duration of API requests in seconds"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_request(endpoint: &str, status: u16, duration: std::time::Duration) {
    counter!("clipper_http_requests_total", "endpoint" => endpoint.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!("clipper_http_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(duration.as_secs_f64());
}

/// Helper for timing request handlers.
///
/// ```ignore
/// let timer = RequestTimer::new("submit_full");
/// let result = do_work().await;
/// timer.finish(status);
/// ```
pub struct RequestTimer {
    endpoint: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            start: Instant::now(),
        }
    }

    pub fn finish(self, status: u16) {
        record_request(self.endpoint, status, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_timer() {
        // Without an installed recorder this is a no-op; it must not panic.
        let timer = RequestTimer::new("test_endpoint");
        timer.finish(202);
    }
}
