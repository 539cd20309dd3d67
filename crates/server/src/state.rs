// crates/server/src/state.rs
//! Application state for the Axum server.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use clipper_core::{
    AdmissionController, Config, JobLauncher, JobSupervisor, StatusNotifier, StatusStore,
    TaskExecutor, Worker,
};
use tokio_util::sync::CancellationToken;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Write path: validate, persist, hand off.
    pub launcher: JobLauncher,
    /// Read path: point lookups and SSE status streams.
    pub notifier: StatusNotifier,
    /// Owns every running job task.
    pub supervisor: Arc<JobSupervisor>,
    /// Per-client token buckets, shared with the cleanup sweeper.
    pub admission: Arc<AdmissionController>,
    /// Peers whose forwarding headers identify the client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl AppState {
    /// Wire the engine together around `store` and `worker`.
    ///
    /// Cancelling `shutdown` stops the supervisor from accepting jobs and
    /// fails the ones still running.
    pub fn new(
        store: Arc<dyn StatusStore>,
        worker: Arc<dyn Worker>,
        config: &Config,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let executor = Arc::new(TaskExecutor::new(
            Arc::clone(&store),
            worker,
            config.launcher.job_deadline,
        ));
        let supervisor = Arc::new(JobSupervisor::new(
            executor,
            Arc::clone(&store),
            config.launcher.max_concurrent_jobs,
            shutdown,
        ));

        Arc::new(Self {
            start_time: Instant::now(),
            launcher: JobLauncher::new(
                Arc::clone(&store),
                Arc::clone(&supervisor),
                config.launcher.clone(),
            ),
            notifier: StatusNotifier::new(store, &config.notifier),
            supervisor,
            admission: Arc::new(AdmissionController::new(&config.rate_limit)),
            trusted_proxies: config.rate_limit.trusted_proxies.clone(),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipper_core::testing::StubWorker;
    use clipper_core::InMemoryStatusStore;

    #[tokio::test]
    async fn test_app_state_starts_idle() {
        let state = AppState::new(
            Arc::new(InMemoryStatusStore::new()),
            Arc::new(StubWorker::succeeding(None)),
            &Config::default(),
            CancellationToken::new(),
        );
        assert_eq!(state.uptime_secs(), 0);
        assert_eq!(state.supervisor.in_flight(), 0);
        assert!(state.admission.is_empty());
    }
}
