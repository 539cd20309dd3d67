// crates/core/src/sweeper.rs
//! Background reaper for idle admission-controller clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionController;
use crate::config::RateLimitConfig;

pub struct CleanupSweeper {
    controller: Arc<AdmissionController>,
    interval: Duration,
    ttl: Duration,
}

impl CleanupSweeper {
    pub fn new(controller: Arc<AdmissionController>, config: &RateLimitConfig) -> Self {
        Self {
            controller,
            interval: config.cleanup_interval.max(Duration::from_millis(1)),
            ttl: config.client_ttl,
        }
    }

    /// Run the sweep loop on the current runtime until `shutdown` fires.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            "Rate limiter cleanup started"
        );

        // First sweep one full interval after start, not immediately.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep();
                }
            }
        }

        tracing::info!("Rate limiter cleanup stopped");
    }

    /// One eviction pass. Returns the number of clients removed.
    pub fn sweep(&self) -> usize {
        let removed = self.controller.evict_idle(self.ttl);
        let remaining = self.controller.len();
        crate::metrics::record_rate_limit_clients(remaining);

        if removed > 0 {
            tracing::info!(
                removed_count = removed,
                remaining_clients = remaining,
                "Cleaned up expired rate limiter clients"
            );
        } else {
            tracing::debug!(remaining_clients = remaining, "Rate limiter sweep found nothing to evict");
        }
        removed
    }
}
