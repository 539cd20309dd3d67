// crates/core/src/admission.rs
//! Per-client token-bucket admission control.
//!
//! Each client key owns a bucket holding at most `burst` tokens, refilled
//! continuously at `rate` tokens per second. A request is admitted iff one
//! whole token is available, which it then consumes.
//!
//! Buckets live in a [`DashMap`]: lookup-or-create, refill and consume all run
//! under the key's shard write lock via the entry API, and eviction takes the
//! same shard locks through `retain`, so neither can observe a torn bucket.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Token state for one client key.
#[derive(Debug, Clone)]
struct ClientBudget {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl ClientBudget {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, rate: f64, capacity: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

pub struct AdmissionController {
    rate: f64,
    capacity: f64,
    clients: DashMap<String, ClientBudget>,
}

impl AdmissionController {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_rate(config.requests_per_second, config.burst)
    }

    pub fn with_rate(requests_per_second: f64, burst: u32) -> Self {
        Self {
            rate: requests_per_second.max(0.0),
            capacity: f64::from(burst),
            clients: DashMap::new(),
        }
    }

    /// Admit or reject one request from `client_key`.
    pub fn allow(&self, client_key: &str) -> bool {
        self.allow_at(client_key, Instant::now())
    }

    pub(crate) fn allow_at(&self, client_key: &str, now: Instant) -> bool {
        let mut budget = self
            .clients
            .entry(client_key.to_string())
            .or_insert_with(|| ClientBudget::full(self.capacity, now));

        budget.refill(self.rate, self.capacity, now);
        budget.last_seen = now;

        if budget.tokens >= 1.0 {
            budget.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Remove every client whose last request is more than `ttl` ago.
    /// Returns the number of clients removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        self.evict_idle_at(ttl, Instant::now())
    }

    pub(crate) fn evict_idle_at(&self, ttl: Duration, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients
            .retain(|_, budget| now.saturating_duration_since(budget.last_seen) <= ttl);
        before.saturating_sub(self.clients.len())
    }

    /// Number of tracked client keys.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
