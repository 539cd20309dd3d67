// crates/core/src/config.rs
//! Service configuration.
//!
//! Every knob has a default matching production behavior and may be
//! overridden through the environment. Values that fail to parse are
//! ignored with a warning rather than aborting startup.

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Token-bucket admission settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Refill rate in tokens per second.
    pub requests_per_second: f64,
    /// Bucket capacity.
    pub burst: u32,
    pub cleanup_interval: Duration,
    pub client_ttl: Duration,
    /// Peers allowed to name the client through forwarding headers. Empty
    /// means every peer is believed.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5.0,
            burst: 10,
            cleanup_interval: Duration::from_secs(60),
            client_ttl: Duration::from_secs(180),
            trusted_proxies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LauncherConfig {
    /// Longest clip a range retrieval may request.
    pub max_clip_duration: Duration,
    /// Hard per-job deadline enforced by the task executor.
    pub job_deadline: Duration,
    /// Number of jobs whose worker may run at the same time.
    pub max_concurrent_jobs: usize,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            max_clip_duration: Duration::from_secs(3600),
            job_deadline: Duration::from_secs(30 * 60),
            max_concurrent_jobs: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifierConfig {
    pub poll_interval: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// `yt-dlp` executable, resolved through `PATH` when not absolute.
    pub ytdlp_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: PathBuf::from("yt-dlp"),
            output_dir: PathBuf::from("videos"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub rate_limit: RateLimitConfig,
    pub launcher: LauncherConfig,
    pub notifier: NotifierConfig,
    pub worker: WorkerConfig,
}

impl Config {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let rl = &mut config.rate_limit;
        if let Some(rps) = parse::<f64>(&lookup, "RATE_LIMIT_RPS").filter(|v| *v > 0.0) {
            rl.requests_per_second = rps;
        }
        if let Some(burst) = parse::<u32>(&lookup, "RATE_LIMIT_BURST").filter(|v| *v > 0) {
            rl.burst = burst;
        }
        if let Some(secs) = parse::<u64>(&lookup, "RATE_LIMIT_CLEANUP_INTERVAL") {
            rl.cleanup_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse::<u64>(&lookup, "RATE_LIMIT_CLIENT_TTL") {
            rl.client_ttl = Duration::from_secs(secs);
        }
        if let Some(raw) = non_empty(&lookup, "CLIPPER_TRUSTED_PROXIES") {
            rl.trusted_proxies = parse_ip_list(&raw);
        }

        let launcher = &mut config.launcher;
        if let Some(secs) = parse::<u64>(&lookup, "CLIPPER_MAX_CLIP_SECS").filter(|v| *v > 0) {
            launcher.max_clip_duration = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, "CLIPPER_JOB_DEADLINE_SECS").filter(|v| *v > 0) {
            launcher.job_deadline = Duration::from_secs(secs);
        }
        if let Some(n) = parse::<usize>(&lookup, "CLIPPER_MAX_CONCURRENT_JOBS") {
            launcher.max_concurrent_jobs = n.max(1);
        }

        if let Some(ms) = parse::<u64>(&lookup, "CLIPPER_STATUS_POLL_MS").filter(|v| *v > 0) {
            config.notifier.poll_interval = Duration::from_millis(ms);
        }

        if let Some(path) = non_empty(&lookup, "YT_DLP_PATH") {
            config.worker.ytdlp_path = PathBuf::from(path);
        }
        if let Some(dir) = non_empty(&lookup, "CLIPPER_OUTPUT_DIR") {
            config.worker.output_dir = PathBuf::from(dir);
        }

        config
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_launcher(mut self, launcher: LauncherConfig) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_notifier(mut self, notifier: NotifierConfig) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Comma-separated IPs. Entries that do not parse are skipped with a warning.
fn parse_ip_list(raw: &str) -> Vec<IpAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(value = %entry, "Ignoring invalid trusted proxy address");
                None
            }
        })
        .collect()
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = non_empty(lookup, key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable config value");
            None
        }
    }
}
