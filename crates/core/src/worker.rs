// crates/core/src/worker.rs
//! Worker trait: the opaque, possibly slow retrieval step.

use async_trait::async_trait;
use clipper_types::{ClipRange, JobId};
use thiserror::Error;

/// Parameters for one worker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    pub job_id: JobId,
    pub url: String,
    pub range: Option<ClipRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutput {
    /// Where the result landed, when the worker could tell.
    pub output_location: Option<String>,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to start worker: {0}")]
    Spawn(String),

    #[error("{0}")]
    Failed(String),

    #[error("worker I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Performs the actual retrieval.
///
/// Implementations:
/// - `YtDlpWorker` - spawns `yt-dlp`
/// - `testing::StubWorker` - configurable delay and result, for tests
///
/// The executor may drop an in-flight `invoke` future on deadline or
/// shutdown; implementations must release external resources on drop.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn invoke(&self, request: &WorkerRequest) -> Result<WorkerOutput, WorkerError>;

    /// Worker name for logging.
    fn name(&self) -> &str;
}
