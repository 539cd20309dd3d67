// crates/core/src/executor.rs
//! Task executor: runs one job to a terminal status under a deadline.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use clipper_types::{JobStatus, JobUpdate};
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::store::{StatusStore, StoreError};
use crate::worker::{Worker, WorkerRequest};

/// Message recorded when shutdown interrupts a job.
pub const SHUTDOWN_MESSAGE: &str = "service shutting down";

/// How a single execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { output_location: Option<String> },
    Failed { message: String },
    TimedOut { after: Duration },
    Cancelled,
}

impl JobOutcome {
    fn to_update(&self) -> JobUpdate {
        match self {
            JobOutcome::Completed { output_location } => JobUpdate::completed(output_location.clone()),
            JobOutcome::Failed { message } => JobUpdate::failed(message.clone()),
            JobOutcome::TimedOut { after } => {
                JobUpdate::failed(format!("job timed out after {}s", after.as_secs()))
            }
            JobOutcome::Cancelled => JobUpdate::failed(SHUTDOWN_MESSAGE),
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            _ => JobStatus::Failed,
        }
    }
}

pub struct TaskExecutor {
    store: Arc<dyn StatusStore>,
    worker: Arc<dyn Worker>,
    deadline: Duration,
}

impl TaskExecutor {
    pub fn new(store: Arc<dyn StatusStore>, worker: Arc<dyn Worker>, deadline: Duration) -> Self {
        Self {
            store,
            worker,
            deadline,
        }
    }

    /// Drive `request` from `Pending` to a terminal status.
    ///
    /// The worker runs in its own task and is aborted if the deadline expires
    /// or `cancel` fires first. Store failures on the final write are logged;
    /// the job keeps its last persisted status.
    pub async fn run(&self, request: WorkerRequest, cancel: CancellationToken) -> JobOutcome {
        let job_id = request.job_id.clone();
        let started = Instant::now();

        if let Err(e) = self.store.update(&job_id, JobUpdate::processing()).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job processing");
            let outcome = JobOutcome::Failed {
                message: format!("failed to start job: {e}"),
            };
            // An illegal transition means the record is already past Pending.
            if !matches!(e, StoreError::InvalidTransition { .. }) {
                self.record(&job_id, &outcome).await;
            }
            return outcome;
        }

        tracing::info!(
            job_id = %job_id,
            worker = self.worker.name(),
            url = %request.url,
            range = ?request.range,
            deadline_secs = self.deadline.as_secs(),
            "Job started"
        );

        let worker = Arc::clone(&self.worker);
        let mut handle = tokio::spawn(async move { worker.invoke(&request).await });

        let outcome = tokio::select! {
            joined = &mut handle => match joined {
                Ok(Ok(output)) => JobOutcome::Completed { output_location: output.output_location },
                Ok(Err(e)) => JobOutcome::Failed { message: e.to_string() },
                Err(e) => JobOutcome::Failed { message: describe_join_error(e) },
            },
            _ = tokio::time::sleep(self.deadline) => {
                handle.abort();
                JobOutcome::TimedOut { after: self.deadline }
            }
            _ = cancel.cancelled() => {
                handle.abort();
                JobOutcome::Cancelled
            }
        };

        let elapsed = started.elapsed();
        match &outcome {
            JobOutcome::Completed { output_location } => tracing::info!(
                job_id = %job_id,
                elapsed_ms = elapsed.as_millis() as u64,
                output = ?output_location,
                "Job completed"
            ),
            JobOutcome::Failed { message } => tracing::warn!(
                job_id = %job_id,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %message,
                "Job failed"
            ),
            JobOutcome::TimedOut { after } => tracing::warn!(
                job_id = %job_id,
                timeout_secs = after.as_secs(),
                "Job timed out, worker cancelled"
            ),
            JobOutcome::Cancelled => tracing::info!(job_id = %job_id, "Job cancelled by shutdown"),
        }

        self.record(&job_id, &outcome).await;
        crate::metrics::record_finished(outcome.status(), elapsed);
        outcome
    }

    async fn record(&self, job_id: &str, outcome: &JobOutcome) {
        if let Err(e) = self.store.update(job_id, outcome.to_update()).await {
            tracing::error!(
                job_id = %job_id,
                status = %outcome.status(),
                error = %e,
                "Failed to update job status"
            );
        }
    }
}

/// Human-readable cause of an aborted or panicked task.
pub fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => format!("panic: {}", panic_message(payload.as_ref())),
        Err(other) => other.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
