// crates/core/src/launcher.rs
//! Job launcher: validate, persist, hand off.

use std::sync::Arc;

use clipper_types::{ErrorCode, JobId, JobKind, JobParams, JobUpdate};
use thiserror::Error;

use crate::config::LauncherConfig;
use crate::store::StatusStore;
use crate::supervisor::JobSupervisor;
use crate::validate::{normalize_url, validate_range, ValidationError};
use crate::worker::WorkerRequest;

/// A client's request, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSubmission {
    Full { url: String },
    Range { url: String, start_secs: i64, end_secs: i64 },
}

impl JobSubmission {
    pub fn kind(&self) -> JobKind {
        match self {
            JobSubmission::Full { .. } => JobKind::FullRetrieval,
            JobSubmission::Range { .. } => JobKind::RangeRetrieval,
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to start job: {0}")]
    Launch(String),
}

impl SubmitError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SubmitError::Validation(e) => e.code(),
            SubmitError::Launch(_) => ErrorCode::LaunchFailed,
        }
    }
}

pub struct JobLauncher {
    store: Arc<dyn StatusStore>,
    supervisor: Arc<JobSupervisor>,
    config: LauncherConfig,
}

impl JobLauncher {
    pub fn new(store: Arc<dyn StatusStore>, supervisor: Arc<JobSupervisor>, config: LauncherConfig) -> Self {
        Self {
            store,
            supervisor,
            config,
        }
    }

    /// Accept a job and return its id without waiting for it to run.
    ///
    /// Validation happens before anything is written; a rejected submission
    /// leaves no record and never reaches a worker.
    pub async fn submit(&self, submission: JobSubmission) -> Result<JobId, SubmitError> {
        let kind = submission.kind();
        let params = self.validate(&submission)?;

        let job_id = self.store.create(kind, params.clone()).await.map_err(|e| {
            tracing::error!(error = %e, kind = %kind, "Failed to create job record");
            SubmitError::Launch(e.to_string())
        })?;

        let request = WorkerRequest {
            job_id: job_id.clone(),
            url: params.url,
            range: params.range,
        };
        if let Err(e) = self.supervisor.spawn(request) {
            tracing::error!(job_id = %job_id, error = %e, "Failed to start job executor");
            if let Err(store_err) = self.store.update(&job_id, JobUpdate::failed(e.to_string())).await {
                tracing::warn!(job_id = %job_id, error = %store_err, "Failed to record launch failure");
            }
            return Err(SubmitError::Launch(e.to_string()));
        }

        crate::metrics::record_submitted(kind);
        tracing::info!(job_id = %job_id, kind = %kind, "Job accepted");
        Ok(job_id)
    }

    fn validate(&self, submission: &JobSubmission) -> Result<JobParams, ValidationError> {
        match submission {
            JobSubmission::Full { url } => Ok(JobParams::full(normalize_url(url)?)),
            JobSubmission::Range {
                url,
                start_secs,
                end_secs,
            } => {
                let url = normalize_url(url)?;
                let range = validate_range(*start_secs, *end_secs, self.config.max_clip_duration)?;
                Ok(JobParams::range(url, range))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TaskExecutor;
    use crate::store::InMemoryStatusStore;
    use crate::testing::{FailingStore, StubWorker};
    use clipper_types::{ClipRange, JobStatus};
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn launcher_with(store: Arc<dyn StatusStore>, worker: Arc<StubWorker>) -> JobLauncher {
        let config = LauncherConfig::default();
        let executor = Arc::new(TaskExecutor::new(store.clone(), worker, config.job_deadline));
        let supervisor = Arc::new(JobSupervisor::new(
            executor,
            store.clone(),
            config.max_concurrent_jobs,
            CancellationToken::new(),
        ));
        JobLauncher::new(store, supervisor, config)
    }

    async fn wait_for_terminal(store: &InMemoryStatusStore, id: &str) -> JobStatus {
        for _ in 0..200 {
            let status = store.get(id).await.unwrap().status;
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish within 2s");
    }

    #[tokio::test]
    async fn test_range_job_completes() {
        let store = Arc::new(InMemoryStatusStore::new());
        let worker = Arc::new(StubWorker::succeeding(Some("videos/clip.mp4")).with_delay(Duration::from_millis(50)));
        let launcher = launcher_with(store.clone(), worker.clone());

        let id = launcher
            .submit(JobSubmission::Range {
                url: "https://example.com/v".into(),
                start_secs: 0,
                end_secs: 30,
            })
            .await
            .unwrap();
        assert!(!id.is_empty());

        assert_eq!(wait_for_terminal(&store, &id).await, JobStatus::Completed);
        let first = store.get(&id).await.unwrap().snapshot();
        let second = store.get(&id).await.unwrap().snapshot();
        assert_eq!(first, second);
        assert_eq!(first.output_location.as_deref(), Some("videos/clip.mp4"));

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.params.range, Some(ClipRange { start_secs: 0, end_secs: 30 }));
    }

    #[tokio::test]
    async fn test_invalid_range_never_reaches_worker() {
        let store = Arc::new(InMemoryStatusStore::new());
        let worker = Arc::new(StubWorker::succeeding(None));
        let launcher = launcher_with(store.clone(), worker.clone());

        let cases = [(10, 5), (-1, 10), (0, 0), (0, 3601)];
        for (start, end) in cases {
            let err = launcher
                .submit(JobSubmission::Range {
                    url: "https://example.com/v".into(),
                    start_secs: start,
                    end_secs: end,
                })
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidTimeRange, "{start}..{end}");
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(worker.invocations(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_bad_url_rejected_without_record() {
        let store = Arc::new(InMemoryStatusStore::new());
        let launcher = launcher_with(store.clone(), Arc::new(StubWorker::succeeding(None)));

        let err = launcher
            .submit(JobSubmission::Full { url: "  ".into() })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UrlRequired);

        let err = launcher
            .submit(JobSubmission::Full {
                url: "ftp://example.com/v".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidUrl);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_url_normalized_before_persisting() {
        let store = Arc::new(InMemoryStatusStore::new());
        let launcher = launcher_with(store.clone(), Arc::new(StubWorker::succeeding(None)));

        let id = launcher
            .submit(JobSubmission::Full {
                url: " example.com/watch?v=abc ".into(),
            })
            .await
            .unwrap();
        let record = store.get(&id).await.unwrap();
        assert_eq!(record.params.url, "https://example.com/watch?v=abc");
        assert_eq!(record.kind, JobKind::FullRetrieval);
    }

    #[tokio::test]
    async fn test_store_unavailable_is_launch_error() {
        let worker = Arc::new(StubWorker::succeeding(None));
        let launcher = launcher_with(Arc::new(FailingStore), worker.clone());

        let err = launcher
            .submit(JobSubmission::Full {
                url: "https://example.com/v".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Launch(_)));
        assert_eq!(err.code(), ErrorCode::LaunchFailed);
        assert_eq!(worker.invocations(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_unique_ids() {
        let store = Arc::new(InMemoryStatusStore::new());
        let launcher = Arc::new(launcher_with(store.clone(), Arc::new(StubWorker::succeeding(None))));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let launcher = Arc::clone(&launcher);
            handles.push(tokio::spawn(async move {
                launcher
                    .submit(JobSubmission::Full {
                        url: "https://example.com/v".into(),
                    })
                    .await
                    .unwrap()
            }));
        }
        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }
        assert_eq!(ids.len(), 32);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_marks_job_failed() {
        let store = Arc::new(InMemoryStatusStore::new());
        let config = LauncherConfig::default();
        let worker = Arc::new(StubWorker::succeeding(None));
        let executor = Arc::new(TaskExecutor::new(store.clone(), worker, config.job_deadline));
        let shutdown = CancellationToken::new();
        let supervisor = Arc::new(JobSupervisor::new(executor, store.clone(), 1, shutdown.clone()));
        let launcher = JobLauncher::new(store.clone(), supervisor, config);

        shutdown.cancel();
        let err = launcher
            .submit(JobSubmission::Full {
                url: "https://example.com/v".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::LaunchFailed);

        // The record was created before the spawn was refused.
        assert_eq!(store.len(), 1);
    }
}
