// crates/core/src/supervisor.rs
//! Bounded job supervisor.
//!
//! Owns every running executor. A semaphore caps how many workers run at
//! once (excess jobs wait, still `Pending`), an in-flight set guarantees a
//! single executor per job id, and each executor body runs in its own task
//! so that a panic or abort becomes a `Failed` status instead of escaping.

use std::sync::Arc;
use std::time::Duration;

use clipper_types::{JobId, JobUpdate};
use dashmap::DashSet;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::executor::{describe_join_error, TaskExecutor, SHUTDOWN_MESSAGE};
use crate::store::StatusStore;
use crate::worker::WorkerRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("job {0} already has a running executor")]
    AlreadyRunning(JobId),

    #[error("supervisor is shutting down")]
    ShuttingDown,
}

pub struct JobSupervisor {
    executor: Arc<TaskExecutor>,
    store: Arc<dyn StatusStore>,
    permits: Arc<Semaphore>,
    in_flight: Arc<DashSet<JobId>>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

/// Removes the job id from the in-flight set when the supervised task ends,
/// however it ends.
struct InFlightGuard {
    in_flight: Arc<DashSet<JobId>>,
    job_id: JobId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.job_id);
        crate::metrics::record_in_flight(self.in_flight.len());
    }
}

impl JobSupervisor {
    pub fn new(
        executor: Arc<TaskExecutor>,
        store: Arc<dyn StatusStore>,
        max_concurrent_jobs: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            executor,
            store,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            in_flight: Arc::new(DashSet::new()),
            tasks: TaskTracker::new(),
            shutdown,
        }
    }

    /// Start supervising `request`. Returns once the task is spawned; the job
    /// runs when a concurrency slot frees up.
    pub fn spawn(&self, request: WorkerRequest) -> Result<JoinHandle<()>, SpawnError> {
        if self.shutdown.is_cancelled() {
            return Err(SpawnError::ShuttingDown);
        }

        let job_id = request.job_id.clone();
        if !self.in_flight.insert(job_id.clone()) {
            return Err(SpawnError::AlreadyRunning(job_id));
        }
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            job_id: job_id.clone(),
        };
        crate::metrics::record_in_flight(self.in_flight.len());

        let executor = Arc::clone(&self.executor);
        let store = Arc::clone(&self.store);
        let permits = Arc::clone(&self.permits);
        let shutdown = self.shutdown.clone();

        Ok(self.tasks.spawn(async move {
            let _guard = guard;

            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                tracing::info!(job_id = %job_id, "Job dropped before start, supervisor shutting down");
                mark_failed(store.as_ref(), &job_id, SHUTDOWN_MESSAGE).await;
                return;
            };

            let cancel = shutdown.child_token();
            let body = tokio::spawn(async move { executor.run(request, cancel).await });

            match body.await {
                Ok(outcome) => {
                    tracing::debug!(job_id = %job_id, status = %outcome.status(), "Supervised job finished");
                }
                Err(e) => {
                    let message = format!("internal error: {}", describe_join_error(e));
                    tracing::error!(job_id = %job_id, error = %message, "Job executor terminated abnormally");
                    mark_failed(store.as_ref(), &job_id, &message).await;
                }
            }
        }))
    }

    /// Jobs spawned and not yet finished (running or waiting for a slot).
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Stop accepting jobs, cancel running workers, and wait up to `grace`
    /// for every supervised task to record its final status. Returns `true`
    /// if everything drained in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.shutdown.cancel();
        self.tasks.close();
        let drained = tokio::time::timeout(grace, self.tasks.wait()).await.is_ok();

        if drained {
            tracing::info!("Job supervisor drained");
        } else {
            tracing::warn!(remaining = self.in_flight.len(), "Job supervisor shutdown grace period elapsed");
        }
        drained
    }
}

async fn mark_failed(store: &dyn StatusStore, job_id: &str, message: &str) {
    if let Err(e) = store.update(job_id, JobUpdate::failed(message)).await {
        tracing::warn!(job_id = %job_id, error = %e, "Failed to record job failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStatusStore;
    use crate::testing::StubWorker;
    use clipper_types::{JobKind, JobParams, JobStatus};
    use pretty_assertions::assert_eq;

    struct Harness {
        store: Arc<InMemoryStatusStore>,
        worker: Arc<StubWorker>,
        supervisor: JobSupervisor,
    }

    fn harness(worker: StubWorker, max_concurrent: usize, deadline: Duration) -> Harness {
        let store = Arc::new(InMemoryStatusStore::new());
        let worker = Arc::new(worker);
        let executor = Arc::new(TaskExecutor::new(store.clone(), worker.clone(), deadline));
        let supervisor = JobSupervisor::new(executor, store.clone(), max_concurrent, CancellationToken::new());
        Harness {
            store,
            worker,
            supervisor,
        }
    }

    async fn new_request(store: &InMemoryStatusStore) -> WorkerRequest {
        let id = store
            .create(JobKind::FullRetrieval, JobParams::full("https://example.com/v"))
            .await
            .unwrap();
        WorkerRequest {
            job_id: id,
            url: "https://example.com/v".into(),
            range: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling_keeps_excess_pending() {
        let h = harness(
            StubWorker::succeeding(None).with_delay(Duration::from_secs(10)),
            2,
            Duration::from_secs(60),
        );
        let mut ids = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let request = new_request(&h.store).await;
            ids.push(request.job_id.clone());
            handles.push(h.supervisor.spawn(request).unwrap());
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.worker.invocations(), 2);
        assert_eq!(h.supervisor.in_flight(), 3);
        let waiting = h.store.get(&ids[2]).await.unwrap();
        assert_eq!(waiting.status, JobStatus::Pending);

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(h.worker.invocations(), 3);
        assert_eq!(h.supervisor.in_flight(), 0);
        for id in &ids {
            assert_eq!(h.store.get(id).await.unwrap().status, JobStatus::Completed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_spawn_rejected_while_running() {
        let h = harness(
            StubWorker::succeeding(None).with_delay(Duration::from_secs(5)),
            4,
            Duration::from_secs(60),
        );
        let request = new_request(&h.store).await;
        let id = request.job_id.clone();

        let handle = h.supervisor.spawn(request.clone()).unwrap();
        assert_eq!(h.supervisor.in_flight(), 1);
        assert_eq!(
            h.supervisor.spawn(request).unwrap_err(),
            SpawnError::AlreadyRunning(id.clone())
        );

        handle.await.unwrap();
        assert_eq!(h.supervisor.in_flight(), 0);
        assert_eq!(h.worker.invocations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_does_not_affect_others() {
        let store = Arc::new(InMemoryStatusStore::new());
        let ok_worker = Arc::new(StubWorker::succeeding(None));
        let bad_worker = Arc::new(StubWorker::panicking("worker exploded"));
        let shutdown = CancellationToken::new();
        let ok = JobSupervisor::new(
            Arc::new(TaskExecutor::new(store.clone(), ok_worker, Duration::from_secs(60))),
            store.clone(),
            1,
            shutdown.clone(),
        );
        let bad = JobSupervisor::new(
            Arc::new(TaskExecutor::new(store.clone(), bad_worker, Duration::from_secs(60))),
            store.clone(),
            1,
            shutdown,
        );

        let bad_req = new_request(&store).await;
        let ok_req = new_request(&store).await;
        let (bad_id, ok_id) = (bad_req.job_id.clone(), ok_req.job_id.clone());

        bad.spawn(bad_req).unwrap().await.unwrap();
        ok.spawn(ok_req).unwrap().await.unwrap();

        let failed = store.get(&bad_id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.message.as_deref(), Some("panic: worker exploded"));
        assert_eq!(store.get(&ok_id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_fails_running_and_waiting_jobs() {
        let h = harness(
            StubWorker::succeeding(None).with_delay(Duration::from_secs(600)),
            1,
            Duration::from_secs(3600),
        );
        let running = new_request(&h.store).await;
        let waiting = new_request(&h.store).await;
        let (running_id, waiting_id) = (running.job_id.clone(), waiting.job_id.clone());
        h.supervisor.spawn(running).unwrap();
        h.supervisor.spawn(waiting).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.supervisor.shutdown(Duration::from_secs(5)).await);
        assert_eq!(h.supervisor.in_flight(), 0);

        for id in [&running_id, &waiting_id] {
            let record = h.store.get(id).await.unwrap();
            assert_eq!(record.status, JobStatus::Failed);
            assert_eq!(record.message.as_deref(), Some(SHUTDOWN_MESSAGE));
        }
        assert_eq!(h.worker.completions(), 0);

        let late = new_request(&h.store).await;
        assert_eq!(h.supervisor.spawn(late).unwrap_err(), SpawnError::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reports_tasks_that_miss_the_grace_period() {
        struct StuckOnFailure(InMemoryStatusStore);

        #[async_trait::async_trait]
        impl StatusStore for StuckOnFailure {
            async fn create(&self, kind: JobKind, params: JobParams) -> Result<JobId, crate::store::StoreError> {
                self.0.create(kind, params).await
            }
            async fn update(&self, id: &str, update: JobUpdate) -> Result<(), crate::store::StoreError> {
                if update.status == JobStatus::Failed {
                    std::future::pending::<()>().await;
                }
                self.0.update(id, update).await
            }
            async fn get(&self, id: &str) -> Result<clipper_types::JobRecord, crate::store::StoreError> {
                self.0.get(id).await
            }
        }

        let store = Arc::new(StuckOnFailure(InMemoryStatusStore::new()));
        let worker = Arc::new(StubWorker::succeeding(None).with_delay(Duration::from_secs(600)));
        let executor = Arc::new(TaskExecutor::new(store.clone(), worker, Duration::from_secs(3600)));
        let supervisor = JobSupervisor::new(executor, store.clone(), 1, CancellationToken::new());

        let id = store
            .create(JobKind::FullRetrieval, JobParams::full("https://example.com/v"))
            .await
            .unwrap();
        supervisor
            .spawn(WorkerRequest {
                job_id: id,
                url: "https://example.com/v".into(),
                range: None,
            })
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!supervisor.shutdown(Duration::from_secs(5)).await);
        assert_eq!(supervisor.in_flight(), 1);
    }
}
