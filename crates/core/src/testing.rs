// crates/core/src/testing.rs
//! Test doubles for the engine's collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clipper_types::{JobId, JobKind, JobParams, JobRecord, JobUpdate};

use crate::store::{StatusStore, StoreError};
use crate::worker::{Worker, WorkerError, WorkerOutput, WorkerRequest};

#[derive(Debug, Clone)]
pub enum StubBehavior {
    Succeed(Option<String>),
    Fail(String),
    Panic(String),
}

/// Worker that sleeps for a fixed delay, then does what it was told.
pub struct StubWorker {
    delay: Duration,
    behavior: StubBehavior,
    invocations: AtomicUsize,
    completions: AtomicUsize,
}

impl StubWorker {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            delay: Duration::ZERO,
            behavior,
            invocations: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(output_location: Option<&str>) -> Self {
        Self::new(StubBehavior::Succeed(output_location.map(str::to_string)))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(StubBehavior::Fail(message.to_string()))
    }

    pub fn panicking(message: &str) -> Self {
        Self::new(StubBehavior::Panic(message.to_string()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Calls to `invoke` that started.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Calls to `invoke` that ran past their delay (were not aborted).
    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for StubWorker {
    async fn invoke(&self, _request: &WorkerRequest) -> Result<WorkerOutput, WorkerError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completions.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            StubBehavior::Succeed(output_location) => Ok(WorkerOutput {
                output_location: output_location.clone(),
            }),
            StubBehavior::Fail(message) => Err(WorkerError::Failed(message.clone())),
            StubBehavior::Panic(message) => panic!("{}", message),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Store whose every operation reports it is unavailable.
pub struct FailingStore;

#[async_trait]
impl StatusStore for FailingStore {
    async fn create(&self, _kind: JobKind, _params: JobParams) -> Result<JobId, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn update(&self, _id: &str, _update: JobUpdate) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn get(&self, _id: &str) -> Result<JobRecord, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
