// crates/core/src/store.rs
//! Status store: the single owner of job records.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use clipper_types::{JobId, JobKind, JobParams, JobRecord, JobStatus, JobUpdate};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("invalid status transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("status store unavailable: {0}")]
    Unavailable(String),
}

/// Durable record of job state.
///
/// Implementations must be safe for concurrent point reads and writes keyed
/// by id, and must refuse any update that is not a legal status transition
/// from the record's current status.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Persist a new `Pending` job and return its freshly assigned id.
    async fn create(&self, kind: JobKind, params: JobParams) -> Result<JobId, StoreError>;

    async fn update(&self, id: &str, update: JobUpdate) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<JobRecord, StoreError>;
}

pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4().to_string()
}

/// Process-local store. Records are lost on restart.
#[derive(Default)]
pub struct InMemoryStatusStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn create(&self, kind: JobKind, params: JobParams) -> Result<JobId, StoreError> {
        let id = new_job_id();
        let record = JobRecord::pending(id.clone(), kind, params);
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), record);
        Ok(id)
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !record.status.can_transition_to(update.status) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: record.status,
                to: update.status,
            });
        }

        record.status = update.status;
        record.message = update.message;
        record.output_location = update.output_location;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<JobRecord, StoreError> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
