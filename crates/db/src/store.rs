// crates/db/src/store.rs
//! `StatusStore` backed by the `jobs` table.

use async_trait::async_trait;
use clipper_core::store::{new_job_id, StatusStore, StoreError};
use clipper_types::{JobId, JobKind, JobParams, JobRecord, JobUpdate};

use crate::queries::jobs::Transition;
use crate::{Database, DbError};

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl StatusStore for Database {
    async fn create(&self, kind: JobKind, params: JobParams) -> Result<JobId, StoreError> {
        let record = JobRecord::pending(new_job_id(), kind, params);
        self.insert_job(&record).await?;
        Ok(record.id)
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<(), StoreError> {
        match self.transition_job(id, &update).await? {
            Transition::Applied => Ok(()),
            Transition::Missing => Err(StoreError::NotFound(id.to_string())),
            Transition::Rejected { current } => Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: current,
                to: update.status,
            }),
        }
    }

    async fn get(&self, id: &str) -> Result<JobRecord, StoreError> {
        self.get_job(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
