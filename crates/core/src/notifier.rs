// crates/core/src/notifier.rs
//! Status notifier: point reads and a polling status stream.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use clipper_types::{ErrorCode, JobId, StatusSnapshot};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_stream::Stream;

use crate::config::NotifierConfig;
use crate::store::{StatusStore, StoreError};

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("job id is required")]
    MissingId,

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("status store unavailable: {0}")]
    Unavailable(String),
}

impl NotifierError {
    pub fn code(&self) -> ErrorCode {
        match self {
            NotifierError::MissingId => ErrorCode::JobIdRequired,
            NotifierError::NotFound(_) => ErrorCode::JobNotFound,
            NotifierError::Unavailable(_) => ErrorCode::Internal,
        }
    }
}

impl From<StoreError> for NotifierError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => NotifierError::NotFound(id),
            other => NotifierError::Unavailable(other.to_string()),
        }
    }
}

/// One item of a status stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Snapshot(StatusSnapshot),
    /// Terminal: the id is unknown.
    NotFound(JobId),
    /// Transient read failure; polling continues.
    Unavailable(String),
}

impl StatusEvent {
    pub fn is_terminal(&self) -> bool {
        match self {
            StatusEvent::Snapshot(s) => s.status.is_terminal(),
            StatusEvent::NotFound(_) => true,
            StatusEvent::Unavailable(_) => false,
        }
    }
}

#[derive(Clone)]
pub struct StatusNotifier {
    store: Arc<dyn StatusStore>,
    poll_interval: Duration,
}

impl StatusNotifier {
    pub fn new(store: Arc<dyn StatusStore>, config: &NotifierConfig) -> Self {
        Self {
            store,
            poll_interval: config.poll_interval,
        }
    }

    pub async fn get_status(&self, job_id: &str) -> Result<StatusSnapshot, NotifierError> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(NotifierError::MissingId);
        }
        let record = self.store.get(job_id).await?;
        Ok(record.snapshot())
    }

    /// Poll the job every tick and yield one event per tick, starting
    /// immediately. The stream ends after the first terminal snapshot or a
    /// not-found. Dropping the stream stops polling; the job is unaffected.
    pub fn stream_status(&self, job_id: JobId) -> impl Stream<Item = StatusEvent> + Send + 'static {
        let store = Arc::clone(&self.store);
        let period = self.poll_interval.max(Duration::from_millis(1));

        stream! {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let event = match store.get(&job_id).await {
                    Ok(record) => StatusEvent::Snapshot(record.snapshot()),
                    Err(StoreError::NotFound(id)) => StatusEvent::NotFound(id),
                    Err(e) => {
                        tracing::warn!(job_id = %job_id, error = %e, "Status poll failed");
                        StatusEvent::Unavailable(e.to_string())
                    }
                };

                let done = event.is_terminal();
                yield event;
                if done {
                    tracing::debug!(job_id = %job_id, "Status stream finished");
                    break;
                }
            }
        }
    }
}
