// crates/server/src/routes/video.rs
//! Clip job routes.
//!
//! - POST /video/download - Retrieve a whole resource
//! - POST /video/download/time-range - Retrieve a clip between two offsets
//! - GET /video/download/{id} - Current status snapshot
//! - GET /video/download/time-range/{id} - Same lookup, kept for existing clients
//! - GET /video/download/{id}/stream - SSE status stream until the job ends

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use clipper_core::{JobSubmission, StatusEvent};
use clipper_types::{ErrorCode, JobId, StatusSnapshot};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use ts_rs::TS;

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::metrics::RequestTimer;
use crate::state::AppState;

const ACCEPTED_MESSAGE: &str = "Download started successfully";

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct TimeRangeRequest {
    #[serde(default)]
    pub url: String,
    pub start_time: i64,
    pub end_time: i64,
}

/// Body of a 202 response to a submission.
#[derive(Debug, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../frontend/src/types/generated/"))]
pub struct JobAccepted {
    pub job_id: JobId,
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub end_time: Option<i64>,
}

impl JobAccepted {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: "processing".to_string(),
            message: ACCEPTED_MESSAGE.to_string(),
            start_time: None,
            end_time: None,
        }
    }
}

async fn submit(
    state: &AppState,
    endpoint: &'static str,
    submission: JobSubmission,
) -> ApiResult<JobId> {
    let timer = RequestTimer::new(endpoint);
    let result = state.launcher.submit(submission).await.map_err(ApiError::from);
    let status = match &result {
        Ok(_) => StatusCode::ACCEPTED.as_u16(),
        Err(e) => e.code().http_status(),
    };
    timer.finish(status);
    result
}

/// POST /api/v1/video/download
async fn start_download(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let job_id = submit(&state, "submit_full", JobSubmission::Full { url: req.url }).await?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted::new(job_id))))
}

/// POST /api/v1/video/download/time-range
async fn start_time_range_download(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TimeRangeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let submission = JobSubmission::Range {
        url: req.url,
        start_secs: req.start_time,
        end_secs: req.end_time,
    };
    let job_id = submit(&state, "submit_range", submission).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            start_time: Some(req.start_time),
            end_time: Some(req.end_time),
            ..JobAccepted::new(job_id)
        }),
    ))
}

/// GET /api/v1/video/download/{id}
async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<StatusSnapshot>> {
    let snapshot = state.notifier.get_status(&job_id).await?;
    Ok(Json(snapshot))
}

/// Logs when the SSE response is dropped, whether the job finished or the
/// client went away.
struct StreamClosed {
    job_id: JobId,
}

impl Drop for StreamClosed {
    fn drop(&mut self) {
        tracing::debug!(job_id = %self.job_id, "Status stream closed");
    }
}

fn status_event(event: &StatusEvent) -> Event {
    match event {
        StatusEvent::Snapshot(snapshot) => {
            let json = serde_json::to_string(snapshot).unwrap_or_default();
            Event::default().event("status").data(json)
        }
        StatusEvent::NotFound(id) => {
            let body = ErrorResponse::with_details(ErrorCode::JobNotFound, format!("Job ID: {}", id));
            let json = serde_json::to_string(&body).unwrap_or_default();
            Event::default().event("error").data(json)
        }
        StatusEvent::Unavailable(_) => {
            let json = serde_json::to_string(&ErrorResponse::new(ErrorCode::Internal)).unwrap_or_default();
            Event::default().event("error").data(json)
        }
    }
}

/// GET /api/v1/video/download/{id}/stream
///
/// Emits one `status` event per poll and closes after the terminal one. An
/// unknown id produces a single `error` event. Transient store failures are
/// reported as `error` events without ending the stream.
async fn stream_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let job_id = job_id.trim().to_string();
    let events = state.notifier.stream_status(job_id.clone());
    tracing::debug!(job_id = %job_id, "Status stream opened");

    let stream = async_stream::stream! {
        let _closed = StreamClosed { job_id };
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            yield Ok(status_event(&event));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Build the video router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/video/download", post(start_download))
        .route("/video/download/time-range", post(start_time_range_download))
        .route("/video/download/time-range/{id}", get(get_status))
        .route("/video/download/{id}", get(get_status))
        .route("/video/download/{id}/stream", get(stream_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipper_types::JobStatus;

    #[test]
    fn test_router_creation() {
        let _router = router();
    }

    #[test]
    fn test_accepted_body_omits_range_for_full_jobs() {
        let json = serde_json::to_string(&JobAccepted::new("abc".into())).unwrap();
        assert!(json.contains("\"status\":\"processing\""));
        assert!(json.contains("\"message\":\"Download started successfully\""));
        assert!(!json.contains("start_time"));
    }

    #[test]
    fn test_status_event_for_snapshot() {
        let event = StatusEvent::Snapshot(StatusSnapshot {
            job_id: "abc".into(),
            status: JobStatus::Completed,
            message: None,
            output_location: Some("videos/a.mp4".into()),
        });
        // Event has no public accessors; rendering must not panic.
        let _ = status_event(&event);
        let _ = status_event(&StatusEvent::NotFound("abc".into()));
        let _ = status_event(&StatusEvent::Unavailable("locked".into()));
    }
}
