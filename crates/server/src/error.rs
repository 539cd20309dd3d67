// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clipper_core::{NotifierError, SubmitError, ValidationError};
use clipper_types::ErrorCode;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../frontend/src/types/generated/"))]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            error: code.default_message().to_string(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(code)
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Notifier(#[from] NotifierError),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Rate limit exceeded for {0}")]
    RateLimited(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Submit(e) => e.code(),
            ApiError::Notifier(e) => e.code(),
            ApiError::InvalidBody(_) => ErrorCode::InvalidRequest,
            ApiError::RateLimited(_) => ErrorCode::TooManyRequests,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let body = match &self {
            ApiError::Submit(SubmitError::Validation(ValidationError::EmptyUrl)) => {
                tracing::warn!("Submission without url");
                ErrorResponse::new(code)
            }
            ApiError::Submit(SubmitError::Validation(e)) => {
                tracing::warn!(error = %e, "Submission rejected");
                ErrorResponse::with_details(code, e.to_string())
            }
            ApiError::Submit(SubmitError::Launch(msg)) => {
                tracing::error!(message = %msg, "Failed to start job");
                ErrorResponse::with_details(code, msg.clone())
            }
            ApiError::Notifier(NotifierError::NotFound(id)) => {
                tracing::debug!(job_id = %id, "Job not found");
                ErrorResponse::with_details(code, format!("Job ID: {}", id))
            }
            ApiError::Notifier(NotifierError::MissingId) => ErrorResponse::new(code),
            ApiError::Notifier(NotifierError::Unavailable(msg)) => {
                tracing::error!(message = %msg, "Internal server error");
                // Store failures are not exposed to clients.
                ErrorResponse::new(code)
            }
            ApiError::InvalidBody(msg) => {
                tracing::warn!(message = %msg, "Bad request body");
                ErrorResponse::with_details(code, msg.clone())
            }
            ApiError::RateLimited(client) => {
                tracing::warn!(client = %client, "Rate limit exceeded");
                ErrorResponse::new(code)
            }
        };

        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    /// Helper to extract status code and body from a response
    async fn extract_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_empty_url_returns_400002() {
        let error = ApiError::Submit(ValidationError::EmptyUrl.into());
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, 400002);
        assert_eq!(body.error, "url is required");
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn test_bad_range_returns_400004_with_details() {
        let error = ApiError::Submit(ValidationError::EndNotAfterStart { start: 40, end: 30 }.into());
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, 400004);
        assert!(body.details.unwrap().contains("40"));
    }

    #[tokio::test]
    async fn test_launch_failure_returns_500001() {
        let error = ApiError::Submit(SubmitError::Launch("service shutting down".into()));
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, 500001);
        assert_eq!(body.details.as_deref(), Some("service shutting down"));
    }

    #[tokio::test]
    async fn test_not_found_returns_404() {
        let error = ApiError::Notifier(NotifierError::NotFound("abc123".into()));
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, 404001);
        assert!(body.details.unwrap().contains("abc123"));
    }

    #[tokio::test]
    async fn test_store_failure_hides_details() {
        let error = ApiError::Notifier(NotifierError::Unavailable("disk I/O error".into()));
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, 500004);
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_returns_429() {
        let error = ApiError::RateLimited("10.0.0.1".into());
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.code, 429001);
        assert_eq!(body.error, "too many requests, please try again later");
    }

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_string(&ErrorResponse::new(ErrorCode::JobIdRequired)).unwrap();
        assert!(json.contains("\"code\":400003"));
        assert!(!json.contains("details"));

        let json =
            serde_json::to_string(&ErrorResponse::with_details(ErrorCode::InvalidRequest, "More info"))
                .unwrap();
        assert!(json.contains("\"details\":\"More info\""));
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::InvalidBody("missing field `url`".into());
        assert_eq!(err.to_string(), "Invalid request body: missing field `url`");

        let err = ApiError::RateLimited("10.0.0.1".into());
        assert_eq!(err.to_string(), "Rate limit exceeded for 10.0.0.1");
    }
}
