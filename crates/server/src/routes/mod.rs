//! API route handlers for the clipper server.

pub mod health;
pub mod metrics;
pub mod video;

use std::sync::Arc;

use axum::{middleware, Router};

use crate::middleware::rate_limit;
use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - POST /api/v1/video/download - Submit a full retrieval job
/// - POST /api/v1/video/download/time-range - Submit a clip job
/// - GET  /api/v1/video/download/{id} - Job status snapshot
/// - GET  /api/v1/video/download/time-range/{id} - Job status snapshot
/// - GET  /api/v1/video/download/{id}/stream - SSE status stream
/// - GET  /api/health - Health check
/// - GET  /metrics - Prometheus metrics
///
/// Only the `/api/v1` routes pass through the per-client rate limiter.
pub fn api_routes(state: Arc<AppState>) -> Router {
    let limited = Router::new()
        .nest("/api/v1", video::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(limited)
        .nest("/api", health::router())
        .merge(metrics::router())
        .with_state(state)
}
