//! WebAPI - HTTP Endpoints
//!
//! ## Responsibilities
//!
//! - Control endpoints (trigger review, toggle vision)
//! - WebSocket stream ingest and event fan-out
//! - Health check

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let analyzer_ok = state.analyzer.health_check().await.unwrap_or(false);
    let verdict_ok = state.verdict.health_check().await.unwrap_or(false);

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        analyzer_connected: analyzer_ok,
        verdict_connected: verdict_ok,
        buffered_frames: state.session.dvr.len().await,
        viewers: state.realtime.subscriber_count(),
    };

    Json(response)
}
