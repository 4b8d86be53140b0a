//! Shared API data models

use serde::{Deserialize, Serialize};

/// Response to `POST /api/trigger_review`
#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerReviewResponse {
    /// "Review Started" or "Buffer Empty"
    pub status: String,
    /// Clip path, present only when a review started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<String>,
}

/// Response to `POST /api/toggle_vision`
#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleVisionResponse {
    /// "ON" or "OFF"
    pub status: String,
    pub enabled: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub analyzer_connected: bool,
    pub verdict_connected: bool,
    pub buffered_frames: usize,
    pub viewers: u64,
}
