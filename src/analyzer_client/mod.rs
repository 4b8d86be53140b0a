//! AnalyzerClient - Frame Analyzer Communication Adapter
//!
//! ## Responsibilities
//!
//! - Send per-frame pose inference requests to the analyzer service
//! - Send sampled score-region recognition requests
//! - Handle response parsing and connection management
//!
//! The pose endpoint runs in video mode: it is stateful and expects
//! strictly increasing timestamps per stream. Callers must derive
//! timestamps from a monotonic clock relative to stream start and must
//! not issue concurrent pose calls for the same stream.

use crate::error::{Error, Result};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Landmark index of the nose keypoint
pub const KP_NOSE: usize = 0;
/// Landmark index of the left wrist keypoint
pub const KP_LEFT_WRIST: usize = 15;
/// Landmark index of the right wrist keypoint
pub const KP_RIGHT_WRIST: usize = 16;

/// Skeleton segments drawn over annotated frames (landmark index pairs)
pub const POSE_CONNECTIONS: [(usize, usize); 12] = [
    (11, 12),
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
    (11, 23),
    (12, 24),
    (23, 24),
    (23, 25),
    (25, 27),
    (24, 26),
    (26, 28),
];

/// A single pose landmark, coordinates normalized to [0, 1]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub visibility: f32,
}

/// One detected pose: 33 landmarks in MediaPipe order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseDetection {
    pub keypoints: Vec<Keypoint>,
}

impl PoseDetection {
    /// Coarse "event" heuristic: either wrist above the nose.
    ///
    /// Normalized y grows downward, so a smaller y is higher in frame.
    /// This is a hook point, not a ground-truth verdict.
    pub fn event_detected(&self) -> bool {
        let Some(nose) = self.keypoints.get(KP_NOSE) else {
            return false;
        };
        let above = |idx: usize| {
            self.keypoints
                .get(idx)
                .map(|kp| kp.y < nose.y)
                .unwrap_or(false)
        };
        above(KP_LEFT_WRIST) || above(KP_RIGHT_WRIST)
    }
}

/// Response from the pose endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseResponse {
    #[serde(default)]
    pub poses: Vec<PoseDetection>,
}

/// Response from the score-region recognition endpoint
#[derive(Debug, Clone, Deserialize)]
struct ScoreResponse {
    #[serde(default)]
    score: Option<String>,
}

/// Frame analyzer client
pub struct AnalyzerClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnalyzerClient {
    /// Create a new analyzer client
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    /// Create a new analyzer client with a custom timeout
    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    /// Check analyzer health
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Run pose inference on one frame.
    ///
    /// `timestamp_ms` is milliseconds since stream start and must be
    /// strictly increasing across calls for the same stream.
    pub async fn detect_pose(&self, jpeg: Vec<u8>, timestamp_ms: i64) -> Result<PoseResponse> {
        let url = format!("{}/v1/pose", self.base_url);

        let form = Form::new()
            .part(
                "frame",
                Part::bytes(jpeg)
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")?,
            )
            .text("timestamp_ms", timestamp_ms.to_string());

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Analyzer(format!("pose request: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::Analyzer(format!(
                "pose inference failed: {}",
                resp.status()
            )));
        }

        let result: PoseResponse = resp
            .json()
            .await
            .map_err(|e| Error::Analyzer(format!("pose response: {}", e)))?;
        Ok(result)
    }

    /// Recognize the score region of one frame. Sampled, not per-frame.
    pub async fn read_score(&self, jpeg: Vec<u8>) -> Result<Option<String>> {
        let url = format!("{}/v1/score", self.base_url);

        let form = Form::new().part(
            "frame",
            Part::bytes(jpeg)
                .file_name("frame.jpg")
                .mime_str("image/jpeg")?,
        );

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Analyzer(format!("score request: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::Analyzer(format!(
                "score recognition failed: {}",
                resp.status()
            )));
        }

        let result: ScoreResponse = resp
            .json()
            .await
            .map_err(|e| Error::Analyzer(format!("score response: {}", e)))?;
        Ok(result.score.filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose_with(nose_y: f32, left_wrist_y: f32, right_wrist_y: f32) -> PoseDetection {
        let mut keypoints = vec![
            Keypoint {
                x: 0.5,
                y: 0.5,
                visibility: 1.0
            };
            33
        ];
        keypoints[KP_NOSE].y = nose_y;
        keypoints[KP_LEFT_WRIST].y = left_wrist_y;
        keypoints[KP_RIGHT_WRIST].y = right_wrist_y;
        PoseDetection { keypoints }
    }

    #[test]
    fn test_event_detected_when_wrist_above_nose() {
        assert!(pose_with(0.3, 0.2, 0.8).event_detected());
        assert!(pose_with(0.3, 0.8, 0.1).event_detected());
    }

    #[test]
    fn test_no_event_when_wrists_below_nose() {
        assert!(!pose_with(0.2, 0.6, 0.7).event_detected());
    }

    #[test]
    fn test_no_event_on_short_keypoint_set() {
        let pose = PoseDetection { keypoints: vec![] };
        assert!(!pose.event_detected());
    }

    #[test]
    fn test_pose_response_tolerates_missing_poses() {
        let resp: PoseResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.poses.is_empty());
    }
}
