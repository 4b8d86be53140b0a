//! VerdictClient - Verdict Service Communication Adapter
//!
//! ## Responsibilities
//!
//! - Upload review clips to the verdict service
//! - Poll remote processing state until the clip is ready
//! - Request the structured rules-violation judgment
//! - Best-effort cleanup of the uploaded artifact
//!
//! The remote processing flag is polled on a fixed interval with a capped
//! poll count; exhausting the cap surfaces `ServiceTimeout` instead of
//! hanging on a stuck remote job. Verdict payloads may arrive wrapped in
//! markdown fences; they are stripped before a strict typed parse.

use crate::error::{Error, Result};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Remote file processing states
const STATE_PROCESSING: &str = "PROCESSING";
const STATE_FAILED: &str = "FAILED";

/// Final ruling from the verdict model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictKind {
    Foul,
    Clean,
    Violation,
}

/// Structured verdict payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub sport: String,
    pub action_breakdown: String,
    pub rule_violated: String,
    pub verdict: VerdictKind,
    pub explanation: String,
    /// 0-100
    pub confidence: u8,
}

/// Upload acknowledgment from the verdict service
#[derive(Debug, Clone, Deserialize)]
struct UploadResponse {
    id: String,
    state: String,
}

/// Processing state while polling
#[derive(Debug, Clone, Deserialize)]
struct FileStateResponse {
    state: String,
}

/// Review response carrying the (possibly fenced) verdict text
#[derive(Debug, Clone, Deserialize)]
struct ReviewResponse {
    text: String,
}

/// Verdict service client
pub struct VerdictClient {
    client: reqwest::Client,
    base_url: String,
    /// Fixed interval between processing-state polls
    poll_interval: Duration,
    /// Poll cap; exhausting it is a `ServiceTimeout`
    max_polls: u32,
}

impl VerdictClient {
    /// Create a new verdict client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            poll_interval: Duration::from_millis(500),
            max_polls: 120,
        }
    }

    /// Override the polling bound (tests, aggressive deployments)
    pub fn with_poll_bound(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Check verdict service health
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Submit a clip and return the structured verdict.
    ///
    /// Upload, bounded poll, review. The uploaded artifact is deleted
    /// best-effort before returning, on success and failure alike.
    pub async fn review_clip(&self, clip_path: &Path) -> Result<Verdict> {
        let file_id = self.upload(clip_path).await?;

        let outcome = async {
            self.wait_until_ready(&file_id).await?;
            self.request_review(&file_id).await
        }
        .await;

        self.delete_file(&file_id).await;
        outcome
    }

    /// Upload the clip and return the remote file id
    pub async fn upload(&self, clip_path: &Path) -> Result<String> {
        let url = format!("{}/v1/files", self.base_url);
        let data = fs::read(clip_path).await?;
        let file_name = clip_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip.mp4".to_string());

        let form = Form::new().part(
            "file",
            Part::bytes(data)
                .file_name(file_name)
                .mime_str("video/mp4")?,
        );

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("upload: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::ServiceUnavailable(format!(
                "clip upload failed: {}",
                resp.status()
            )));
        }

        let ack: UploadResponse = resp
            .json()
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("upload ack: {}", e)))?;

        if ack.state == STATE_FAILED {
            return Err(Error::ServiceUnavailable(
                "clip rejected at upload".to_string(),
            ));
        }

        Ok(ack.id)
    }

    /// Poll the remote processing flag until READY, FAILED, or the poll
    /// cap is exhausted
    async fn wait_until_ready(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/v1/files/{}", self.base_url, file_id);

        for _ in 0..self.max_polls {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| Error::ServiceUnavailable(format!("state poll: {}", e)))?;

            if !resp.status().is_success() {
                return Err(Error::ServiceUnavailable(format!(
                    "state poll failed: {}",
                    resp.status()
                )));
            }

            let state: FileStateResponse = resp
                .json()
                .await
                .map_err(|e| Error::ServiceUnavailable(format!("state body: {}", e)))?;

            match state.state.as_str() {
                STATE_PROCESSING => tokio::time::sleep(self.poll_interval).await,
                STATE_FAILED => {
                    return Err(Error::ServiceUnavailable(
                        "remote clip processing failed".to_string(),
                    ))
                }
                _ => return Ok(()),
            }
        }

        Err(Error::ServiceTimeout(format!(
            "clip {} still processing after {} polls",
            file_id, self.max_polls
        )))
    }

    /// Ask for the judgment on a ready clip
    async fn request_review(&self, file_id: &str) -> Result<Verdict> {
        let url = format!("{}/v1/review", self.base_url);
        let body = serde_json::json!({ "file_id": file_id });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("review: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::ServiceUnavailable(format!(
                "review request failed: {}",
                resp.status()
            )));
        }

        let review: ReviewResponse = resp
            .json()
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("review body: {}", e)))?;

        parse_verdict(&review.text)
    }

    /// Delete the uploaded artifact. Best-effort; failures are logged only.
    pub async fn delete_file(&self, file_id: &str) {
        let url = format!("{}/v1/files/{}", self.base_url, file_id);
        match self.client.delete(&url).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(file_id = %file_id, status = %resp.status(), "Remote artifact delete refused");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(file_id = %file_id, error = %e, "Remote artifact delete failed");
            }
        }
    }
}

/// Parse a verdict payload, tolerating markdown code fences around the
/// JSON but nothing looser than that
pub fn parse_verdict(raw: &str) -> Result<Verdict> {
    let cleaned = strip_fences(raw);
    let verdict: Verdict = serde_json::from_str(cleaned)
        .map_err(|e| Error::Parse(format!("verdict schema: {}", e)))?;

    if verdict.confidence > 100 {
        return Err(Error::Parse(format!(
            "confidence {} out of range 0-100",
            verdict.confidence
        )));
    }

    Ok(verdict)
}

/// Strip surrounding ``` / ```json fences, if present
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "sport": "Basketball",
        "action_breakdown": "Player A drives to basket, defender makes contact",
        "rule_violated": "NBA Rule 12B - Blocking Foul",
        "verdict": "FOUL",
        "explanation": "Defender was not set before contact.",
        "confidence": 95
    }"#;

    #[test]
    fn test_parse_plain_verdict() {
        let v = parse_verdict(RAW).unwrap();
        assert_eq!(v.verdict, VerdictKind::Foul);
        assert_eq!(v.sport, "Basketball");
        assert_eq!(v.confidence, 95);
    }

    #[test]
    fn test_parse_fenced_verdict() {
        let fenced = format!("```json\n{}\n```", RAW);
        let v = parse_verdict(&fenced).unwrap();
        assert_eq!(v.verdict, VerdictKind::Foul);

        let bare_fence = format!("```\n{}\n```", RAW);
        assert!(parse_verdict(&bare_fence).is_ok());
    }

    #[test]
    fn test_parse_rejects_unknown_verdict_kind() {
        let bad = RAW.replace("FOUL", "MAYBE");
        let err = parse_verdict(&bad).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_out_of_range_confidence() {
        let bad = RAW.replace("95", "150");
        let err = parse_verdict(&bad).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_free_text() {
        let err = parse_verdict("The play looked clean to me.").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_verdict_kind_round_trip() {
        let json = serde_json::to_string(&VerdictKind::Violation).unwrap();
        assert_eq!(json, "\"VIOLATION\"");
    }
}
