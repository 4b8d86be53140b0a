//! ReviewDispatcher - On-Demand Clip Review
//!
//! ## Responsibilities
//!
//! - Snapshot the rolling DVR into a durable clip on trigger
//! - Schedule the asynchronous review job and return immediately
//! - Fan the eventual verdict (or failure status) out to all viewers
//! - Delete the clip after the verdict service is done with it
//!
//! Triggers may overlap; each review's clip and result are independent.

use crate::dvr::{Clip, ClipWriter};
use crate::error::{Error, Result};
use crate::realtime_hub::{HubEvent, RealtimeHub};
use crate::session::StreamSession;
use crate::task_registry::TaskRegistry;
use crate::verdict_client::VerdictClient;
use std::path::PathBuf;
use std::sync::Arc;

/// Minimum buffered frames before a review can start
pub const MIN_REVIEW_FRAMES: usize = 10;

/// Status line pushed to viewers while the review runs
const STATUS_CHECKING: &str = "VAR CHECKING...";
/// Status line pushed to viewers when the review fails
const STATUS_FAILED: &str = "REVIEW FAILED";

/// Outcome of a trigger request
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// Review accepted; the clip is on disk and the job is scheduled
    Accepted { clip_path: PathBuf },
    /// Not enough frames buffered; no side effects
    BufferEmpty { buffered: usize },
}

/// ReviewDispatcher instance
pub struct ReviewDispatcher {
    session: Arc<StreamSession>,
    clips: Arc<ClipWriter>,
    verdict: Arc<VerdictClient>,
    hub: Arc<RealtimeHub>,
    tasks: Arc<TaskRegistry>,
    min_frames: usize,
}

impl ReviewDispatcher {
    /// Create a new dispatcher
    pub fn new(
        session: Arc<StreamSession>,
        clips: Arc<ClipWriter>,
        verdict: Arc<VerdictClient>,
        hub: Arc<RealtimeHub>,
        tasks: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            session,
            clips,
            verdict,
            hub,
            tasks,
            min_frames: MIN_REVIEW_FRAMES,
        }
    }

    /// Override the minimum frame count (tests)
    pub fn with_min_frames(mut self, min_frames: usize) -> Self {
        self.min_frames = min_frames;
        self
    }

    /// Trigger a review.
    ///
    /// Returns as soon as the clip is on disk and the job is scheduled;
    /// the verdict arrives later through the hub.
    pub async fn trigger(&self) -> Result<TriggerOutcome> {
        let buffered = self.session.dvr.len().await;
        tracing::info!(buffered, "Review requested");

        if buffered < self.min_frames {
            return Ok(TriggerOutcome::BufferEmpty { buffered });
        }

        let frames = self.session.dvr.snapshot().await;
        let clip = self.clips.write_clip(&frames).await?;
        let clip_path = clip.path.clone();

        let verdict = self.verdict.clone();
        let hub = self.hub.clone();
        self.tasks
            .spawn(async move {
                run_review_job(clip, verdict, hub).await;
            })
            .await;

        Ok(TriggerOutcome::Accepted { clip_path })
    }
}

/// The asynchronous review job: pending status, verdict service round
/// trip, fan-out, cleanup. Never returns an error; every failure ends as
/// a status broadcast.
pub async fn run_review_job(clip: Clip, verdict: Arc<VerdictClient>, hub: Arc<RealtimeHub>) {
    tracing::info!(clip = %clip.path.display(), frames = clip.frame_count, "Reviewing clip");

    hub.broadcast(HubEvent::ScoreUpdate(STATUS_CHECKING.to_string()))
        .await;

    match verdict.review_clip(&clip.path).await {
        Ok(verdict) => match serde_json::to_string(&verdict) {
            Ok(json) => {
                tracing::info!(verdict = %json, "Verdict received");
                hub.broadcast(HubEvent::Verdict(json)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Verdict serialization failed");
                hub.broadcast(HubEvent::ScoreUpdate(STATUS_FAILED.to_string()))
                    .await;
            }
        },
        Err(e) => {
            match &e {
                Error::ServiceTimeout(_) => tracing::error!(error = %e, "Verdict service timed out"),
                _ => tracing::error!(error = %e, "Review failed"),
            }
            hub.broadcast(HubEvent::ScoreUpdate(STATUS_FAILED.to_string()))
                .await;
        }
    }

    // Clip cleanup happens on success and failure alike
    clip.delete().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;
    use chrono::Utc;
    use std::time::Duration;

    fn frame(ts: i64) -> Frame {
        Frame {
            width: 8,
            height: 8,
            pixels: vec![50; 8 * 8 * 3],
            timestamp_ms: ts,
        }
    }

    fn unreachable_verdict() -> Arc<VerdictClient> {
        Arc::new(
            VerdictClient::new("http://127.0.0.1:1".to_string())
                .with_poll_bound(Duration::from_millis(1), 2),
        )
    }

    async fn dispatcher(scratch: PathBuf) -> (ReviewDispatcher, Arc<StreamSession>) {
        let session = Arc::new(StreamSession::new(50));
        let dispatcher = ReviewDispatcher::new(
            session.clone(),
            Arc::new(ClipWriter::new(scratch).await.unwrap()),
            unreachable_verdict(),
            Arc::new(RealtimeHub::new()),
            Arc::new(TaskRegistry::new()),
        );
        (dispatcher, session)
    }

    #[tokio::test]
    async fn test_trigger_below_minimum_is_buffer_empty_with_no_clip() {
        let dir = tempfile::tempdir().unwrap();
        let (dispatcher, session) = dispatcher(dir.path().to_path_buf()).await;

        for i in 0..(MIN_REVIEW_FRAMES - 1) {
            session.dvr.push(frame(i as i64)).await;
        }

        let outcome = dispatcher.trigger().await.unwrap();
        assert!(matches!(
            outcome,
            TriggerOutcome::BufferEmpty { buffered } if buffered == MIN_REVIEW_FRAMES - 1
        ));

        // No clip was created
        let clips = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".mp4")
            })
            .count();
        assert_eq!(clips, 0);
    }

    #[tokio::test]
    async fn test_trigger_at_minimum_writes_one_clip_and_job_cleans_it_up() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(StreamSession::new(50));
        let tasks = Arc::new(TaskRegistry::new());
        let dispatcher = ReviewDispatcher::new(
            session.clone(),
            Arc::new(ClipWriter::new(dir.path().to_path_buf()).await.unwrap()),
            unreachable_verdict(),
            Arc::new(RealtimeHub::new()),
            tasks.clone(),
        )
        .with_min_frames(3);

        for i in 0..3 {
            session.dvr.push(frame(i)).await;
        }

        let clip_path = match dispatcher.trigger().await {
            Ok(TriggerOutcome::Accepted { clip_path }) => clip_path,
            // Muxing needs ffmpeg on PATH; without it there is nothing to assert
            Err(Error::Clip(_)) => return,
            other => panic!("unexpected trigger outcome: {:?}", other),
        };
        assert!(clip_path.exists());

        let clips = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".mp4")
            })
            .count();
        assert_eq!(clips, 1);

        // The job fails fast against the unreachable service and must still
        // remove the clip it was handed
        tasks.shutdown(Duration::from_secs(5)).await;
        assert!(!clip_path.exists());
    }

    #[tokio::test]
    async fn test_failed_review_broadcasts_status_and_deletes_clip() {
        let dir = tempfile::tempdir().unwrap();
        let clip_path = dir.path().join("clip_42.mp4");
        tokio::fs::write(&clip_path, b"fake clip").await.unwrap();

        let clip = Clip {
            path: clip_path.clone(),
            frame_count: 12,
            created_at: Utc::now(),
        };

        let hub = Arc::new(RealtimeHub::new());
        let (_id, mut rx) = hub.register().await;

        run_review_job(clip, unreachable_verdict(), hub).await;

        // Pending status first, then the failure status
        assert!(rx.recv().await.unwrap().contains("VAR CHECKING"));
        assert!(rx.recv().await.unwrap().contains("REVIEW FAILED"));

        // Clip removed even though the service was unreachable
        assert!(!clip_path.exists());
    }
}
