//! FramePipeline - Per-Frame Orchestration
//!
//! ## Responsibilities
//!
//! - Decode ingress payloads off the network-receiving path
//! - Write every decoded frame into the rolling DVR
//! - Run pose analysis when the vision toggle is on, overlay the skeleton,
//!   and derive the coarse "event" flag
//! - Run the cheaper score-region scan at its own fixed cadence
//! - Re-encode and hand the result back for fan-out
//!
//! Failure semantics: a malformed payload drops that frame only; an
//! analyzer failure means "no annotation this frame". Neither terminates
//! the stream.

pub mod overlay;

use crate::analyzer_client::AnalyzerClient;
use crate::codec;
use crate::error::{Error, Result};
use crate::session::StreamSession;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task;

/// Run the score-region scan once every this many frames
pub const DEFAULT_SCORE_INTERVAL: u64 = 15;

/// Result of processing one ingress frame
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// Re-encoded (possibly annotated) frame, base64 JPEG
    pub jpeg_base64: String,
    /// Coarse action heuristic fired on this frame
    pub event_detected: bool,
    /// Recognized score text, present only on sampled frames
    pub score: Option<String>,
}

/// FramePipeline instance, one per stream
pub struct FramePipeline {
    session: Arc<StreamSession>,
    analyzer: Arc<AnalyzerClient>,
    /// Video-mode analyzer state is not safe across concurrent calls;
    /// at most one in-flight pose call per stream
    analyzer_gate: Mutex<()>,
    /// Last timestamp handed to the analyzer; it requires strictly
    /// increasing timestamps
    last_analyzed_ms: AtomicI64,
    frame_counter: AtomicU64,
    score_interval: u64,
    annotate: bool,
}

impl FramePipeline {
    /// Create a pipeline bound to a session and analyzer
    pub fn new(session: Arc<StreamSession>, analyzer: Arc<AnalyzerClient>) -> Self {
        Self {
            session,
            analyzer,
            analyzer_gate: Mutex::new(()),
            last_analyzed_ms: AtomicI64::new(-1),
            frame_counter: AtomicU64::new(0),
            score_interval: DEFAULT_SCORE_INTERVAL,
            annotate: true,
        }
    }

    /// Override the score-scan cadence
    pub fn with_score_interval(mut self, interval: u64) -> Self {
        self.score_interval = interval.max(1);
        self
    }

    /// Disable skeleton overlay drawing (event derivation still runs)
    pub fn with_annotation(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Process one ingress frame.
    ///
    /// `payload` is the base64 JPEG with the data-URI marker already
    /// stripped; `timestamp_ms` is milliseconds since stream start.
    /// Returns `Error::Decode` for malformed input; the caller drops the
    /// frame and keeps the stream alive.
    pub async fn ingest(&self, payload: &str, timestamp_ms: i64) -> Result<FrameOutput> {
        let jpeg = codec::decode_base64(payload)?;

        // JPEG decode is CPU-bound; keep it off the cooperative scheduler
        let frame = {
            let jpeg = jpeg.clone();
            task::spawn_blocking(move || codec::decode_jpeg(&jpeg, timestamp_ms))
                .await
                .map_err(|e| Error::Internal(format!("decode task: {}", e)))??
        };

        // DVR write is unconditional, annotated or not
        self.session.dvr.push(frame.clone()).await;

        let seq = self.frame_counter.fetch_add(1, Ordering::Relaxed);

        let mut out_frame = frame;
        let mut event_detected = false;

        if self.session.vision_enabled() {
            let _gate = self.analyzer_gate.lock().await;

            // The analyzer contract forbids duplicate or out-of-order
            // timestamps; skip the call rather than violate it
            if timestamp_ms > self.last_analyzed_ms.load(Ordering::Acquire) {
                match self.analyzer.detect_pose(jpeg.clone(), timestamp_ms).await {
                    Ok(pose) => {
                        self.last_analyzed_ms.store(timestamp_ms, Ordering::Release);
                        event_detected = pose.poses.iter().any(|p| p.event_detected());

                        if self.annotate && !pose.poses.is_empty() {
                            let poses = pose.poses;
                            out_frame =
                                task::spawn_blocking(move || {
                                    overlay::draw_skeletons(out_frame, &poses)
                                })
                                .await
                                .map_err(|e| Error::Internal(format!("overlay task: {}", e)))??;
                        }
                    }
                    Err(e) => {
                        // No annotation this frame; the stream goes on
                        tracing::warn!(timestamp_ms, error = %e, "Analyzer call failed");
                    }
                }
            } else {
                tracing::debug!(timestamp_ms, "Non-increasing timestamp, analyzer skipped");
            }
        }

        let score = if seq % self.score_interval == 0 {
            match self.analyzer.read_score(jpeg).await {
                Ok(score) => score,
                Err(e) => {
                    tracing::debug!(error = %e, "Score scan failed");
                    None
                }
            }
        } else {
            None
        };

        let jpeg_base64 = task::spawn_blocking(move || {
            codec::encode_base64_jpeg(&out_frame, codec::OUTPUT_JPEG_QUALITY)
        })
        .await
        .map_err(|e| Error::Internal(format!("encode task: {}", e)))??;

        Ok(FrameOutput {
            jpeg_base64,
            event_detected,
            score,
        })
    }

    /// Frames processed so far
    pub fn frames_processed(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }
}
