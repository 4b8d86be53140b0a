//! Application state
//!
//! Holds all shared components and configuration

use crate::analyzer_client::AnalyzerClient;
use crate::pipeline::FramePipeline;
use crate::realtime_hub::RealtimeHub;
use crate::review::ReviewDispatcher;
use crate::session::StreamSession;
use crate::task_registry::TaskRegistry;
use crate::verdict_client::VerdictClient;
use std::path::PathBuf;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Pose/score analyzer service URL
    pub analyzer_url: String,
    /// Verdict service URL
    pub verdict_url: String,
    /// Scratch directory for clips
    pub scratch_dir: PathBuf,
    /// DVR capacity in frames (~5-7 seconds of stream video)
    pub dvr_capacity: usize,
    /// Scratch purge interval in seconds
    pub purge_interval_secs: u64,
    /// Whether the skeleton overlay is drawn on annotated frames
    pub annotate: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            analyzer_url: std::env::var("ANALYZER_URL")
                .unwrap_or_else(|_| "http://localhost:9100".to_string()),
            verdict_url: std::env::var("VERDICT_URL")
                .unwrap_or_else(|_| "http://localhost:9200".to_string()),
            scratch_dir: std::env::var("BUFFER_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("temp_buffer")),
            dvr_capacity: std::env::var("DVR_CAPACITY")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(crate::dvr::DEFAULT_CAPACITY),
            purge_interval_secs: std::env::var("PURGE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
            annotate: std::env::var("ANNOTATE")
                .map(|v| v != "false")
                .unwrap_or(true),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Stream session (DVR, vision toggle, clock origin)
    pub session: Arc<StreamSession>,
    /// Per-frame pipeline
    pub pipeline: Arc<FramePipeline>,
    /// Review dispatcher
    pub review: Arc<ReviewDispatcher>,
    /// WebSocket fan-out hub
    pub realtime: Arc<RealtimeHub>,
    /// Analyzer adapter
    pub analyzer: Arc<AnalyzerClient>,
    /// Verdict service adapter
    pub verdict: Arc<VerdictClient>,
    /// Supervised background tasks
    pub tasks: Arc<TaskRegistry>,
}
