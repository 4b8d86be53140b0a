//! VAR Refserver Library
//!
//! Real-time sports officiating assistant. Ingests a live video stream over
//! WebSocket, runs pose analysis per frame, keeps a rolling DVR buffer of
//! recent frames, and on demand assembles a clip for asynchronous review,
//! pushing the verdict back to all connected viewers.
//!
//! ## Architecture (8 Components)
//!
//! 1. FrameCodec - base64/JPEG decode and re-encode
//! 2. RollingBuffer - fixed-capacity DVR of recent decoded frames
//! 3. FramePipeline - per-frame decode -> DVR -> analyze -> overlay -> encode
//! 4. AnalyzerClient - pose/score analyzer communication adapter
//! 5. ReviewDispatcher - snapshot DVR, persist clip, schedule async review
//! 6. VerdictClient - clip upload/poll/review against the verdict model
//! 7. RealtimeHub - WebSocket fan-out to connected viewers
//! 8. WebAPI - HTTP endpoints (trigger review, toggle vision, stream socket)
//!
//! ## Design Principles
//!
//! - Per-frame and per-review failures are contained at their origin and
//!   never terminate the stream connection or the process
//! - All session state (DVR, vision toggle, clock origin) lives in
//!   `StreamSession`, not process globals
//! - Background work goes through `TaskRegistry` so shutdown can cancel
//!   or join it deterministically

pub mod analyzer_client;
pub mod codec;
pub mod dvr;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod realtime_hub;
pub mod review;
pub mod session;
pub mod state;
pub mod task_registry;
pub mod verdict_client;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
