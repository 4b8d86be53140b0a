//! Stream session context
//!
//! All mutable state tied to one video stream lives here rather than in
//! process globals: the rolling DVR, the vision toggle, and the monotonic
//! clock origin used to derive frame timestamps. Lifecycle follows session
//! creation/teardown, so several independent sessions can coexist.

use crate::dvr::RollingBuffer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Per-stream session state
pub struct StreamSession {
    /// Rolling DVR, single writer (the frame pipeline)
    pub dvr: Arc<RollingBuffer>,
    /// Whether the frame analyzer is invoked. Relaxed atomics suffice:
    /// staleness of at most one frame is acceptable.
    vision_active: AtomicBool,
    /// Monotonic origin for stream-relative timestamps
    started_at: Instant,
}

impl StreamSession {
    /// Create a session with the given DVR capacity
    pub fn new(dvr_capacity: usize) -> Self {
        Self {
            dvr: Arc::new(RollingBuffer::new(dvr_capacity)),
            vision_active: AtomicBool::new(true),
            started_at: Instant::now(),
        }
    }

    /// Whether the analyzer runs on incoming frames
    pub fn vision_enabled(&self) -> bool {
        self.vision_active.load(Ordering::Relaxed)
    }

    /// Flip the vision toggle, returning the new value
    pub fn toggle_vision(&self) -> bool {
        // fetch_xor flips the flag atomically and returns the previous value
        !self.vision_active.fetch_xor(true, Ordering::Relaxed)
    }

    /// Milliseconds since session start; monotonic, so derived frame
    /// timestamps are strictly increasing as long as frames arrive at
    /// millisecond-or-coarser intervals
    pub fn elapsed_ms(&self) -> i64 {
        self.started_at.elapsed().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_starts_enabled_and_toggles() {
        let session = StreamSession::new(10);
        assert!(session.vision_enabled());
        assert!(!session.toggle_vision());
        assert!(!session.vision_enabled());
        assert!(session.toggle_vision());
        assert!(session.vision_enabled());
    }

    #[test]
    fn test_elapsed_ms_is_monotonic() {
        let session = StreamSession::new(10);
        let a = session.elapsed_ms();
        let b = session.elapsed_ms();
        assert!(b >= a);
    }
}
