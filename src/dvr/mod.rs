//! RollingBuffer - Rolling DVR of Recent Frames
//!
//! ## Responsibilities
//!
//! - Hold the most recent N decoded frames in FIFO order
//! - Evict exactly the oldest frame per push once at capacity
//! - Provide a non-destructive ordered snapshot for clip materialization
//!
//! Single writer (the frame pipeline); readers take copy-out snapshots, so
//! the buffer keeps accepting frames while a clip is being written.

mod clip;

pub use clip::{Clip, ClipWriter};

use crate::codec::Frame;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Default capacity: ~150 frames spans roughly 5-7 seconds of stream video
pub const DEFAULT_CAPACITY: usize = 150;

/// Fixed-capacity FIFO of frames
struct FrameRingBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl FrameRingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, frame: Frame) {
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    fn snapshot(&self) -> Vec<Frame> {
        self.frames.iter().cloned().collect()
    }
}

/// Rolling DVR instance
pub struct RollingBuffer {
    buffer: RwLock<FrameRingBuffer>,
}

impl RollingBuffer {
    /// Create a buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(FrameRingBuffer::new(capacity)),
        }
    }

    /// Create a buffer with the default ~5-7 second capacity
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append a frame, evicting the oldest if at capacity
    pub async fn push(&self, frame: Frame) {
        let mut buffer = self.buffer.write().await;
        buffer.push(frame);
    }

    /// Copy out the current contents in temporal order without mutating
    pub async fn snapshot(&self) -> Vec<Frame> {
        let buffer = self.buffer.read().await;
        buffer.snapshot()
    }

    /// Current number of buffered frames
    pub async fn len(&self) -> usize {
        let buffer = self.buffer.read().await;
        buffer.frames.len()
    }

    /// True if no frames are buffered
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop all buffered frames
    pub async fn clear(&self) {
        let mut buffer = self.buffer.write().await;
        buffer.frames.clear();
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(ts: i64) -> Frame {
        Frame {
            width: 2,
            height: 2,
            pixels: vec![0; 12],
            timestamp_ms: ts,
        }
    }

    #[tokio::test]
    async fn test_size_never_exceeds_capacity() {
        let dvr = RollingBuffer::new(5);
        for i in 0..20 {
            dvr.push(frame(i)).await;
            assert!(dvr.len().await <= 5);
        }
        assert_eq!(dvr.len().await, 5);
    }

    #[tokio::test]
    async fn test_fifo_eviction_drops_exactly_the_oldest() {
        let dvr = RollingBuffer::new(3);
        for i in 0..5 {
            dvr.push(frame(i)).await;
        }
        let snap = dvr.snapshot().await;
        let timestamps: Vec<i64> = snap.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(timestamps, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_snapshot_is_non_destructive() {
        let dvr = RollingBuffer::new(10);
        for i in 0..4 {
            dvr.push(frame(i)).await;
        }
        let snap = dvr.snapshot().await;
        assert_eq!(snap.len(), 4);
        assert_eq!(dvr.len().await, 4);

        // Buffer keeps accepting frames after a snapshot
        dvr.push(frame(4)).await;
        assert_eq!(dvr.len().await, 5);
        assert_eq!(snap.len(), 4);
    }

    #[tokio::test]
    async fn test_snapshot_concurrent_with_pushes() {
        let dvr = Arc::new(RollingBuffer::new(50));
        for i in 0..50 {
            dvr.push(frame(i)).await;
        }

        let writer = {
            let dvr = dvr.clone();
            tokio::spawn(async move {
                for i in 50..150 {
                    dvr.push(frame(i)).await;
                }
            })
        };

        for _ in 0..20 {
            let snap = dvr.snapshot().await;
            assert!(snap.len() <= 50);
            // Temporal order holds in every observed view
            for pair in snap.windows(2) {
                assert!(pair[0].timestamp_ms < pair[1].timestamp_ms);
            }
        }

        writer.await.unwrap();
        assert_eq!(dvr.len().await, 50);
    }

    #[tokio::test]
    async fn test_clear_empties_the_buffer() {
        let dvr = RollingBuffer::new(4);
        dvr.push(frame(0)).await;
        dvr.push(frame(1)).await;
        dvr.clear().await;
        assert!(dvr.is_empty().await);
    }
}
