//! ClipWriter - Clip Materialization on Durable Storage
//!
//! Stages a DVR snapshot as JPEG frames in a scratch directory and muxes
//! them into an MP4 with ffmpeg. Clip names carry a millisecond timestamp
//! and a random suffix so overlapping reviews never share a path; clips are
//! deleted once the verdict service is done with them, and the scratch
//! directory is also purged wholesale on a fixed interval as a safety net
//! against leaks.

use crate::codec::{self, Frame};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;

/// An ordered sequence of frames materialized from a DVR snapshot
#[derive(Debug, Clone)]
pub struct Clip {
    /// MP4 path in the scratch directory
    pub path: PathBuf,
    /// Number of frames muxed into the clip
    pub frame_count: usize,
    /// Creation time, also the leading part of the clip name
    pub created_at: DateTime<Utc>,
}

impl Clip {
    /// Remove the clip from durable storage. Best-effort.
    pub async fn delete(&self) {
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to delete clip");
        }
    }
}

/// ClipWriter instance
pub struct ClipWriter {
    /// Scratch directory for clips and frame staging
    scratch_dir: PathBuf,
    /// Playback frame rate for muxed clips
    fps: u32,
    /// ffmpeg mux timeout in seconds
    mux_timeout_secs: u64,
}

impl ClipWriter {
    /// Create a ClipWriter rooted at the given scratch directory
    pub async fn new(scratch_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&scratch_dir).await?;
        Ok(Self {
            scratch_dir,
            fps: 20,
            mux_timeout_secs: 30,
        })
    }

    /// Scratch directory path
    pub fn scratch_dir(&self) -> &PathBuf {
        &self.scratch_dir
    }

    /// Materialize a snapshot into an MP4 clip
    pub async fn write_clip(&self, frames: &[Frame]) -> Result<Clip> {
        if frames.is_empty() {
            return Err(Error::Clip("no frames to write".to_string()));
        }

        let created_at = Utc::now();
        let clip_path = self.scratch_dir.join(clip_file_name(&created_at));
        let stage_dir = self
            .scratch_dir
            .join(format!("stage_{}", uuid::Uuid::new_v4()));

        self.stage_frames(&stage_dir, frames).await?;
        let mux_result = self.mux(&stage_dir, &clip_path).await;

        // Staging frames are transient either way
        let _ = fs::remove_dir_all(&stage_dir).await;
        mux_result?;

        tracing::info!(
            path = %clip_path.display(),
            frame_count = frames.len(),
            "Clip saved"
        );

        Ok(Clip {
            path: clip_path,
            frame_count: frames.len(),
            created_at,
        })
    }

    /// Write frames as numbered JPEGs in temporal order for ffmpeg's
    /// image2 demuxer
    pub async fn stage_frames(&self, stage_dir: &PathBuf, frames: &[Frame]) -> Result<()> {
        fs::create_dir_all(stage_dir).await?;
        for (index, frame) in frames.iter().enumerate() {
            let jpeg = codec::encode_jpeg(frame, 85)?;
            let frame_path = stage_dir.join(format!("frame_{:05}.jpg", index));
            fs::write(&frame_path, jpeg).await?;
        }
        Ok(())
    }

    /// Mux staged JPEGs into an MP4
    async fn mux(&self, stage_dir: &PathBuf, clip_path: &PathBuf) -> Result<()> {
        let fps = self.fps.to_string();
        let pattern = stage_dir.join("frame_%05d.jpg");
        let pattern = pattern.to_string_lossy();
        let out = clip_path.to_string_lossy();
        let child = Command::new("ffmpeg")
            .args([
                "-framerate",
                fps.as_str(),
                "-i",
                &pattern,
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-loglevel",
                "error",
                "-y",
                &out,
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Clip(format!("ffmpeg spawn failed: {}", e)))?;

        // If the timeout fires, the future is cancelled, Child is dropped,
        // and kill_on_drop ensures SIGKILL reaches the ffmpeg process
        let timeout = Duration::from_secs(self.mux_timeout_secs);
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(Error::Clip(format!("ffmpeg failed: {}", stderr.trim())));
                }
                Ok(())
            }
            Ok(Err(e)) => Err(Error::Clip(format!("ffmpeg wait failed: {}", e))),
            Err(_) => Err(Error::Clip(format!(
                "ffmpeg mux timed out after {}s",
                self.mux_timeout_secs
            ))),
        }
    }

    /// Purge the scratch directory wholesale and recreate it
    pub async fn purge_scratch(&self) -> Result<()> {
        fs::remove_dir_all(&self.scratch_dir).await?;
        fs::create_dir_all(&self.scratch_dir).await?;
        tracing::debug!(dir = %self.scratch_dir.display(), "Scratch directory purged");
        Ok(())
    }
}

/// Name a clip by creation time at millisecond precision with a random
/// suffix. Triggers may land inside the same instant; their clips must
/// never collide on disk.
fn clip_file_name(created_at: &DateTime<Utc>) -> String {
    format!(
        "clip_{}_{}.mp4",
        created_at.timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: i64) -> Frame {
        Frame {
            width: 8,
            height: 8,
            pixels: vec![200; 8 * 8 * 3],
            timestamp_ms: ts,
        }
    }

    #[tokio::test]
    async fn test_stage_frames_in_temporal_order() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ClipWriter::new(dir.path().to_path_buf()).await.unwrap();

        let frames: Vec<Frame> = (0..12).map(frame).collect();
        let stage = dir.path().join("stage");
        writer.stage_frames(&stage, &frames).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(&stage)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "frame_00000.jpg");
        assert_eq!(names[11], "frame_00011.jpg");
    }

    #[tokio::test]
    async fn test_write_clip_rejects_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ClipWriter::new(dir.path().to_path_buf()).await.unwrap();
        let err = writer.write_clip(&[]).await.unwrap_err();
        assert!(matches!(err, Error::Clip(_)));
    }

    #[tokio::test]
    async fn test_purge_scratch_recreates_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("buffer");
        let writer = ClipWriter::new(scratch.clone()).await.unwrap();

        fs::write(scratch.join("clip_123.mp4"), b"stale").await.unwrap();
        writer.purge_scratch().await.unwrap();

        assert!(scratch.exists());
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[test]
    fn test_clip_names_never_collide_within_the_same_instant() {
        let now = Utc::now();
        let first = clip_file_name(&now);
        let second = clip_file_name(&now);
        assert!(first.starts_with(&format!("clip_{}_", now.timestamp_millis())));
        assert!(first.ends_with(".mp4"));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_clip_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip_1.mp4");
        fs::write(&path, b"clip").await.unwrap();

        let clip = Clip {
            path: path.clone(),
            frame_count: 10,
            created_at: Utc::now(),
        };
        clip.delete().await;
        assert!(!path.exists());
    }
}
