//! FrameCodec - Ingress/Egress Frame Conversion
//!
//! ## Responsibilities
//!
//! - Decode base64 JPEG payloads into raw RGB frames
//! - Re-encode (possibly annotated) frames to base64 JPEG for delivery
//! - Strip data-URI markers from ingress text messages
//!
//! Stateless; CPU-bound entry points are meant to run on the blocking pool.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::io::Cursor;

/// JPEG quality for re-encoded outbound frames
pub const OUTPUT_JPEG_QUALITY: u8 = 50;

/// A decoded frame: raw RGB pixels plus capture timestamp.
///
/// Immutable once produced; the DVR and the pipeline each hold their own
/// copy, so there is no shared mutable aliasing across consumers.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB8, `width * height * 3` bytes
    pub pixels: Vec<u8>,
    /// Milliseconds since stream start, strictly increasing per stream
    pub timestamp_ms: i64,
}

impl Frame {
    /// View the pixel buffer as an `RgbImage` (consumes the frame)
    pub fn into_rgb_image(self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels)
            .ok_or_else(|| Error::Internal("frame pixel buffer size mismatch".to_string()))
    }

    /// Rebuild a frame from an annotated image, keeping the timestamp
    pub fn from_rgb_image(image: RgbImage, timestamp_ms: i64) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
            timestamp_ms,
        }
    }
}

/// Strip the `data:image/...;base64,` marker from an ingress text message.
///
/// Returns `None` if the message is not a data-URI image payload.
pub fn strip_data_uri(message: &str) -> Option<&str> {
    if !message.contains("data:image") {
        return None;
    }
    message.split_once(',').map(|(_, payload)| payload)
}

/// Decode a base64 payload into raw bytes
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(payload.trim())
        .map_err(|e| Error::Decode(format!("base64: {}", e)))
}

/// Decode a base64 JPEG payload into a `Frame`
pub fn decode_base64_jpeg(payload: &str, timestamp_ms: i64) -> Result<Frame> {
    let bytes = decode_base64(payload)?;
    decode_jpeg(&bytes, timestamp_ms)
}

/// Decode raw JPEG bytes into a `Frame`
pub fn decode_jpeg(bytes: &[u8], timestamp_ms: i64) -> Result<Frame> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| Error::Decode(format!("jpeg: {}", e)))?
        .to_rgb8();
    Ok(Frame::from_rgb_image(image, timestamp_ms))
}

/// Encode a frame as JPEG bytes
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
    encoder
        .write_image(
            &frame.pixels,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| Error::Internal(format!("jpeg encode: {}", e)))?;
    Ok(buf)
}

/// Encode a frame as a base64 JPEG string for outbound delivery
pub fn encode_base64_jpeg(frame: &Frame, quality: u8) -> Result<String> {
    Ok(BASE64.encode(encode_jpeg(frame, quality)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(w: u32, h: u32, ts: i64) -> Frame {
        Frame {
            width: w,
            height: h,
            pixels: vec![128; (w * h * 3) as usize],
            timestamp_ms: ts,
        }
    }

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(
            strip_data_uri("data:image/jpeg;base64,AAAA"),
            Some("AAAA")
        );
        assert_eq!(strip_data_uri("ping"), None);
        assert_eq!(strip_data_uri("{\"type\":\"hello\"}"), None);
    }

    #[test]
    fn test_decode_malformed_base64_is_decode_error() {
        let err = decode_base64_jpeg("!!!not-base64!!!", 0).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_decode_truncated_jpeg_is_decode_error() {
        // Valid base64, invalid JPEG
        let payload = BASE64.encode([0xFF, 0xD8, 0xFF, 0x00]);
        let err = decode_base64_jpeg(&payload, 0).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_encode_decode_preserves_dimensions() {
        let frame = test_frame(32, 24, 42);
        let jpeg = encode_jpeg(&frame, OUTPUT_JPEG_QUALITY).unwrap();
        let decoded = decode_jpeg(&jpeg, 42).unwrap();
        assert_eq!(decoded.width, 32);
        assert_eq!(decoded.height, 24);
        assert_eq!(decoded.timestamp_ms, 42);
    }

    #[test]
    fn test_round_trip_through_data_uri() {
        let frame = test_frame(16, 16, 0);
        let b64 = encode_base64_jpeg(&frame, 80).unwrap();
        let message = format!("data:image/jpeg;base64,{}", b64);
        let payload = strip_data_uri(&message).unwrap();
        let decoded = decode_base64_jpeg(payload, 7).unwrap();
        assert_eq!(decoded.width, 16);
    }
}
