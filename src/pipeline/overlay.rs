//! Skeleton overlay drawing
//!
//! Draws pose landmark connections onto a frame before re-encoding.
//! Pure pixel work; meant to run on the blocking pool.

use crate::analyzer_client::{PoseDetection, POSE_CONNECTIONS};
use crate::codec::Frame;
use crate::error::Result;
use image::{Rgb, RgbImage};

const SKELETON_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Draw skeleton segments for every detected pose
pub fn draw_skeletons(frame: Frame, poses: &[PoseDetection]) -> Result<Frame> {
    let timestamp_ms = frame.timestamp_ms;
    let mut image = frame.into_rgb_image()?;
    let (w, h) = (image.width() as f32, image.height() as f32);

    for pose in poses {
        for &(a, b) in POSE_CONNECTIONS.iter() {
            let (Some(p1), Some(p2)) = (pose.keypoints.get(a), pose.keypoints.get(b)) else {
                continue;
            };
            draw_line(
                &mut image,
                (p1.x * w) as i64,
                (p1.y * h) as i64,
                (p2.x * w) as i64,
                (p2.y * h) as i64,
            );
        }
    }

    Ok(Frame::from_rgb_image(image, timestamp_ms))
}

/// Bresenham line with out-of-bounds pixels skipped (landmark coordinates
/// may fall slightly outside the frame)
fn draw_line(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64) {
    let (mut x, mut y) = (x0, y0);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel_checked(image, x, y);
        // Second pixel below for a 2px stroke
        put_pixel_checked(image, x, y + 1);

        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn put_pixel_checked(image: &mut RgbImage, x: i64, y: i64) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, SKELETON_COLOR);
    }
}
