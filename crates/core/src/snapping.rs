//! Angle snapping for line endpoints and rotation handles

use crate::geometry::{normalize_degrees, Point};
use serde::{Deserialize, Serialize};

/// Snapping configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// Step for line angle snapping, in degrees
    pub line_angle_step: f32,
    /// Step for rotation handle snapping, in degrees
    pub rotation_step: f32,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self { line_angle_step: 15.0, rotation_step: 30.0 }
    }
}

/// Round `degrees` to the nearest multiple of `step`; a non-positive step disables snapping
pub fn snap_angle(degrees: f32, step: f32) -> f32 {
    if step <= 0.0 || !step.is_finite() {
        return degrees;
    }
    (degrees / step).round() * step
}

/// Re-place `free` around `anchor` at the snapped angle, keeping the raw distance
pub fn snap_segment(anchor: &Point, free: &Point, step: f32) -> Point {
    let dx = free.x - anchor.x;
    let dy = free.y - anchor.y;
    let length = (dx * dx + dy * dy).sqrt();
    if length <= f32::EPSILON {
        return *free;
    }

    let angle = snap_angle(dy.atan2(dx).to_degrees(), step).to_radians();
    Point::new(anchor.x + length * angle.cos(), anchor.y + length * angle.sin())
}

/// Rotation for a handle dragged to `pointer` around `center`.
///
/// The handle sits above the shape, so straight up reads as 0 degrees.
pub fn rotation_from_pointer(center: &Point, pointer: &Point, snap_step: Option<f32>) -> f32 {
    let raw = (pointer.y - center.y).atan2(pointer.x - center.x).to_degrees() + 90.0;
    let angle = match snap_step {
        Some(step) => snap_angle(raw, step),
        None => raw,
    };
    normalize_degrees(angle)
}
