//! Coordinate transforms
//!
//! Three spaces are in play:
//! - device: pixels on the rendered canvas, top-left origin, scaled by zoom
//! - user: unscaled points, top-left origin, Y down; all stored geometry lives here
//! - native: the document's default user space, bottom-left origin, Y up
//!
//! Device/user conversion depends on the zoom scale only. User/native conversion
//! depends on the page's MediaBox and is applied only at the codec boundary.

use crate::geometry::{Point, Rect};
use pdf_engine::PageSize;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SCALE: f32 = 1.5;
/// Hard limits for programmatic scale changes
pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 8.0;
/// Limits for interactive zoom
pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 5.0;
pub const BUTTON_ZOOM_STEP: f32 = 0.25;
pub const WHEEL_ZOOM_STEP: f32 = 0.1;

/// Zoom state mapping device pixels to user-space points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateTransform {
    scale: f32,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self { scale: DEFAULT_SCALE }
    }
}

impl CoordinateTransform {
    pub fn new(scale: f32) -> Self {
        let mut transform = Self::default();
        transform.set_scale(scale);
        transform
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Set the scale, clamped to the hard limits
    pub fn set_scale(&mut self, scale: f32) {
        if scale.is_finite() {
            self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        }
    }

    fn zoom_by(&mut self, delta: f32) {
        let target = ((self.scale + delta) * 100.0).round() / 100.0;
        let next = target.clamp(MIN_ZOOM, MAX_ZOOM);
        // Only move in the requested direction
        if (delta > 0.0 && next > self.scale) || (delta < 0.0 && next < self.scale) {
            self.scale = next;
        }
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(BUTTON_ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(-BUTTON_ZOOM_STEP);
    }

    /// Ctrl+wheel zoom; positive `direction` zooms in
    pub fn wheel_zoom(&mut self, direction: f32) {
        if direction > 0.0 {
            self.zoom_by(WHEEL_ZOOM_STEP);
        } else if direction < 0.0 {
            self.zoom_by(-WHEEL_ZOOM_STEP);
        }
    }

    pub fn actual_size(&mut self) {
        self.scale = 1.0;
    }

    /// Scale at which a page of `page_width` points fills `container_width` pixels
    pub fn fit_width(&mut self, container_width: f32, page_width: f32) {
        if page_width > 0.0 {
            self.set_scale(container_width / page_width);
        }
    }

    /// Scale at which the whole page fits inside the container
    pub fn fit_page(&mut self, container_width: f32, container_height: f32, page: &PageSize) {
        if page.width_pt > 0.0 && page.height_pt > 0.0 {
            let scale = (container_width / page.width_pt).min(container_height / page.height_pt);
            self.set_scale(scale);
        }
    }

    pub fn device_to_user(&self, device: Point) -> Point {
        Point::new(device.x / self.scale, device.y / self.scale)
    }

    pub fn user_to_device(&self, user: Point) -> Point {
        Point::new(user.x * self.scale, user.y * self.scale)
    }

    pub fn user_rect_to_device(&self, rect: &Rect) -> Rect {
        Rect::new(rect.x * self.scale, rect.y * self.scale, rect.width * self.scale, rect.height * self.scale)
    }
}

/// Page frame for the user/native Y-flip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpace {
    pub width: f32,
    pub height: f32,
    pub origin_x: f32,
    pub origin_y: f32,
}

impl PageSpace {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height, origin_x: 0.0, origin_y: 0.0 }
    }

    /// Native y of the page's top edge
    fn top(&self) -> f32 {
        self.origin_y + self.height
    }

    pub fn user_to_native(&self, point: Point) -> Point {
        Point::new(self.origin_x + point.x, self.top() - point.y)
    }

    pub fn native_to_user(&self, point: Point) -> Point {
        Point::new(point.x - self.origin_x, self.top() - point.y)
    }

    /// User rect to native `[llx, lly, urx, ury]`
    pub fn rect_to_native(&self, rect: &Rect) -> [f32; 4] {
        let lower_left = self.user_to_native(Point::new(rect.x, rect.bottom()));
        let upper_right = self.user_to_native(Point::new(rect.right(), rect.y));
        [lower_left.x, lower_left.y, upper_right.x, upper_right.y]
    }

    /// Native rectangle with corners in any order to a user rect
    pub fn rect_from_native(&self, coords: [f32; 4]) -> Rect {
        let a = self.native_to_user(Point::new(coords[0], coords[1]));
        let b = self.native_to_user(Point::new(coords[2], coords[3]));
        Rect::from_corners(a, b)
    }
}

impl From<PageSize> for PageSpace {
    fn from(size: PageSize) -> Self {
        Self { width: size.width_pt, height: size.height_pt, origin_x: size.origin_x, origin_y: size.origin_y }
    }
}

impl Default for PageSpace {
    fn default() -> Self {
        PageSize::LETTER.into()
    }
}
