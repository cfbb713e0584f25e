//! Geometry kernel
//!
//! Points, rectangles, and the stateless distance/containment predicates used by
//! hit testing and handle editing. Everything here is in user space: unscaled
//! points with a top-left origin and Y increasing downward.

use serde::{Deserialize, Serialize};

/// A point in user space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Axis-aligned rectangle anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning two arbitrary corners, normalized so width and height are non-negative
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self { x, y, width: (a.x - b.x).abs(), height: (a.y - b.y).abs() }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right(), self.bottom())
    }

    pub fn contains(&self, point: &Point) -> bool {
        point_in_rect(point, self)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Grow every edge outward by `amount` (shrinks for negative values)
    pub fn expand(&self, amount: f32) -> Rect {
        Rect {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + 2.0 * amount,
            height: self.height + 2.0 * amount,
        }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect { x, y, width: right - x, height: bottom - y }
    }

    /// Map a point from this rectangle into `target`, preserving its relative position.
    ///
    /// A zero-extent axis keeps the point's offset from the origin unscaled.
    pub fn map_point(&self, point: &Point, target: &Rect) -> Point {
        let sx = if self.width.abs() > f32::EPSILON { target.width / self.width } else { 1.0 };
        let sy = if self.height.abs() > f32::EPSILON { target.height / self.height } else { 1.0 };
        Point::new(target.x + (point.x - self.x) * sx, target.y + (point.y - self.y) * sy)
    }

    pub fn map_rect(&self, rect: &Rect, target: &Rect) -> Rect {
        let a = self.map_point(&rect.top_left(), target);
        let b = self.map_point(&rect.bottom_right(), target);
        Rect::from_corners(a, b)
    }
}

/// Shortest distance from `point` to the segment `start`-`end`
pub fn distance_point_to_segment(point: &Point, start: &Point, end: &Point) -> f32 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq <= f32::EPSILON {
        return point.distance_to(start);
    }

    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq).clamp(0.0, 1.0);
    point.distance_to(&Point::new(start.x + t * dx, start.y + t * dy))
}

pub fn point_in_rect(point: &Point, rect: &Rect) -> bool {
    point.x >= rect.x && point.x <= rect.right() && point.y >= rect.y && point.y <= rect.bottom()
}

/// True when `point` lies within `threshold` of the rectangle's outline, inside or outside
pub fn point_near_rect_outline(point: &Point, rect: &Rect, threshold: f32) -> bool {
    let outer = rect.expand(threshold);
    if !point_in_rect(point, &outer) {
        return false;
    }

    // A rect thinner than twice the threshold has no hollow interior
    if rect.width <= 2.0 * threshold || rect.height <= 2.0 * threshold {
        return true;
    }

    !point_in_rect(point, &rect.expand(-threshold))
}

/// Normalized-distance ellipse containment: `((x-cx)/rx)^2 + ((y-cy)/ry)^2 <= 1`
pub fn point_in_ellipse(point: &Point, bounds: &Rect) -> bool {
    let rx = bounds.width / 2.0;
    let ry = bounds.height / 2.0;
    if rx <= f32::EPSILON || ry <= f32::EPSILON {
        return false;
    }

    let center = bounds.center();
    let nx = (point.x - center.x) / rx;
    let ny = (point.y - center.y) / ry;
    nx * nx + ny * ny <= 1.0
}

/// True when `point` lies within `threshold` of the ellipse inscribed in `bounds`.
///
/// Distance is measured along the ray from the centre, which is exact for
/// circles and a close approximation for moderate eccentricity.
pub fn point_near_ellipse_outline(point: &Point, bounds: &Rect, threshold: f32) -> bool {
    let rx = bounds.width / 2.0;
    let ry = bounds.height / 2.0;
    let center = bounds.center();

    if rx <= f32::EPSILON || ry <= f32::EPSILON {
        // Degenerate ellipse collapses to a segment
        let start = Point::new(bounds.x, bounds.y);
        let end = Point::new(bounds.right(), bounds.bottom());
        return distance_point_to_segment(point, &start, &end) <= threshold;
    }

    let nx = (point.x - center.x) / rx;
    let ny = (point.y - center.y) / ry;
    let normalized = (nx * nx + ny * ny).sqrt();

    if normalized <= f32::EPSILON {
        return rx.min(ry) <= threshold;
    }

    let radial = point.distance_to(&center);
    let distance = radial * (1.0 - 1.0 / normalized).abs();
    distance <= threshold
}

/// Smallest rectangle enclosing every point, or `None` for an empty input
pub fn bounding_box<'a, I>(points: I) -> Option<Rect>
where
    I: IntoIterator<Item = &'a Point>,
{
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for point in iter {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// Rotate `point` around `center` by `degrees`, clockwise on screen (Y down)
pub fn rotate_point(point: &Point, center: &Point, degrees: f32) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    Point::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos)
}

/// Wrap an angle into `[0, 360)`
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_from_corners_normalizes_reverse_drag() {
        let rect = Rect::from_corners(Point::new(110.0, 60.0), Point::new(10.0, 10.0));
        assert_eq!(rect, Rect::new(10.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn test_distance_point_to_segment() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(100.0, 0.0);

        assert!((distance_point_to_segment(&Point::new(50.0, 10.0), &a, &b) - 10.0).abs() < EPS);
        // Beyond the end clamps to the endpoint
        assert!((distance_point_to_segment(&Point::new(103.0, 4.0), &a, &b) - 5.0).abs() < EPS);
        // Degenerate segment
        assert!((distance_point_to_segment(&Point::new(3.0, 4.0), &a, &a) - 5.0).abs() < EPS);
    }

    #[test]
    fn test_point_near_rect_outline() {
        let rect = Rect::new(100.0, 100.0, 200.0, 100.0);

        assert!(point_near_rect_outline(&Point::new(95.0, 150.0), &rect, 10.0));
        assert!(point_near_rect_outline(&Point::new(105.0, 150.0), &rect, 10.0));
        assert!(!point_near_rect_outline(&Point::new(200.0, 150.0), &rect, 10.0));
        assert!(!point_near_rect_outline(&Point::new(80.0, 150.0), &rect, 10.0));
    }

    #[test]
    fn test_point_in_ellipse() {
        let bounds = Rect::new(0.0, 0.0, 200.0, 100.0);

        assert!(point_in_ellipse(&Point::new(100.0, 50.0), &bounds));
        assert!(point_in_ellipse(&Point::new(199.0, 50.0), &bounds));
        // Bounding-box corner lies outside the ellipse
        assert!(!point_in_ellipse(&Point::new(5.0, 5.0), &bounds));
    }

    #[test]
    fn test_point_near_circle_outline() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);

        assert!(point_near_ellipse_outline(&Point::new(105.0, 50.0), &bounds, 10.0));
        assert!(point_near_ellipse_outline(&Point::new(92.0, 50.0), &bounds, 10.0));
        assert!(!point_near_ellipse_outline(&Point::new(50.0, 50.0), &bounds, 10.0));
        assert!(!point_near_ellipse_outline(&Point::new(125.0, 50.0), &bounds, 10.0));
    }

    #[test]
    fn test_bounding_box() {
        let points = [Point::new(5.0, 20.0), Point::new(-3.0, 8.0), Point::new(12.0, 11.0)];
        let bbox = bounding_box(points.iter()).expect("non-empty input");

        assert_eq!(bbox, Rect::new(-3.0, 8.0, 15.0, 12.0));
        assert!(bounding_box(std::iter::empty()).is_none());
    }

    #[test]
    fn test_map_point_keeps_degenerate_axis() {
        let source = Rect::new(0.0, 10.0, 100.0, 0.0);
        let target = Rect::new(0.0, 10.0, 200.0, 50.0);
        let mapped = source.map_point(&Point::new(50.0, 10.0), &target);

        assert!((mapped.x - 100.0).abs() < EPS);
        assert!((mapped.y - 10.0).abs() < EPS);
    }

    #[test]
    fn test_rotate_and_normalize() {
        let rotated = rotate_point(&Point::new(10.0, 0.0), &Point::new(0.0, 0.0), 90.0);
        assert!(rotated.x.abs() < EPS);
        assert!((rotated.y - 10.0).abs() < EPS);

        assert!((normalize_degrees(-90.0) - 270.0).abs() < EPS);
        assert!((normalize_degrees(720.0)).abs() < EPS);
    }
}
