#![forbid(unsafe_code)]

//! Indicator geometry.
//!
//! Both nodes are treated as circles inscribed in their bounding rectangle:
//! center at the rectangle center, radius half the width. The indicator runs
//! from the client circle's edge to the server circle's edge along the line
//! joining the centers.
//!
//! Coordinates are screen coordinates: origin at top-left, Y grows downward,
//! angles in radians measured from +X toward +Y.

/// A point in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Axis-aligned bounding rectangle of a visual node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[inline]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Radius of the inscribed circle (half the width).
    #[inline]
    pub fn radius(&self) -> f64 {
        self.width / 2.0
    }
}

/// Where and how to draw one indicator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorLayout {
    /// On the client circle's edge, facing the server.
    pub anchor_start: Point,
    /// On the server circle's edge, facing the client.
    pub anchor_end: Point,
    pub length: f64,
    /// Radians; `atan2(dy, dx)` from start to end.
    pub angle: f64,
}

impl IndicatorLayout {
    /// Point at fraction `t` of the way from start to end (`t` clamped to 0..=1).
    pub fn point_at(&self, t: f64) -> Point {
        let t = t.clamp(0.0, 1.0);
        Point::new(
            self.anchor_start.x + (self.anchor_end.x - self.anchor_start.x) * t,
            self.anchor_start.y + (self.anchor_end.y - self.anchor_start.y) * t,
        )
    }

    pub fn is_degenerate(&self) -> bool {
        self.length == 0.0
    }
}

/// Compute the indicator layout between a server node and a client node.
///
/// Coincident centers yield a zero-length indicator at the client center
/// with angle 0.
pub fn compute_indicator_layout(server: Rect, client: Rect) -> IndicatorLayout {
    let server_center = server.center();
    let client_center = client.center();

    let dx = server_center.x - client_center.x;
    let dy = server_center.y - client_center.y;
    let distance = dx.hypot(dy);

    if distance == 0.0 || !distance.is_finite() {
        return IndicatorLayout {
            anchor_start: client_center,
            anchor_end: client_center,
            length: 0.0,
            angle: 0.0,
        };
    }

    let (ux, uy) = (dx / distance, dy / distance);
    let client_radius = client.radius();
    let server_radius = server.radius();

    let anchor_start = Point::new(
        client_center.x + ux * client_radius,
        client_center.y + uy * client_radius,
    );
    let anchor_end = Point::new(
        server_center.x - ux * server_radius,
        server_center.y - uy * server_radius,
    );

    IndicatorLayout {
        anchor_start,
        anchor_end,
        length: anchor_start.distance(anchor_end),
        angle: (anchor_end.y - anchor_start.y).atan2(anchor_end.x - anchor_start.x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    const EPS: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn diagonal_reference_layout() {
        let server = Rect::new(100.0, 100.0, 40.0, 40.0);
        let client = Rect::new(0.0, 0.0, 20.0, 20.0);
        let layout = compute_indicator_layout(server, client);

        let client_center = Point::new(10.0, 10.0);
        let server_center = Point::new(120.0, 120.0);

        assert!(approx(layout.anchor_start.distance(client_center), 10.0));
        // Facing the server: start lies on the segment between the centers.
        assert!(approx(layout.anchor_start.x, layout.anchor_start.y));
        assert!(layout.anchor_start.x > client_center.x);

        assert!(approx(layout.anchor_end.distance(server_center), 20.0));
        let expected = client_center.distance(server_center) - 30.0;
        assert!(approx(layout.length, expected));
        assert!(approx(layout.angle, FRAC_PI_4));
    }

    #[test]
    fn horizontal_layout_points_right() {
        let server = Rect::new(100.0, 0.0, 20.0, 20.0);
        let client = Rect::new(0.0, 0.0, 20.0, 20.0);
        let layout = compute_indicator_layout(server, client);
        assert_eq!(layout.anchor_start, Point::new(20.0, 10.0));
        assert_eq!(layout.anchor_end, Point::new(100.0, 10.0));
        assert!(approx(layout.length, 80.0));
        assert!(approx(layout.angle, 0.0));
    }

    #[test]
    fn server_above_client_points_up() {
        // Y grows downward, so "up" is -PI/2.
        let server = Rect::new(0.0, 0.0, 20.0, 20.0);
        let client = Rect::new(0.0, 100.0, 20.0, 20.0);
        let layout = compute_indicator_layout(server, client);
        assert!(approx(layout.angle, -FRAC_PI_2));
        assert!(approx(layout.length, 80.0));
    }

    #[test]
    fn server_left_of_client_points_left() {
        let server = Rect::new(0.0, 0.0, 20.0, 20.0);
        let client = Rect::new(100.0, 0.0, 20.0, 20.0);
        let layout = compute_indicator_layout(server, client);
        assert!(approx(layout.angle.abs(), PI));
    }

    #[test]
    fn identical_rects_are_degenerate_not_nan() {
        let rect = Rect::new(5.0, 5.0, 30.0, 30.0);
        let layout = compute_indicator_layout(rect, rect);
        assert!(layout.is_degenerate());
        assert_eq!(layout.angle, 0.0);
        assert_eq!(layout.anchor_start, rect.center());
        assert_eq!(layout.anchor_end, rect.center());
        assert!(!layout.length.is_nan());
    }

    #[test]
    fn point_at_interpolates_and_clamps() {
        let layout = compute_indicator_layout(
            Rect::new(100.0, 0.0, 20.0, 20.0),
            Rect::new(0.0, 0.0, 20.0, 20.0),
        );
        assert_eq!(layout.point_at(0.0), layout.anchor_start);
        assert_eq!(layout.point_at(1.0), layout.anchor_end);
        assert_eq!(layout.point_at(0.5), Point::new(60.0, 10.0));
        assert_eq!(layout.point_at(7.0), layout.anchor_end);
    }
}
