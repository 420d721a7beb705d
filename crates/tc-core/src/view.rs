//! Pan / zoom / rotate view window over table space.
//!
//! Stage space is the unit square of the displayed window: the window's
//! centre sits at `(0.5, 0.5)` and its edges at 0 and 1 when unrotated.
//! `table_to_stage` translates by `-center`, rotates by `rotation` degrees,
//! scales by `zoom`, then re-centres.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.2;
pub const MAX_ZOOM: f64 = 8.0;

const STAGE_CENTER: Vec2 = Vec2::new(0.5, 0.5);

/// The sub-rectangle of the table currently being shown/projected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewWindow {
    pub center: Point,
    pub zoom: f64,
    /// Degrees, `[0, 360)` once normalized.
    pub rotation: f64,
}

impl Default for ViewWindow {
    fn default() -> Self {
        Self {
            center: Point::new(0.5, 0.5),
            zoom: 1.0,
            rotation: 0.0,
        }
    }
}

impl ViewWindow {
    pub fn new(center: Point, zoom: f64, rotation: f64) -> Self {
        Self {
            center,
            zoom,
            rotation,
        }
    }

    pub fn normalized(self) -> Self {
        normalize_view(self)
    }

    /// Affine carrying table space into stage space.
    pub fn stage_transform(&self) -> Affine {
        Affine::translate(STAGE_CENTER)
            * Affine::scale(self.zoom)
            * Affine::rotate(self.rotation.to_radians())
            * Affine::translate(-self.center.to_vec2())
    }

    pub fn to_stage(&self, p: Point) -> Point {
        table_to_stage(p, self)
    }

    pub fn to_table(&self, p: Point) -> Point {
        stage_to_table(p, self)
    }

    /// Half the side of the (unrotated) window in table units.
    pub fn half_extent(&self) -> f64 {
        0.5 / self.zoom
    }
}

/// Clamp zoom, wrap rotation, and keep the window inside the table.
///
/// Idempotent. Non-finite inputs fall back to the default view's values.
pub fn normalize_view(view: ViewWindow) -> ViewWindow {
    let zoom = if view.zoom.is_finite() {
        view.zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    };

    let rotation = wrap_degrees(view.rotation);

    let half = 0.5 / zoom;
    let clamp_axis = |c: f64| {
        let c = if c.is_finite() { c.clamp(0.0, 1.0) } else { 0.5 };
        if half >= 0.5 {
            // Window at least as large as the table: pin it centred.
            0.5
        } else {
            c.clamp(half, 1.0 - half)
        }
    };

    ViewWindow {
        center: Point::new(clamp_axis(view.center.x), clamp_axis(view.center.y)),
        zoom,
        rotation,
    }
}

fn wrap_degrees(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let r = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if r >= 360.0 { 0.0 } else { r }
}

pub fn table_to_stage(p: Point, view: &ViewWindow) -> Point {
    view.stage_transform() * p
}

pub fn stage_to_table(p: Point, view: &ViewWindow) -> Point {
    view.stage_transform().inverse() * p
}

/// Whether a stage-space point lies inside the displayed window.
pub fn stage_contains(p: Point) -> bool {
    (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn default_view_is_identity() {
        let v = ViewWindow::default();
        let p = Point::new(0.2, 0.7);
        assert!(close(table_to_stage(p, &v), p));
    }

    #[test]
    fn normalize_clamps_zoom_and_wraps_rotation() {
        let v = normalize_view(ViewWindow::new(Point::new(0.5, 0.5), 20.0, -90.0));
        assert_eq!(v.zoom, MAX_ZOOM);
        assert_eq!(v.rotation, 270.0);

        let v = normalize_view(ViewWindow::new(Point::new(0.5, 0.5), 0.01, 720.0));
        assert_eq!(v.zoom, MIN_ZOOM);
        assert_eq!(v.rotation, 0.0);
    }

    #[test]
    fn normalize_keeps_window_on_table() {
        let v = normalize_view(ViewWindow::new(Point::new(0.0, 1.0), 2.0, 0.0));
        assert_eq!(v.center, Point::new(0.25, 0.75));

        // Zoomed out past the table: centred.
        let v = normalize_view(ViewWindow::new(Point::new(0.1, 0.9), 0.5, 0.0));
        assert_eq!(v.center, Point::new(0.5, 0.5));
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            ViewWindow::new(Point::new(-3.0, 0.4), 3.3, 725.5),
            ViewWindow::new(Point::new(0.9, 0.9), 1.7, -0.0001),
            ViewWindow::new(Point::new(f64::NAN, 0.2), f64::INFINITY, f64::NAN),
            ViewWindow::new(Point::new(0.5, 0.5), 0.2, 359.999),
        ];
        for v in samples {
            let once = normalize_view(v);
            let twice = normalize_view(once);
            assert_eq!(once, twice);
            assert!((MIN_ZOOM..=MAX_ZOOM).contains(&once.zoom));
            assert!((0.0..360.0).contains(&once.rotation));
        }
    }

    #[test]
    fn stage_and_table_are_inverse() {
        let v = ViewWindow::new(Point::new(0.3, 0.6), 2.5, 33.0);
        for &(x, y) in &[(0.0, 0.0), (0.3, 0.6), (0.9, 0.1), (0.5, 0.5)] {
            let p = Point::new(x, y);
            assert!(close(stage_to_table(table_to_stage(p, &v), &v), p));
        }
    }

    #[test]
    fn zoomed_window_edges_map_to_stage_edges() {
        let v = ViewWindow::new(Point::new(0.5, 0.5), 2.0, 0.0);
        assert!(close(table_to_stage(Point::new(0.25, 0.25), &v), Point::ORIGIN));
        assert!(close(table_to_stage(Point::new(0.75, 0.75), &v), Point::new(1.0, 1.0)));
        assert!(!stage_contains(table_to_stage(Point::new(0.1, 0.5), &v)));
    }

    #[test]
    fn quarter_turn_rotates_about_center() {
        let v = ViewWindow::new(Point::new(0.5, 0.5), 1.0, 90.0);
        // (1, 0.5) is right of centre; a +90° turn (y down) puts it below.
        let s = table_to_stage(Point::new(1.0, 0.5), &v);
        assert!(close(s, Point::new(0.5, 1.0)), "{s:?}");
    }
}
