//! Tolerance comparison used by reconciliation.
//!
//! Floats compare within [`TOLERANCE`]; ids and strings compare exactly.

use crate::model::{TokenStats, WarpQuad};
use crate::stroke::Stroke;
use crate::view::ViewWindow;
use kurbo::Point;

pub const TOLERANCE: f64 = 1e-4;

pub fn approx_eq(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= TOLERANCE
}

pub fn approx_eq_opt(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => approx_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

pub fn points_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

pub fn warps_eq(a: &WarpQuad, b: &WarpQuad) -> bool {
    a.corners
        .iter()
        .zip(b.corners.iter())
        .all(|(p, q)| points_eq(*p, *q))
}

/// Rotation compares on the circle, so 359.99995° equals 0°.
pub fn views_eq(a: &ViewWindow, b: &ViewWindow) -> bool {
    let turn = (a.rotation - b.rotation).rem_euclid(360.0);
    points_eq(a.center, b.center)
        && approx_eq(a.zoom, b.zoom)
        && (turn <= TOLERANCE || 360.0 - turn <= TOLERANCE)
}

/// Order-sensitive; point counts must match exactly.
pub fn strokes_eq(a: &[Stroke], b: &[Stroke]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(s, t)| {
            s.id == t.id
                && s.color == t.color
                && approx_eq(s.width, t.width)
                && s.points.len() == t.points.len()
                && s.points.iter().zip(&t.points).all(|(p, q)| points_eq(*p, *q))
        })
}

pub fn stats_eq(a: &TokenStats, b: &TokenStats) -> bool {
    a.hp == b.hp
        && a.max_hp == b.max_hp
        && approx_eq_opt(a.initiative, b.initiative)
        && a.spell_slots == b.spell_slots
}

/// Notes compare with "no notes" and empty notes treated alike.
pub fn notes_eq(a: Option<&str>, b: Option<&str>) -> bool {
    a.unwrap_or("") == b.unwrap_or("")
}
