//! Freehand annotation strokes and the two eraser operations.
//!
//! - **Split** cuts every stroke the eraser brush touches: points inside the
//!   brush are dropped and segments crossing it are severed. Each surviving run
//!   becomes its own stroke with the original color and width.
//! - **Area** removes any touched stroke wholesale.

use crate::id::StrokeId;
use kurbo::{Line, ParamCurveNearest, Point};
use serde::{Deserialize, Serialize};

/// A committed polyline in table space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Point>,
    pub color: String,
    /// Line width in output pixels.
    pub width: f64,
}

impl Stroke {
    pub fn new(id: StrokeId, color: impl Into<String>, width: f64) -> Self {
        Self {
            id,
            points: Vec::new(),
            color: color.into(),
            width,
        }
    }

    /// Shortest distance from `p` to the polyline (a lone point counts).
    pub fn distance_to(&self, p: Point) -> f64 {
        match self.points.as_slice() {
            [] => f64::INFINITY,
            [only] => only.distance(p),
            pts => pts
                .windows(2)
                .map(|w| segment_distance_sq(w[0], w[1], p))
                .fold(f64::INFINITY, f64::min)
                .sqrt(),
        }
    }

    pub fn touches(&self, center: Point, radius: f64) -> bool {
        self.distance_to(center) <= radius
    }

    /// Cut this stroke by a circular eraser. Returns `None` when untouched.
    pub fn split_by_eraser(&self, center: Point, radius: f64) -> Option<Vec<Stroke>> {
        let r2 = radius * radius;
        let inside = |p: Point| (p - center).hypot2() <= r2;

        let mut runs: Vec<Vec<Point>> = Vec::new();
        let mut current: Vec<Point> = Vec::new();
        let mut cut = false;

        for &p in &self.points {
            if inside(p) {
                cut = true;
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
                continue;
            }
            if let Some(&prev) = current.last()
                && segment_distance_sq(prev, p, center) <= r2
            {
                cut = true;
                runs.push(std::mem::take(&mut current));
            }
            current.push(p);
        }
        if !current.is_empty() {
            runs.push(current);
        }

        if !cut {
            return None;
        }

        let pieces = runs
            .into_iter()
            .enumerate()
            .map(|(n, points)| Stroke {
                // First piece keeps the original identity.
                id: if n == 0 { self.id } else { StrokeId::generate() },
                points,
                color: self.color.clone(),
                width: self.width,
            })
            .collect();
        Some(pieces)
    }
}

fn segment_distance_sq(a: Point, b: Point, p: Point) -> f64 {
    if a == b {
        return (p - a).hypot2();
    }
    Line::new(a, b).nearest(p, 1e-9).distance_sq
}

/// Apply a split-erase to a whole stroke list. `None` when nothing changed.
pub fn erase_split(strokes: &[Stroke], center: Point, radius: f64) -> Option<Vec<Stroke>> {
    let mut changed = false;
    let mut out = Vec::with_capacity(strokes.len());
    for stroke in strokes {
        match stroke.split_by_eraser(center, radius) {
            Some(pieces) => {
                changed = true;
                out.extend(pieces);
            }
            None => out.push(stroke.clone()),
        }
    }
    changed.then_some(out)
}

/// Remove every stroke the eraser touches. `None` when nothing changed.
pub fn erase_area(strokes: &[Stroke], center: Point, radius: f64) -> Option<Vec<Stroke>> {
    let kept: Vec<Stroke> = strokes
        .iter()
        .filter(|s| !s.touches(center, radius))
        .cloned()
        .collect();
    (kept.len() != strokes.len()).then_some(kept)
}
