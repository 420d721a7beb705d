//! Table → stage → output coordinate pipeline.
//!
//! Forward: `table_to_stage` (view window) → homography (warp quad) →
//! vertical flip into the bottom-left-origin render frame. Reverse runs the
//! same stages backwards to turn a click on the projected output into a
//! table-space edit.
//!
//! Warp corners are authored in absolute table space. The homography is
//! built from them directly and never re-applies the view; only the
//! on-screen handles follow the view (see `view::table_to_stage`).

use crate::homography::Homography;
use crate::model::{MapState, WarpQuad};
use crate::view::{ViewWindow, stage_contains};
use kurbo::{Affine, Point};

/// Flip between top-left-origin storage and bottom-left-origin rendering.
pub fn flip_vertical(p: Point) -> Point {
    Point::new(p.x, 1.0 - p.y)
}

/// Precomputed forward/inverse transforms for one view + warp pair.
/// Rebuild it whenever either changes.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    view: ViewWindow,
    to_stage: Affine,
    from_stage: Affine,
    warp: Homography,
    unwarp: Homography,
}

impl Pipeline {
    pub fn new(view: ViewWindow, warp: &WarpQuad) -> Self {
        let to_stage = view.stage_transform();
        let homography = warp.homography();
        Self {
            view,
            to_stage,
            from_stage: to_stage.inverse(),
            warp: homography,
            unwarp: homography.inverse(),
        }
    }

    pub fn from_map(map: &MapState) -> Self {
        Self::new(map.view, &map.warp)
    }

    pub fn view(&self) -> &ViewWindow {
        &self.view
    }

    pub fn homography(&self) -> &Homography {
        &self.warp
    }

    pub fn table_to_stage(&self, p: Point) -> Point {
        self.to_stage * p
    }

    pub fn stage_to_table(&self, p: Point) -> Point {
        self.from_stage * p
    }

    pub fn stage_to_output(&self, s: Point) -> Point {
        flip_vertical(self.warp.apply(s))
    }

    pub fn output_to_stage(&self, o: Point) -> Point {
        self.unwarp.apply(flip_vertical(o))
    }

    /// Project a table point; `None` when it falls outside the view window.
    pub fn table_to_output(&self, p: Point) -> Option<Point> {
        let s = self.table_to_stage(p);
        if !stage_contains(s) {
            log::trace!("clipped table point {p:?} (stage {s:?})");
            return None;
        }
        Some(self.stage_to_output(s))
    }

    pub fn output_to_table(&self, o: Point) -> Point {
        self.stage_to_table(self.output_to_stage(o))
    }

    /// Project a table-space segment, clipped to the window. Projective maps
    /// keep lines straight, so only the endpoints need transforming.
    pub fn segment_to_output(&self, a: Point, b: Point) -> Option<(Point, Point)> {
        let (sa, sb) = clip_to_stage(self.table_to_stage(a), self.table_to_stage(b))?;
        Some((self.stage_to_output(sa), self.stage_to_output(sb)))
    }
}

/// Liang–Barsky clip of a stage-space segment against the unit square.
pub fn clip_to_stage(a: Point, b: Point) -> Option<(Point, Point)> {
    let d = b - a;
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    let edges = [
        (-d.x, a.x),
        (d.x, 1.0 - a.x),
        (-d.y, a.y),
        (d.y, 1.0 - a.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((a + d * t0, a + d * t1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homography::UNIT_SQUARE;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn identity_pipeline_only_flips() {
        let pipe = Pipeline::new(ViewWindow::default(), &WarpQuad::new(UNIT_SQUARE));
        let out = pipe.table_to_output(Point::new(0.25, 0.1)).unwrap();
        assert!(close(out, Point::new(0.25, 0.9)));
    }

    #[test]
    fn output_round_trips_to_table() {
        let warp = WarpQuad::new([
            Point::new(0.1, 0.0),
            Point::new(0.9, 0.1),
            Point::new(1.0, 0.95),
            Point::new(0.0, 0.8),
        ]);
        let view = ViewWindow::new(Point::new(0.4, 0.6), 1.8, 20.0);
        let pipe = Pipeline::new(view, &warp);
        let p = Point::new(0.45, 0.55);
        let out = pipe.table_to_output(p).expect("inside window");
        assert!(close(pipe.output_to_table(out), p));
    }

    #[test]
    fn points_outside_window_are_clipped() {
        let view = ViewWindow::new(Point::new(0.25, 0.25), 2.0, 0.0);
        let pipe = Pipeline::new(view, &WarpQuad::default());
        assert!(pipe.table_to_output(Point::new(0.2, 0.2)).is_some());
        assert!(pipe.table_to_output(Point::new(0.8, 0.8)).is_none());
    }

    #[test]
    fn segment_is_cut_at_window_edge() {
        let view = ViewWindow::new(Point::new(0.25, 0.5), 2.0, 0.0);
        let pipe = Pipeline::new(view, &WarpQuad::default());
        // Window spans x ∈ [0, 0.5]; the segment leaves it halfway along.
        let (a, b) = pipe
            .segment_to_output(Point::new(0.25, 0.5), Point::new(0.75, 0.5))
            .unwrap();
        assert!(close(a, Point::new(0.5, 0.5)));
        assert!(close(b, Point::new(1.0, 0.5)));
        assert!(
            pipe.segment_to_output(Point::new(0.6, 0.1), Point::new(0.9, 0.9))
                .is_none()
        );
    }
}
