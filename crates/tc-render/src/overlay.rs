//! Overlay layout: where tokens, strokes, grid lines, and warp handles land
//! on a surface.
//!
//! Nothing here tracks dependencies. Callers rebuild the overlay right after
//! each committed mutation or received snapshot via `Overlay::recompute`.

use kurbo::Point;
use tc_core::model::{Scene, Session, Token};
use tc_core::stroke::Stroke;
use tc_core::{Pipeline, StrokeId, TokenId, WarpQuad};

/// Grid spacings finer than this are not drawn.
const MIN_GRID_SIZE: f64 = 0.005;

/// Pixel size of the output surface (projector framebuffer or editor canvas).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub width: f64,
    pub height: f64,
}

impl Surface {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Bottom-left-origin normalized output → top-left-origin pixels.
    pub fn to_pixels(&self, o: Point) -> Point {
        Point::new(o.x * self.width, (1.0 - o.y) * self.height)
    }
}

/// Who the overlay is for. Projection never shows hidden tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Projector,
    Editor,
}

/// What an overlay is laid out from.
#[derive(Debug, Clone, Copy)]
pub enum OverlaySource<'a> {
    Session(&'a Session),
    /// Scenes carry no grid; the session's applies.
    Scene {
        scene: &'a Scene,
        grid_size: Option<f64>,
    },
}

impl<'a> From<&'a Session> for OverlaySource<'a> {
    fn from(session: &'a Session) -> Self {
        Self::Session(session)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayToken {
    pub id: TokenId,
    pub name: String,
    pub color: String,
    pub center: Point,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStroke {
    pub id: StrokeId,
    pub color: String,
    pub width: f64,
    /// One polyline per run that stays inside the window.
    pub runs: Vec<Vec<Point>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Overlay {
    pub tokens: Vec<OverlayToken>,
    pub strokes: Vec<OverlayStroke>,
    pub grid: Vec<(Point, Point)>,
    /// Warp handle positions in stage space, corner order.
    pub handles: [Point; 4],
}

impl Overlay {
    pub fn recompute(source: OverlaySource<'_>, audience: Audience, surface: Surface) -> Self {
        match source {
            OverlaySource::Session(session) => Self::for_session(session, audience, surface),
            OverlaySource::Scene { scene, grid_size } => {
                Self::for_scene(scene, grid_size, audience, surface)
            }
        }
    }

    pub fn for_session(session: &Session, audience: Audience, surface: Surface) -> Self {
        let pipeline = Pipeline::from_map(&session.map);
        Self::build(
            &pipeline,
            &session.map.warp,
            &session.map.strokes,
            session.map.grid_size,
            &session.ordered_tokens(),
            audience,
            surface,
        )
    }

    pub fn for_scene(
        scene: &Scene,
        grid_size: Option<f64>,
        audience: Audience,
        surface: Surface,
    ) -> Self {
        let pipeline = Pipeline::new(scene.view, &scene.warp);
        Self::build(
            &pipeline,
            &scene.warp,
            &scene.strokes,
            grid_size,
            &scene.ordered_tokens(),
            audience,
            surface,
        )
    }

    pub fn build(
        pipeline: &Pipeline,
        warp: &WarpQuad,
        strokes: &[Stroke],
        grid_size: Option<f64>,
        tokens: &[&Token],
        audience: Audience,
        surface: Surface,
    ) -> Self {
        let tokens: Vec<OverlayToken> = tokens
            .iter()
            .filter(|t| t.visible || audience == Audience::Editor)
            .filter_map(|t| {
                let out = pipeline.table_to_output(t.position())?;
                Some(OverlayToken {
                    id: t.id,
                    name: t.name.clone(),
                    color: t.color.clone(),
                    center: surface.to_pixels(out),
                    hidden: !t.visible,
                })
            })
            .collect();

        let strokes: Vec<OverlayStroke> = strokes
            .iter()
            .filter_map(|s| {
                let runs = project_polyline(pipeline, &s.points, surface);
                (!runs.is_empty()).then(|| OverlayStroke {
                    id: s.id,
                    color: s.color.clone(),
                    width: s.width,
                    runs,
                })
            })
            .collect();

        let grid = grid_size
            .map(|size| grid_lines(pipeline, size, surface))
            .unwrap_or_default();

        let handles = warp.corners.map(|c| pipeline.table_to_stage(c));

        log::trace!(
            "overlay: {} tokens, {} strokes, {} grid lines",
            tokens.len(),
            strokes.len(),
            grid.len()
        );
        Self {
            tokens,
            strokes,
            grid,
            handles,
        }
    }
}

fn project_polyline(pipeline: &Pipeline, points: &[Point], surface: Surface) -> Vec<Vec<Point>> {
    if let [only] = points {
        return pipeline
            .table_to_output(*only)
            .map(|o| vec![vec![surface.to_pixels(o)]])
            .unwrap_or_default();
    }

    let mut runs: Vec<Vec<Point>> = Vec::new();
    for pair in points.windows(2) {
        let Some((a, b)) = pipeline.segment_to_output(pair[0], pair[1]) else {
            continue;
        };
        let (a, b) = (surface.to_pixels(a), surface.to_pixels(b));
        match runs.last_mut() {
            Some(run) if continues_run(run, a) => run.push(b),
            _ => runs.push(vec![a, b]),
        }
    }
    runs
}

fn continues_run(run: &[Point], start: Point) -> bool {
    run.last().is_some_and(|last| last.distance(start) < 1e-6)
}

fn grid_lines(pipeline: &Pipeline, size: f64, surface: Surface) -> Vec<(Point, Point)> {
    if !size.is_finite() || size < MIN_GRID_SIZE {
        return Vec::new();
    }
    let steps = (1.0 / size).floor() as usize;
    let mut out = Vec::with_capacity(2 * (steps + 1));
    for k in 0..=steps {
        let t = k as f64 * size;
        for (a, b) in [
            (Point::new(t, 0.0), Point::new(t, 1.0)),
            (Point::new(0.0, t), Point::new(1.0, t)),
        ] {
            if let Some((a, b)) = pipeline.segment_to_output(a, b) {
                out.push((surface.to_pixels(a), surface.to_pixels(b)));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::{Point, ViewWindow};

    const SURFACE: Surface = Surface::new(1000.0, 500.0);

    fn session_with_tokens() -> Session {
        let mut session = Session::new("OVL001");
        let mut shown = Token::new(TokenId::intern("shown"), "Knight");
        shown.x = 0.25;
        shown.y = 0.25;
        let mut hidden = Token::new(TokenId::intern("hidden"), "Assassin");
        hidden.visible = false;
        session.tokens = vec![shown, hidden];
        session.sync_token_order();
        session
    }

    #[test]
    fn identity_map_places_tokens_in_pixels() {
        let overlay = Overlay::for_session(&session_with_tokens(), Audience::Editor, SURFACE);
        assert_eq!(overlay.tokens.len(), 2);
        let knight = &overlay.tokens[0];
        assert!((knight.center.x - 250.0).abs() < 1e-9);
        assert!((knight.center.y - 125.0).abs() < 1e-9);
        assert!(overlay.tokens[1].hidden);
    }

    #[test]
    fn projector_skips_hidden_tokens() {
        let overlay = Overlay::for_session(&session_with_tokens(), Audience::Projector, SURFACE);
        let ids: Vec<&str> = overlay.tokens.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["shown"]);
    }

    #[test]
    fn tokens_outside_window_are_not_laid_out() {
        let mut session = session_with_tokens();
        session.map.view = ViewWindow::new(Point::new(0.75, 0.75), 2.0, 0.0);
        let overlay = Overlay::for_session(&session, Audience::Editor, SURFACE);
        // Knight at (0.25, 0.25) is off-window; the hidden token sits on the edge.
        let ids: Vec<&str> = overlay.tokens.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["hidden"]);
    }

    #[test]
    fn grid_covers_table_at_identity() {
        let mut session = Session::new("GRID01");
        session.map.grid_size = Some(0.25);
        let overlay = Overlay::for_session(&session, Audience::Projector, SURFACE);
        // 0, 0.25, 0.5, 0.75, 1.0 in both directions.
        assert_eq!(overlay.grid.len(), 10);
    }

    #[test]
    fn stroke_leaving_window_is_split_into_runs() {
        let mut session = Session::new("STRK01");
        session.map.view = ViewWindow::new(Point::new(0.25, 0.5), 2.0, 0.0);
        let mut stroke = Stroke::new(StrokeId::intern("zig"), "#fff", 2.0);
        stroke.points = vec![
            Point::new(0.1, 0.5),
            Point::new(0.4, 0.5),
            Point::new(0.8, 0.5),
            Point::new(0.4, 0.6),
        ];
        session.map.strokes = vec![stroke];
        let overlay = Overlay::for_session(&session, Audience::Projector, SURFACE);
        assert_eq!(overlay.strokes.len(), 1);
        assert_eq!(overlay.strokes[0].runs.len(), 2);
    }

    #[test]
    fn scene_source_uses_the_given_grid() {
        let session = session_with_tokens();
        let scene = Scene::from_session(&session, "copy");
        let from_session = Overlay::recompute((&session).into(), Audience::Editor, SURFACE);
        let from_scene = Overlay::recompute(
            OverlaySource::Scene {
                scene: &scene,
                grid_size: Some(0.5),
            },
            Audience::Editor,
            SURFACE,
        );
        assert_eq!(from_scene.tokens, from_session.tokens);
        assert!(from_session.grid.is_empty());
        assert_eq!(from_scene.grid.len(), 6);
    }

    #[test]
    fn pixels_have_a_top_left_origin() {
        assert_eq!(SURFACE.to_pixels(Point::new(0.0, 1.0)), Point::new(0.0, 0.0));
        assert_eq!(SURFACE.to_pixels(Point::new(0.5, 0.0)), Point::new(500.0, 500.0));
    }
}
