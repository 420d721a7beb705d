//! Tool system for stage interactions.
//!
//! Exactly one interaction is live at a time, tracked by `DragState`. A
//! pointer-down while another drag is live is ignored, so events meant for
//! one interaction never reach another.
//!
//! Tools translate input into `SceneEdit`s that the controller applies to
//! the active scene.
//!
//! ## Modifier behaviors
//!
//! | Modifier | Calibrate | Pan | Draw |
//! |----------|-----------|-----|------|
//! | **Shift** | Axis-constrain handle drag | — | Straight segment from the last point |

use crate::input::{InputEvent, Modifiers};
use kurbo::Point;
use tc_core::stroke::{Stroke, erase_area, erase_split};
use tc_core::{Scene, StrokeId, TokenId, ViewWindow, WarpQuad, normalize_view};
use tc_render::hit::{hit_handle, hit_token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    /// Cut strokes where the brush passes.
    Split,
    /// Remove every stroke the brush touches.
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Select,
    Calibrate,
    Pan,
    Draw,
    Erase(EraseMode),
}

/// The live interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    DraggingHandle {
        index: usize,
        /// Stage position of the pointer at drag start.
        origin: Point,
        /// The corner's table position at drag start.
        start: Point,
    },
    /// `draft` is shown while dragging and dropped on release in favor of
    /// the committed position.
    DraggingToken { id: TokenId, draft: Point },
    /// `anchor` is the table point grabbed at pointer-down; it stays under
    /// the pointer while panning.
    PanningView { anchor: Point },
    Drawing(Stroke),
    Erasing(EraseMode),
}

/// A change to the active scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEdit {
    SetWarp(WarpQuad),
    SetView(ViewWindow),
    MoveToken { id: TokenId, to: Point },
    AddStroke(Stroke),
    SetStrokes(Vec<Stroke>),
}

impl SceneEdit {
    pub fn apply(self, scene: &mut Scene) {
        match self {
            SceneEdit::SetWarp(warp) => scene.warp = warp,
            SceneEdit::SetView(view) => scene.view = view,
            SceneEdit::MoveToken { id, to } => {
                if let Some(token) = scene.token_mut(id) {
                    token.set_position(to);
                } else {
                    log::debug!("moved token {id} is gone");
                }
            }
            SceneEdit::AddStroke(stroke) => scene.strokes.push(stroke),
            SceneEdit::SetStrokes(strokes) => scene.strokes = strokes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    /// Hit radius for warp handles, stage units.
    pub handle_radius: f64,
    /// Hit radius for tokens, stage units.
    pub token_radius: f64,
    /// Eraser brush radius, table units.
    pub eraser_radius: f64,
    pub brush_color: String,
    /// Output pixels.
    pub brush_width: f64,
    /// Minimum table-space spacing between recorded stroke points.
    pub min_point_spacing: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            handle_radius: 0.03,
            token_radius: 0.025,
            eraser_radius: 0.02,
            brush_color: "#ff3b30".to_string(),
            brush_width: 4.0,
            min_point_spacing: 0.002,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Interaction {
    pub tool: ToolKind,
    pub settings: ToolSettings,
    pub selected: Option<TokenId>,
    state: DragState,
}

impl Default for Interaction {
    fn default() -> Self {
        Self::new(ToolSettings::default())
    }
}

impl Interaction {
    pub fn new(settings: ToolSettings) -> Self {
        Self {
            tool: ToolKind::Select,
            settings,
            selected: None,
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    /// Switch tools. A live drag is abandoned without committing.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if !self.is_idle() {
            log::debug!("tool switch abandons {:?}", self.state);
        }
        self.tool = tool;
        self.state = DragState::Idle;
    }

    /// Where a dragged token is drawn right now.
    pub fn token_draft(&self) -> Option<(TokenId, Point)> {
        match self.state {
            DragState::DraggingToken { id, draft } => Some((id, draft)),
            _ => None,
        }
    }

    /// The stroke being drawn, if any.
    pub fn stroke_in_progress(&self) -> Option<&Stroke> {
        match &self.state {
            DragState::Drawing(stroke) => Some(stroke),
            _ => None,
        }
    }

    pub fn drawing_id(&self) -> Option<StrokeId> {
        self.stroke_in_progress().map(|s| s.id)
    }

    pub fn handle(&mut self, event: &InputEvent, scene: &Scene) -> Vec<SceneEdit> {
        match event {
            InputEvent::PointerDown { at, .. } => self.pointer_down(*at, scene),
            InputEvent::PointerMove { at, modifiers } => self.pointer_move(*at, *modifiers, scene),
            InputEvent::PointerUp { at } => self.pointer_up(*at, scene),
            InputEvent::Zoom { zoom } => {
                let view = ViewWindow { zoom: *zoom, ..scene.view };
                vec![SceneEdit::SetView(normalize_view(view))]
            }
            InputEvent::Rotate { degrees } => {
                let view = ViewWindow {
                    rotation: *degrees,
                    ..scene.view
                };
                vec![SceneEdit::SetView(normalize_view(view))]
            }
        }
    }

    fn pointer_down(&mut self, at: Point, scene: &Scene) -> Vec<SceneEdit> {
        if !self.is_idle() {
            log::trace!("pointer-down ignored while {:?}", self.state);
            return vec![];
        }
        let view = &scene.view;
        match self.tool {
            ToolKind::Calibrate => {
                if let Some(index) = hit_handle(&scene.warp, view, at, self.settings.handle_radius) {
                    self.state = DragState::DraggingHandle {
                        index,
                        origin: at,
                        start: scene.warp.corners[index],
                    };
                }
                vec![]
            }
            ToolKind::Select => {
                let ordered = scene.ordered_tokens();
                self.selected = hit_token(&ordered, view, at, self.settings.token_radius);
                if let Some(id) = self.selected
                    && let Some(token) = scene.token(id)
                {
                    self.state = DragState::DraggingToken {
                        id,
                        draft: token.position(),
                    };
                }
                vec![]
            }
            ToolKind::Pan => {
                self.state = DragState::PanningView {
                    anchor: view.to_table(at),
                };
                vec![]
            }
            ToolKind::Draw => {
                let mut stroke = Stroke::new(
                    StrokeId::generate(),
                    self.settings.brush_color.clone(),
                    self.settings.brush_width,
                );
                stroke.points.push(view.to_table(at));
                self.state = DragState::Drawing(stroke);
                vec![]
            }
            ToolKind::Erase(mode) => {
                self.state = DragState::Erasing(mode);
                self.erase_at(mode, view.to_table(at), scene)
            }
        }
    }

    fn pointer_move(&mut self, at: Point, modifiers: Modifiers, scene: &Scene) -> Vec<SceneEdit> {
        let view = scene.view;
        match &mut self.state {
            DragState::Idle => vec![],
            DragState::DraggingHandle {
                index,
                origin,
                start,
            } => {
                let mut at = at;
                // Shift: constrain to the dominant axis of the drag.
                if modifiers.shift {
                    let d = at - *origin;
                    if d.x.abs() > d.y.abs() {
                        at.y = origin.y;
                    } else {
                        at.x = origin.x;
                    }
                }
                let corner = if at == *origin { *start } else { view.to_table(at) };
                vec![SceneEdit::SetWarp(scene.warp.with_corner(*index, corner))]
            }
            DragState::DraggingToken { draft, .. } => {
                let p = view.to_table(at);
                *draft = Point::new(p.x.clamp(0.0, 1.0), p.y.clamp(0.0, 1.0));
                vec![]
            }
            DragState::PanningView { anchor } => {
                let under = view.to_table(at);
                let center = view.center + (*anchor - under);
                vec![SceneEdit::SetView(normalize_view(ViewWindow { center, ..view }))]
            }
            DragState::Drawing(stroke) => {
                let p = view.to_table(at);
                // Shift: replace the trailing point, drawing a straight run.
                if modifiers.shift && stroke.points.len() > 1 {
                    stroke.points.pop();
                }
                let far_enough = stroke
                    .points
                    .last()
                    .is_none_or(|last| last.distance(p) >= self.settings.min_point_spacing);
                if far_enough {
                    stroke.points.push(p);
                }
                vec![]
            }
            DragState::Erasing(mode) => {
                let mode = *mode;
                self.erase_at(mode, view.to_table(at), scene)
            }
        }
    }

    fn pointer_up(&mut self, at: Point, scene: &Scene) -> Vec<SceneEdit> {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        match state {
            DragState::DraggingToken { id, draft } => vec![SceneEdit::MoveToken { id, to: draft }],
            DragState::Drawing(mut stroke) => {
                let p = scene.view.to_table(at);
                if stroke.points.last().is_none_or(|last| *last != p) {
                    stroke.points.push(p);
                }
                vec![SceneEdit::AddStroke(stroke)]
            }
            _ => vec![],
        }
    }

    fn erase_at(&self, mode: EraseMode, p: Point, scene: &Scene) -> Vec<SceneEdit> {
        let radius = self.settings.eraser_radius;
        let erased = match mode {
            EraseMode::Split => erase_split(&scene.strokes, p, radius),
            EraseMode::Area => erase_area(&scene.strokes, p, radius),
        };
        erased.map(SceneEdit::SetStrokes).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tc_core::Token;

    fn apply_all(scene: &mut Scene, edits: Vec<SceneEdit>) {
        for edit in edits {
            edit.apply(scene);
        }
    }

    #[test]
    fn handle_drag_moves_only_that_corner() {
        let mut scene = Scene::empty("calibration");
        let before = scene.warp;
        let mut tool = Interaction::default();
        tool.set_tool(ToolKind::Calibrate);

        for event in [InputEvent::down(0.0, 0.0), InputEvent::moved(0.05, 0.05), InputEvent::moved(0.1, 0.1)] {
            let edits = tool.handle(&event, &scene);
            apply_all(&mut scene, edits);
        }
        let edits = tool.handle(&InputEvent::up(0.1, 0.1), &scene);
        apply_all(&mut scene, edits);

        let c0 = scene.warp.corners[0];
        assert!((c0.x - 0.1).abs() < 1e-12 && (c0.y - 0.1).abs() < 1e-12);
        for i in 1..4 {
            assert_eq!(scene.warp.corners[i].x.to_bits(), before.corners[i].x.to_bits());
            assert_eq!(scene.warp.corners[i].y.to_bits(), before.corners[i].y.to_bits());
        }
        assert!(tool.is_idle());
    }

    #[test]
    fn handle_drag_under_zoomed_view_stores_table_coordinates() {
        let mut scene = Scene::empty("zoomed");
        scene.view = ViewWindow::new(Point::new(0.25, 0.25), 2.0, 0.0);
        let mut tool = Interaction::default();
        tool.set_tool(ToolKind::Calibrate);

        // Corner 0 (0,0) shows at stage (0,0); stage (0.1,0.1) is table (0.05,0.05).
        tool.handle(&InputEvent::down(0.0, 0.0), &scene);
        let edits = tool.handle(&InputEvent::moved(0.1, 0.1), &scene);
        apply_all(&mut scene, edits);
        let c0 = scene.warp.corners[0];
        assert!((c0.x - 0.05).abs() < 1e-12 && (c0.y - 0.05).abs() < 1e-12);
    }

    #[test]
    fn token_draft_is_committed_once_on_release() {
        let mut scene = Scene::empty("tokens");
        scene.add_token(Token::new(TokenId::intern("knight"), "Knight"));
        let mut tool = Interaction::default();

        assert!(tool.handle(&InputEvent::down(0.5, 0.5), &scene).is_empty());
        assert!(tool.handle(&InputEvent::moved(0.7, 0.6), &scene).is_empty());
        assert_eq!(tool.token_draft(), Some((TokenId::intern("knight"), Point::new(0.7, 0.6))));
        // Scene is untouched while dragging.
        assert_eq!(scene.tokens[0].position(), Point::new(0.5, 0.5));

        let edits = tool.handle(&InputEvent::up(0.7, 0.6), &scene);
        assert_eq!(
            edits,
            vec![SceneEdit::MoveToken {
                id: TokenId::intern("knight"),
                to: Point::new(0.7, 0.6)
            }]
        );
        assert_eq!(tool.token_draft(), None);
    }

    #[test]
    fn interactions_are_exclusive() {
        let scene = Scene::empty("exclusive");
        let mut tool = Interaction::default();
        tool.set_tool(ToolKind::Pan);
        tool.handle(&InputEvent::down(0.5, 0.5), &scene);
        // A second pointer-down cannot start another interaction.
        tool.tool = ToolKind::Draw;
        tool.handle(&InputEvent::down(0.2, 0.2), &scene);
        assert!(matches!(tool.state(), DragState::PanningView { .. }));
    }

    #[test]
    fn panning_keeps_grabbed_point_under_pointer() {
        let mut scene = Scene::empty("pan");
        scene.view = ViewWindow::new(Point::new(0.5, 0.5), 2.0, 0.0);
        let mut tool = Interaction::default();
        tool.set_tool(ToolKind::Pan);
        tool.handle(&InputEvent::down(0.5, 0.5), &scene);
        let edits = tool.handle(&InputEvent::moved(0.3, 0.5), &scene);
        apply_all(&mut scene, edits);
        // Dragging left by 0.2 stage = 0.1 table moves the window right.
        assert!((scene.view.center.x - 0.6).abs() < 1e-12);
        assert!((scene.view.center.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn drawing_commits_on_release() {
        let mut scene = Scene::empty("draw");
        let mut tool = Interaction::default();
        tool.set_tool(ToolKind::Draw);
        tool.handle(&InputEvent::down(0.1, 0.1), &scene);
        tool.handle(&InputEvent::moved(0.2, 0.1), &scene);
        let id = tool.drawing_id().unwrap();
        let edits = tool.handle(&InputEvent::up(0.3, 0.1), &scene);
        apply_all(&mut scene, edits);

        assert_eq!(scene.strokes.len(), 1);
        assert_eq!(scene.strokes[0].id, id);
        assert_eq!(scene.strokes[0].points.len(), 3);
        assert_eq!(scene.strokes[0].color, "#ff3b30");
    }

    #[test]
    fn split_eraser_cuts_middle_of_stroke() {
        let mut scene = Scene::empty("erase");
        let mut stroke = Stroke::new(StrokeId::intern("line"), "#123456", 3.0);
        stroke.points = vec![Point::new(0.1, 0.5), Point::new(0.5, 0.5), Point::new(0.9, 0.5)];
        scene.strokes.push(stroke.clone());

        let mut tool = Interaction::default();
        tool.set_tool(ToolKind::Erase(EraseMode::Split));
        let edits = tool.handle(&InputEvent::down(0.5, 0.5), &scene);
        apply_all(&mut scene, edits);
        tool.handle(&InputEvent::up(0.5, 0.5), &scene);

        assert_eq!(scene.strokes.len(), 2);
        for piece in &scene.strokes {
            assert_eq!(piece.color, "#123456");
            assert_eq!(piece.width, 3.0);
            assert!(piece.points.len() < stroke.points.len());
            assert!(piece.points.iter().all(|p| stroke.points.contains(p)));
        }
    }

    #[test]
    fn area_eraser_removes_touched_stroke() {
        let mut scene = Scene::empty("erase-area");
        let mut stroke = Stroke::new(StrokeId::intern("blob"), "#000", 1.0);
        stroke.points = vec![Point::new(0.2, 0.2), Point::new(0.8, 0.2)];
        scene.strokes.push(stroke);
        let mut tool = Interaction::default();
        tool.set_tool(ToolKind::Erase(EraseMode::Area));
        let edits = tool.handle(&InputEvent::down(0.5, 0.2), &scene);
        apply_all(&mut scene, edits);
        assert!(scene.strokes.is_empty());
    }

    #[test]
    fn sliders_normalize_view() {
        let scene = Scene::empty("sliders");
        let mut tool = Interaction::default();
        let edits = tool.handle(&InputEvent::Rotate { degrees: -45.0 }, &scene);
        assert_eq!(
            edits,
            vec![SceneEdit::SetView(ViewWindow::new(Point::new(0.5, 0.5), 1.0, 315.0))]
        );
        let edits = tool.handle(&InputEvent::Zoom { zoom: 50.0 }, &scene);
        assert!(matches!(&edits[..], [SceneEdit::SetView(v)] if v.zoom == 8.0));
    }
}
