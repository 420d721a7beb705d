//! Hit testing on the editor stage: pointer → warp handle or token.
//!
//! Tokens are walked back-to-front (last in order = topmost) so the one the
//! user sees on top wins.

use kurbo::Point;
use tc_core::model::Token;
use tc_core::{TokenId, ViewWindow, WarpQuad};

/// Index of the warp handle nearest `stage_pt`, if within `radius` (stage units).
pub fn hit_handle(warp: &WarpQuad, view: &ViewWindow, stage_pt: Point, radius: f64) -> Option<usize> {
    warp.corners
        .iter()
        .enumerate()
        .map(|(i, c)| (i, view.to_stage(*c).distance(stage_pt)))
        .filter(|(_, d)| *d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Topmost token whose disc (radius in stage units) contains `stage_pt`.
pub fn hit_token(
    ordered: &[&Token],
    view: &ViewWindow,
    stage_pt: Point,
    radius: f64,
) -> Option<TokenId> {
    ordered
        .iter()
        .rev()
        .find(|t| view.to_stage(t.position()).distance(stage_pt) <= radius)
        .map(|t| t.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_hit_follows_view() {
        let warp = WarpQuad::default();
        let view = ViewWindow::new(Point::new(0.25, 0.25), 2.0, 0.0);
        // Corner 0 (0,0) is drawn at stage (0,0) under this window.
        assert_eq!(hit_handle(&warp, &view, Point::new(0.01, 0.01), 0.03), Some(0));
        // Corner 2 (1,1) is far off-stage.
        assert_eq!(hit_handle(&warp, &view, Point::new(0.99, 0.99), 0.03), None);
    }

    #[test]
    fn topmost_token_wins() {
        let bottom = Token::new(TokenId::intern("bottom"), "B");
        let top = Token::new(TokenId::intern("top"), "T");
        let view = ViewWindow::default();
        let hit = hit_token(&[&bottom, &top], &view, Point::new(0.5, 0.5), 0.02);
        assert_eq!(hit, Some(TokenId::intern("top")));
        assert_eq!(hit_token(&[&bottom, &top], &view, Point::new(0.1, 0.1), 0.02), None);
    }
}
