//! Headless projection display: one laid-out frame per received snapshot.

use tc_core::{Pipeline, Session};
use tc_render::{Audience, Overlay, Surface};

#[derive(Debug, Clone)]
pub struct Frame {
    pub session: String,
    pub image: Option<String>,
    pub overlay: Overlay,
    /// Warp homography packed for the texture-sampling shader.
    pub warp: [f32; 9],
}

impl Frame {
    pub fn render(session: &Session, surface: Surface) -> Self {
        let pipeline = Pipeline::from_map(&session.map);
        Self {
            session: session.id.clone(),
            image: session.map.image_url.clone(),
            overlay: Overlay::recompute(session.into(), Audience::Projector, surface),
            warp: pipeline.homography().to_gl_mat3(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} token(s), {} stroke(s), {} grid line(s), map {}",
            self.session,
            self.overlay.tokens.len(),
            self.overlay.strokes.len(),
            self.overlay.grid.len(),
            self.image.as_deref().unwrap_or("<none>"),
        )
    }
}
