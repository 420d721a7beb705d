pub mod compare;
pub mod homography;
pub mod id;
pub mod model;
pub mod patch;
pub mod pipeline;
pub mod stroke;
pub mod view;

pub use homography::{Homography, apply_homography, compute_homography, invert_homography};
pub use id::{PresetId, SceneId, StrokeId, TokenId};
pub use model::*;
pub use patch::{TokenFields, TokenPatch};
pub use pipeline::Pipeline;
pub use stroke::Stroke;
pub use view::{ViewWindow, normalize_view, stage_to_table, table_to_stage};

// Re-export kurbo's point so downstream crates don't need a direct dependency
pub use kurbo::Point;
