pub mod hit;
pub mod overlay;

pub use hit::{hit_handle, hit_token};
pub use overlay::{Audience, Overlay, OverlaySource, Surface};
