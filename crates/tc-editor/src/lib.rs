//! Editing side of a session: pointer tools, the scene library, and the
//! reconciliation engine that converges the active scene into the
//! authoritative session.

pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod input;
pub mod reconcile;
pub mod scenes;
pub mod tools;

pub use config::EditorConfig;
pub use controller::SessionController;
pub use error::{EditorError, ReconcileError, SceneError};
pub use input::{InputEvent, Modifiers};
pub use reconcile::{Operation, Outcome, Reconciler, Step, reconcile};
pub use scenes::SceneLibrary;
pub use tools::{EraseMode, Interaction, SceneEdit, ToolKind};
