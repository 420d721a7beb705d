//! The session-store contract.
//!
//! Every mutating call is a single-field update and answers with the full
//! session snapshot as the store now holds it. The store may normalize
//! values on write (clamping, view normalization, order repair), so the
//! returned snapshot, not the request, is authoritative.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use tc_core::model::{TokenKind, TokenStats};
use tc_core::stroke::Stroke;
use tc_core::{PresetId, Session, TokenFields, TokenId, TokenPatch, ViewWindow, WarpQuad};

pub type StoreResult = Result<Session, StoreError>;

/// Fields for creating a token preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetFields {
    pub name: String,
    #[serde(default)]
    pub kind: TokenKind,
    pub color: String,
    #[serde(default)]
    pub stats: TokenStats,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial preset update; `Some` fields replace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresetPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<TokenStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[allow(async_fn_in_trait)]
pub trait SessionStore {
    /// Create a session. `requested_id` is honored when free; blank means
    /// "generate one".
    async fn create_session(&self, name: Option<&str>, requested_id: Option<&str>) -> StoreResult;

    async fn session(&self, session: &str) -> StoreResult;

    async fn set_map_image(&self, session: &str, url: Option<&str>) -> StoreResult;

    async fn set_warp(&self, session: &str, warp: &WarpQuad) -> StoreResult;

    async fn set_view(&self, session: &str, view: &ViewWindow) -> StoreResult;

    async fn set_strokes(&self, session: &str, strokes: &[Stroke]) -> StoreResult;

    /// Create a token. The store may ignore `fields.id` and assign its own.
    async fn add_token(&self, session: &str, fields: &TokenFields) -> StoreResult;

    async fn update_token(&self, session: &str, id: TokenId, patch: &TokenPatch) -> StoreResult;

    async fn remove_token(&self, session: &str, id: TokenId) -> StoreResult;

    /// Unknown ids are ignored; tokens the order omits are appended.
    async fn set_token_order(&self, session: &str, order: &[TokenId]) -> StoreResult;

    async fn add_preset(&self, session: &str, fields: &PresetFields) -> StoreResult;

    async fn update_preset(&self, session: &str, id: PresetId, patch: &PresetPatch) -> StoreResult;

    async fn remove_preset(&self, session: &str, id: PresetId) -> StoreResult;
}
