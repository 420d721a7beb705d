use crate::reconcile::Step;
use std::collections::HashMap;
use tc_core::{PresetId, SceneId, Session, TokenId};
use tc_sync::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unknown scene {0}")]
    NotFound(SceneId),

    #[error("the last remaining scene cannot be removed")]
    LastScene,

    #[error("scene library is empty")]
    Empty,

    #[error("encoding scene library: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decoding scene library: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// A reconciliation step failed. Steps before it stay applied; `baseline`
/// is the last snapshot the store returned.
#[derive(Debug, Error)]
#[error("{step} failed after {applied} operation(s): {source}")]
pub struct ReconcileError {
    pub step: Step,
    pub applied: usize,
    pub baseline: Session,
    /// Token ids the store reassigned before the failure.
    pub remapped: HashMap<TokenId, TokenId>,
    #[source]
    pub source: StoreError,
}

impl ReconcileError {
    pub fn user_message(&self) -> String {
        format!(
            "Couldn't sync {} with the table ({}). Earlier changes were saved; try again.",
            self.step.describe(),
            self.source
        )
    }
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Reconcile(#[from] Box<ReconcileError>),

    #[error("unknown preset {0}")]
    UnknownPreset(PresetId),

    #[error("unknown token {0}")]
    UnknownToken(TokenId),
}

impl From<ReconcileError> for EditorError {
    fn from(e: ReconcileError) -> Self {
        Self::Reconcile(Box::new(e))
    }
}
