//! Token create / update payloads.

use crate::compare::{approx_eq, notes_eq, stats_eq};
use crate::id::TokenId;
use crate::model::{Token, TokenKind, TokenStats, clamp_unit};
use serde::{Deserialize, Serialize};

/// Fields for creating a token. `id` is a request: stores may ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TokenId>,
    pub name: String,
    pub kind: TokenKind,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub visible: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub stats: TokenStats,
}

impl From<&Token> for TokenFields {
    fn from(t: &Token) -> Self {
        Self {
            id: Some(t.id),
            name: t.name.clone(),
            kind: t.kind,
            color: t.color.clone(),
            x: t.x,
            y: t.y,
            visible: t.visible,
            notes: t.notes.clone(),
            stats: t.stats.clone(),
        }
    }
}

impl TokenFields {
    /// Materialize into a token with the given id, clamping the position.
    pub fn into_token(self, id: TokenId) -> Token {
        Token {
            id,
            name: self.name,
            kind: self.kind,
            color: self.color,
            x: clamp_unit(self.x, 0.5),
            y: clamp_unit(self.y, 0.5),
            visible: self.visible,
            notes: self.notes.filter(|n| !n.is_empty()),
            stats: self.stats,
        }
    }
}

/// Partial token update: every `Some` field replaces the stored value.
///
/// `notes: Some("")` clears the notes; `stats` replaces the whole record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<TokenStats>,
}

impl TokenPatch {
    pub fn is_empty(&self) -> bool {
        *self == TokenPatch::default()
    }

    /// The fields of `target` that differ from `current`, or `None` when the
    /// two already agree. Positions are compared after clamping, since the
    /// store clamps them on write.
    pub fn between(current: &Token, target: &Token) -> Option<TokenPatch> {
        let tx = clamp_unit(target.x, current.x);
        let ty = clamp_unit(target.y, current.y);
        let patch = TokenPatch {
            name: (current.name != target.name).then(|| target.name.clone()),
            kind: (current.kind != target.kind).then_some(target.kind),
            color: (current.color != target.color).then(|| target.color.clone()),
            x: (!approx_eq(current.x, tx)).then_some(tx),
            y: (!approx_eq(current.y, ty)).then_some(ty),
            visible: (current.visible != target.visible).then_some(target.visible),
            notes: (!notes_eq(current.notes.as_deref(), target.notes.as_deref()))
                .then(|| target.notes.clone().unwrap_or_default()),
            stats: (!stats_eq(&current.stats, &target.stats)).then(|| target.stats.clone()),
        };
        (!patch.is_empty()).then_some(patch)
    }

    pub fn apply_to(&self, token: &mut Token) {
        if let Some(name) = &self.name {
            token.name = name.clone();
        }
        if let Some(kind) = self.kind {
            token.kind = kind;
        }
        if let Some(color) = &self.color {
            token.color = color.clone();
        }
        if let Some(x) = self.x {
            token.x = clamp_unit(x, token.x);
        }
        if let Some(y) = self.y {
            token.y = clamp_unit(y, token.y);
        }
        if let Some(visible) = self.visible {
            token.visible = visible;
        }
        if let Some(notes) = &self.notes {
            token.notes = (!notes.is_empty()).then(|| notes.clone());
        }
        if let Some(stats) = &self.stats {
            token.stats = stats.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_tokens_need_no_patch() {
        let t = Token::new(TokenId::intern("p1"), "Hero");
        assert_eq!(TokenPatch::between(&t, &t.clone()), None);
    }

    #[test]
    fn patch_carries_only_changed_fields() {
        let current = Token::new(TokenId::intern("p2"), "Hero");
        let mut target = current.clone();
        target.x = 0.75;
        target.stats.spell_slots.insert("2".into(), 1);
        let patch = TokenPatch::between(&current, &target).unwrap();
        assert_eq!(patch.x, Some(0.75));
        assert_eq!(patch.y, None);
        assert_eq!(patch.name, None);
        assert!(patch.stats.is_some());

        let mut applied = current.clone();
        patch.apply_to(&mut applied);
        assert_eq!(applied, target);
    }

    #[test]
    fn clearing_notes_uses_empty_string() {
        let mut current = Token::new(TokenId::intern("p3"), "Hero");
        current.notes = Some("cursed".into());
        let mut target = current.clone();
        target.notes = None;
        let patch = TokenPatch::between(&current, &target).unwrap();
        assert_eq!(patch.notes.as_deref(), Some(""));
        patch.apply_to(&mut current);
        assert_eq!(current.notes, None);
    }

    #[test]
    fn out_of_range_target_compares_clamped() {
        let mut current = Token::new(TokenId::intern("p4"), "Hero");
        current.x = 1.0;
        let mut target = current.clone();
        target.x = 1.3;
        assert_eq!(TokenPatch::between(&current, &target), None);
    }

    #[test]
    fn patch_json_omits_unchanged_fields() {
        let patch = TokenPatch {
            visible: Some(false),
            ..TokenPatch::default()
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"visible":false}"#);
    }
}
