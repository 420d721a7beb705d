//! Battle-map data model shared by the editor, the projector, and the store.
//!
//! `Session` is the authoritative remote aggregate; `Scene` is a client-side
//! bundle reconciled into it one at a time. All wire types serialize to the
//! session server's JSON shape.

use crate::homography::{Homography, UNIT_SQUARE, compute_homography};
use crate::id::{PresetId, SceneId, StrokeId, TokenId};
use crate::patch::{TokenFields, TokenPatch};
use crate::stroke::Stroke;
use crate::view::{ViewWindow, normalize_view};
use kurbo::Point;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Clamp a table-space coordinate into `[0, 1]`; non-finite becomes `fallback`.
pub fn clamp_unit(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback }
}

// ─── Warp ────────────────────────────────────────────────────────────────

/// The four table-space corners the canonical square is warped onto.
///
/// Replaced wholesale, never edited in place: `with_corner` returns a copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpQuad {
    pub corners: [Point; 4],
}

impl Default for WarpQuad {
    fn default() -> Self {
        Self {
            corners: UNIT_SQUARE,
        }
    }
}

impl WarpQuad {
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    pub fn homography(&self) -> Homography {
        compute_homography(&self.corners)
    }

    /// Copy with one corner replaced; the other three are untouched.
    ///
    /// # Panics
    /// If `index >= 4`.
    pub fn with_corner(&self, index: usize, p: Point) -> Self {
        let mut corners = self.corners;
        corners[index] = p;
        Self { corners }
    }
}

// ─── Map ─────────────────────────────────────────────────────────────────

fn empty_as_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(d)?.filter(|s| !s.is_empty()))
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapState {
    /// The server stores a cleared image as `""`; that reads back as `None`.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub warp: WarpQuad,
    /// Grid spacing as a fraction of the table width.
    #[serde(default)]
    pub grid_size: Option<f64>,
    #[serde(default)]
    pub view: ViewWindow,
    #[serde(default)]
    pub strokes: Vec<Stroke>,
}

// ─── Tokens ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Pc,
    Npc,
    Prop,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenStats {
    #[serde(default)]
    pub hp: Option<i64>,
    #[serde(default)]
    pub max_hp: Option<i64>,
    #[serde(default)]
    pub initiative: Option<f64>,
    /// Remaining slots per spell level (`"1"` → 3).
    #[serde(default)]
    pub spell_slots: BTreeMap<String, i64>,
}

fn default_color() -> String {
    "#ffffff".to_string()
}

fn default_coord() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub name: String,
    #[serde(default)]
    pub kind: TokenKind,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_coord")]
    pub x: f64,
    #[serde(default = "default_coord")]
    pub y: f64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub stats: TokenStats,
}

impl Token {
    pub fn new(id: TokenId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: TokenKind::default(),
            color: default_color(),
            x: 0.5,
            y: 0.5,
            visible: true,
            notes: None,
            stats: TokenStats::default(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn set_position(&mut self, p: Point) {
        self.x = clamp_unit(p.x, self.x);
        self.y = clamp_unit(p.y, self.y);
    }
}

/// Reusable token template in the session's preset library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPreset {
    pub id: PresetId,
    pub name: String,
    #[serde(default)]
    pub kind: TokenKind,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub stats: TokenStats,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TokenPreset {
    /// A fresh token stamped from this preset at a table-space point.
    pub fn spawn(&self, at: Point) -> Token {
        let mut token = Token::new(TokenId::generate(), self.name.clone());
        token.kind = self.kind;
        token.color = self.color.clone();
        token.stats = self.stats.clone();
        token.notes = self.notes.clone();
        token.set_position(at);
        token
    }
}

// ─── Session ─────────────────────────────────────────────────────────────

/// The authoritative remote aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub map: MapState,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub token_order: Vec<TokenId>,
    #[serde(default)]
    pub presets: Vec<TokenPreset>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            map: MapState::default(),
            tokens: Vec::new(),
            token_order: Vec::new(),
            presets: Vec::new(),
        }
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }

    pub fn preset(&self, id: PresetId) -> Option<&TokenPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Tokens in display order.
    pub fn ordered_tokens(&self) -> Vec<&Token> {
        ordered(&self.tokens, &self.token_order)
    }

    // ─── Store-side writes ────────────────────────────────────────────
    //
    // The write semantics every store applies. Each leaves `token_order`
    // repaired.

    pub fn set_view(&mut self, view: ViewWindow) {
        self.map.view = normalize_view(view);
    }

    /// Create a token with the given id, clamping its position.
    pub fn insert_token(&mut self, fields: TokenFields, id: TokenId) {
        self.tokens.push(fields.into_token(id));
        self.token_order.push(id);
        self.sync_token_order();
    }

    /// `false` when no token has `id`.
    pub fn patch_token(&mut self, id: TokenId, patch: &TokenPatch) -> bool {
        let Some(token) = self.tokens.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        patch.apply_to(token);
        true
    }

    /// `false` when no token has `id`.
    pub fn delete_token(&mut self, id: TokenId) -> bool {
        let before = self.tokens.len();
        self.tokens.retain(|t| t.id != id);
        self.sync_token_order();
        self.tokens.len() != before
    }

    /// Unknown ids are skipped; tokens the order omits keep their relative
    /// order at the end.
    pub fn reorder_tokens(&mut self, order: &[TokenId]) {
        self.token_order = order.to_vec();
        self.sync_token_order();
    }

    /// Re-derive `token_order` from the token list: unknown ids are dropped,
    /// duplicates collapse, and tokens the order does not name are appended
    /// in list order. The token list is re-sorted to match.
    pub fn sync_token_order(&mut self) {
        let order = merged_order(&self.tokens, &self.token_order);
        let mut by_id: HashMap<TokenId, Token> =
            self.tokens.drain(..).map(|t| (t.id, t)).collect();
        self.tokens = order.iter().filter_map(|id| by_id.remove(id)).collect();
        self.token_order = order;
    }
}

/// `order` restricted to known ids, followed by the remaining tokens.
pub fn merged_order(tokens: &[Token], order: &[TokenId]) -> Vec<TokenId> {
    let known: HashSet<TokenId> = tokens.iter().map(|t| t.id).collect();
    let mut seen = HashSet::with_capacity(tokens.len());
    let mut out: Vec<TokenId> = order
        .iter()
        .copied()
        .filter(|id| known.contains(id) && seen.insert(*id))
        .collect();
    out.extend(tokens.iter().map(|t| t.id).filter(|id| seen.insert(*id)));
    out
}

fn ordered<'a>(tokens: &'a [Token], order: &[TokenId]) -> Vec<&'a Token> {
    merged_order(tokens, order)
        .into_iter()
        .filter_map(|id| tokens.iter().find(|t| t.id == id))
        .collect()
}

// ─── Scene ───────────────────────────────────────────────────────────────

/// A named, self-contained map + tokens bundle held on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    pub map_image: Option<String>,
    pub warp: WarpQuad,
    pub view: ViewWindow,
    pub strokes: Vec<Stroke>,
    pub tokens: Vec<Token>,
    pub token_order: Vec<TokenId>,
}

impl Scene {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            id: SceneId::generate(),
            name: name.into(),
            map_image: None,
            warp: WarpQuad::default(),
            view: ViewWindow::default(),
            strokes: Vec::new(),
            tokens: Vec::new(),
            token_order: Vec::new(),
        }
    }

    /// Capture the session's current map and tokens as a new scene.
    pub fn from_session(session: &Session, name: impl Into<String>) -> Self {
        Self {
            id: SceneId::generate(),
            name: name.into(),
            map_image: session.map.image_url.clone(),
            warp: session.map.warp,
            view: session.map.view,
            strokes: session.map.strokes.clone(),
            tokens: session.tokens.clone(),
            token_order: session.token_order.clone(),
        }
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }

    pub fn token_mut(&mut self, id: TokenId) -> Option<&mut Token> {
        self.tokens.iter_mut().find(|t| t.id == id)
    }

    pub fn stroke_mut(&mut self, id: StrokeId) -> Option<&mut Stroke> {
        self.strokes.iter_mut().find(|s| s.id == id)
    }

    pub fn ordered_tokens(&self) -> Vec<&Token> {
        ordered(&self.tokens, &self.token_order)
    }

    pub fn add_token(&mut self, token: Token) {
        self.token_order.push(token.id);
        self.tokens.push(token);
    }

    pub fn remove_token(&mut self, id: TokenId) -> Option<Token> {
        let pos = self.tokens.iter().position(|t| t.id == id)?;
        self.token_order.retain(|t| *t != id);
        Some(self.tokens.remove(pos))
    }

    /// Rewrite token ids after the store assigned its own on creation.
    pub fn remap_token_ids(&mut self, remap: &HashMap<TokenId, TokenId>) {
        if remap.is_empty() {
            return;
        }
        for token in &mut self.tokens {
            if let Some(new_id) = remap.get(&token.id) {
                token.id = *new_id;
            }
        }
        for id in &mut self.token_order {
            if let Some(new_id) = remap.get(id) {
                *id = *new_id;
            }
        }
    }
}
