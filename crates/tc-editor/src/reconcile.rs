//! Scene reconciliation: converge the authoritative session onto the
//! active scene with the fewest store calls.
//!
//! Steps run in a fixed order, each only when its comparison fails:
//!
//! | step | compares | operation |
//! |------|----------|-----------|
//! | `MapImage` | image reference, exact | `SetMapImage` |
//! | `Warp` | corners, `1e-4` | `SetWarp` |
//! | `View` | normalized view, `1e-4`, rotation on the circle | `SetView` |
//! | `Strokes` | ordered list, point-wise `1e-4` | `SetStrokes` |
//! | `RemoveTokens` | ids in session but not scene | `RemoveToken` × n |
//! | `UpsertTokens` | field-wise per token | `UpdateToken` / `AddToken` |
//! | `TokenOrder` | resulting order | `SetTokenOrder` |
//!
//! `reconcile` is the pure planner: it simulates the store's write rules on
//! a local copy so later steps see the effect of earlier ones. `Reconciler`
//! executes against a real store and re-plans each step from the snapshot
//! the previous call returned.

use crate::error::ReconcileError;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tc_core::compare::{strokes_eq, views_eq, warps_eq};
use tc_core::stroke::Stroke;
use tc_core::{
    Scene, Session, TokenFields, TokenId, TokenPatch, ViewWindow, WarpQuad, merged_order,
    normalize_view,
};
use tc_sync::{SessionStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    MapImage,
    Warp,
    View,
    Strokes,
    RemoveTokens,
    UpsertTokens,
    TokenOrder,
}

impl Step {
    pub const ORDER: [Step; 7] = [
        Step::MapImage,
        Step::Warp,
        Step::View,
        Step::Strokes,
        Step::RemoveTokens,
        Step::UpsertTokens,
        Step::TokenOrder,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            Step::MapImage => "the map image",
            Step::Warp => "the warp calibration",
            Step::View => "the view",
            Step::Strokes => "the drawings",
            Step::RemoveTokens => "removed tokens",
            Step::UpsertTokens => "tokens",
            Step::TokenOrder => "the token order",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    SetMapImage(Option<String>),
    SetWarp(WarpQuad),
    SetView(ViewWindow),
    SetStrokes(Vec<Stroke>),
    RemoveToken(TokenId),
    UpdateToken { id: TokenId, patch: TokenPatch },
    AddToken(TokenFields),
    SetTokenOrder(Vec<TokenId>),
}

impl Operation {
    pub fn step(&self) -> Step {
        match self {
            Operation::SetMapImage(_) => Step::MapImage,
            Operation::SetWarp(_) => Step::Warp,
            Operation::SetView(_) => Step::View,
            Operation::SetStrokes(_) => Step::Strokes,
            Operation::RemoveToken(_) => Step::RemoveTokens,
            Operation::UpdateToken { .. } | Operation::AddToken(_) => Step::UpsertTokens,
            Operation::SetTokenOrder(_) => Step::TokenOrder,
        }
    }

    /// Apply with the store's write rules, honoring requested token ids.
    pub fn apply_to(&self, session: &mut Session) {
        match self {
            Operation::SetMapImage(url) => session.map.image_url = url.clone(),
            Operation::SetWarp(warp) => session.map.warp = *warp,
            Operation::SetView(view) => session.set_view(*view),
            Operation::SetStrokes(strokes) => session.map.strokes = strokes.clone(),
            Operation::RemoveToken(id) => {
                session.delete_token(*id);
            }
            Operation::UpdateToken { id, patch } => {
                session.patch_token(*id, patch);
            }
            Operation::AddToken(fields) => {
                let id = fields.id.unwrap_or_else(TokenId::generate);
                session.insert_token(fields.clone(), id);
            }
            Operation::SetTokenOrder(order) => session.reorder_tokens(order),
        }
    }

    pub async fn execute<S: SessionStore>(&self, store: &S, session: &str) -> Result<Session, StoreError> {
        match self {
            Operation::SetMapImage(url) => store.set_map_image(session, url.as_deref()).await,
            Operation::SetWarp(warp) => store.set_warp(session, warp).await,
            Operation::SetView(view) => store.set_view(session, view).await,
            Operation::SetStrokes(strokes) => store.set_strokes(session, strokes).await,
            Operation::RemoveToken(id) => store.remove_token(session, *id).await,
            Operation::UpdateToken { id, patch } => store.update_token(session, *id, patch).await,
            Operation::AddToken(fields) => store.add_token(session, fields).await,
            Operation::SetTokenOrder(order) => store.set_token_order(session, order).await,
        }
    }
}

/// Empty image references mean "no image" on both sides.
fn image_ref(url: Option<&str>) -> Option<&str> {
    url.filter(|u| !u.is_empty())
}

/// Token order the session should end with: the scene's order restricted
/// to tokens the session now holds, then any the order does not name.
fn desired_order(scene: &Scene, current: &Session) -> Vec<TokenId> {
    merged_order(&scene.tokens, &scene.token_order)
        .into_iter()
        .filter(|id| current.token(*id).is_some())
        .collect()
}

/// The operations one step needs, given the current baseline.
pub fn plan_step(step: Step, scene: &Scene, current: &Session) -> Vec<Operation> {
    match step {
        Step::MapImage => {
            let target = image_ref(scene.map_image.as_deref());
            (image_ref(current.map.image_url.as_deref()) != target)
                .then(|| Operation::SetMapImage(target.map(str::to_string)))
                .into_iter()
                .collect()
        }
        Step::Warp => (!warps_eq(&current.map.warp, &scene.warp))
            .then_some(Operation::SetWarp(scene.warp))
            .into_iter()
            .collect(),
        Step::View => {
            let target = normalize_view(scene.view);
            (!views_eq(&current.map.view, &target))
                .then_some(Operation::SetView(target))
                .into_iter()
                .collect()
        }
        Step::Strokes => (!strokes_eq(&current.map.strokes, &scene.strokes))
            .then(|| Operation::SetStrokes(scene.strokes.clone()))
            .into_iter()
            .collect(),
        Step::RemoveTokens => current
            .ordered_tokens()
            .into_iter()
            .filter(|t| scene.token(t.id).is_none())
            .map(|t| Operation::RemoveToken(t.id))
            .collect(),
        Step::UpsertTokens => scene
            .ordered_tokens()
            .into_iter()
            .filter_map(|target| match current.token(target.id) {
                Some(existing) => TokenPatch::between(existing, target)
                    .map(|patch| Operation::UpdateToken { id: target.id, patch }),
                None => Some(Operation::AddToken(TokenFields::from(target))),
            })
            .collect(),
        Step::TokenOrder => {
            let desired = desired_order(scene, current);
            (desired != current.token_order)
                .then_some(Operation::SetTokenOrder(desired))
                .into_iter()
                .collect()
        }
    }
}

/// Every operation needed to make `session` match `scene`, in execution
/// order. Empty when they already agree.
pub fn reconcile(scene: &Scene, session: &Session) -> Vec<Operation> {
    let mut simulated = session.clone();
    let mut ops = Vec::new();
    for step in Step::ORDER {
        for op in plan_step(step, scene, &simulated) {
            op.apply_to(&mut simulated);
            ops.push(op);
        }
    }
    ops
}

// ─── Executor ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Another run was in flight; this trigger was dropped.
    Skipped,
    Converged {
        session: Session,
        applied: usize,
        /// Requested token id → id the store assigned.
        remapped: HashMap<TokenId, TokenId>,
    },
}

/// Runs reconciliation against a store, one run at a time.
#[derive(Debug, Default)]
pub struct Reconciler {
    running: AtomicBool,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Converge the store onto `scene`, starting from `current`.
    ///
    /// When the store assigns its own id to a created token, `scene` is
    /// rewritten to use it before the next step is planned.
    pub async fn run<S: SessionStore>(
        &self,
        store: &S,
        scene: &mut Scene,
        current: Session,
    ) -> Result<Outcome, ReconcileError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("reconcile already in flight for {}; trigger dropped", current.id);
            return Ok(Outcome::Skipped);
        }
        let _guard = RunGuard(&self.running);

        let session_id = current.id.clone();
        let mut current = current;
        let mut applied = 0;
        let mut remapped = HashMap::new();

        for step in Step::ORDER {
            for op in plan_step(step, scene, &current) {
                log::debug!("reconcile {session_id}: {op:?}");
                let next = match op.execute(store, &session_id).await {
                    Ok(next) => next,
                    Err(source) => {
                        log::warn!("reconcile {session_id} stopped at {step}: {source}");
                        return Err(ReconcileError {
                            step,
                            applied,
                            baseline: current,
                            remapped,
                            source,
                        });
                    }
                };
                if let Operation::AddToken(fields) = &op
                    && let Some(requested) = fields.id
                    && let Some(assigned) = assigned_id(&current, &next, requested)
                {
                    log::debug!("store assigned {assigned} for requested token {requested}");
                    remapped.insert(requested, assigned);
                    scene.remap_token_ids(&HashMap::from([(requested, assigned)]));
                }
                current = next;
                applied += 1;
            }
        }

        log::debug!("reconcile {session_id}: converged after {applied} operation(s)");
        Ok(Outcome::Converged {
            session: current,
            applied,
            remapped,
        })
    }
}

/// The id a store gave a token created under `requested`, when it did not
/// keep the requested one.
fn assigned_id(before: &Session, after: &Session, requested: TokenId) -> Option<TokenId> {
    if after.token(requested).is_some() {
        return None;
    }
    let mut fresh = after
        .tokens
        .iter()
        .map(|t| t.id)
        .filter(|id| before.token(*id).is_none());
    match (fresh.next(), fresh.next()) {
        (Some(id), None) => Some(id),
        _ => {
            log::warn!("cannot tell which token the store created for {requested}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tc_core::{Point, Token};

    fn token(id: &str) -> Token {
        Token::new(TokenId::intern(id), id.to_uppercase())
    }

    fn session_with(ids: &[&str]) -> Session {
        let mut session = Session::new("REC001");
        session.tokens = ids.iter().map(|id| token(id)).collect();
        session.sync_token_order();
        session
    }

    #[test]
    fn empty_when_scene_matches_session() {
        let mut session = session_with(&["a", "b"]);
        session.map.image_url = Some("http://host/map.png".into());
        session.map.view = ViewWindow::new(Point::new(0.4, 0.6), 2.0, 90.0);
        let scene = Scene::from_session(&session, "same");
        assert_eq!(reconcile(&scene, &session), vec![]);
    }

    #[test]
    fn empty_image_reference_matches_no_image() {
        let mut session = session_with(&["a"]);
        session.map.image_url = Some(String::new());
        let scene = Scene::from_session(&session, "same");
        assert_eq!(reconcile(&scene, &session), vec![]);

        let mut cleared = scene.clone();
        cleared.map_image = None;
        assert_eq!(reconcile(&cleared, &session), vec![]);
    }

    #[test]
    fn float_noise_is_not_a_change() {
        let session = session_with(&["a"]);
        let mut scene = Scene::from_session(&session, "noisy");
        scene.tokens[0].x += 5e-5;
        scene.view.rotation = 359.99999;
        assert_eq!(reconcile(&scene, &session), vec![]);
    }

    #[test]
    fn view_is_compared_after_normalizing() {
        let session = session_with(&[]);
        let mut scene = Scene::from_session(&session, "wide");
        scene.view.zoom = 0.05;
        // Normalizes to zoom 0.2, which the session does not have yet.
        let ops = reconcile(&scene, &session);
        assert_eq!(
            ops,
            vec![Operation::SetView(ViewWindow::new(Point::new(0.5, 0.5), 0.2, 0.0))]
        );
    }

    #[test]
    fn removal_precedes_reorder() {
        let session = session_with(&["a", "b", "c"]);
        let mut scene = Scene::from_session(&session, "trimmed");
        scene.remove_token(TokenId::intern("b"));
        scene.token_order = vec![TokenId::intern("c"), TokenId::intern("a")];

        let ops = reconcile(&scene, &session);
        assert_eq!(
            ops,
            vec![
                Operation::RemoveToken(TokenId::intern("b")),
                Operation::SetTokenOrder(vec![TokenId::intern("c"), TokenId::intern("a")]),
            ]
        );
    }

    #[test]
    fn steps_run_in_fixed_order() {
        let session = session_with(&["a"]);
        let mut scene = Scene::from_session(&session, "everything");
        scene.add_token(token("z"));
        scene.token_order.insert(0, TokenId::intern("z"));
        scene.token_order.pop();
        scene.tokens[0].visible = false;
        scene.strokes.push(Stroke::new(tc_core::StrokeId::intern("s"), "#f00", 2.0));
        scene.view.zoom = 2.0;
        scene.warp = scene.warp.with_corner(2, Point::new(0.9, 0.9));
        scene.map_image = Some("http://host/other.png".into());

        let steps: Vec<Step> = reconcile(&scene, &session).iter().map(Operation::step).collect();
        assert_eq!(
            steps,
            vec![
                Step::MapImage,
                Step::Warp,
                Step::View,
                Step::Strokes,
                Step::UpsertTokens,
                Step::UpsertTokens,
                Step::TokenOrder,
            ]
        );
    }

    #[test]
    fn created_tokens_follow_scene_order() {
        let session = session_with(&["a"]);
        let mut scene = Scene::from_session(&session, "new");
        scene.add_token(token("n"));
        scene.token_order = vec![TokenId::intern("n"), TokenId::intern("a")];

        let ops = reconcile(&scene, &session);
        assert!(matches!(&ops[0], Operation::AddToken(f) if f.id == Some(TokenId::intern("n"))));
        assert_eq!(
            ops[1],
            Operation::SetTokenOrder(vec![TokenId::intern("n"), TokenId::intern("a")])
        );
    }

    #[test]
    fn appended_token_needs_no_reorder() {
        let session = session_with(&["a"]);
        let mut scene = Scene::from_session(&session, "append");
        scene.add_token(token("b"));
        let ops = reconcile(&scene, &session);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].step(), Step::UpsertTokens);
    }

    #[test]
    fn clearing_the_map_image() {
        let mut session = session_with(&[]);
        session.map.image_url = Some("http://host/map.png".into());
        let mut scene = Scene::from_session(&session, "blank");
        scene.map_image = Some(String::new());
        assert_eq!(reconcile(&scene, &session), vec![Operation::SetMapImage(None)]);
    }
}
