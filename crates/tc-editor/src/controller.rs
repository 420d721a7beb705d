//! Session-scoped controller: owns everything whose lifetime is "while
//! this session is open in the editor".
//!
//! `start` fetches the session, seeds the scene library, and opens the
//! live channel. `stop` flushes any pending commit and closes the channel.
//! Between the two, the embedding application feeds input through
//! `handle_input`, calls `tick` on a timer, and awaits `next_snapshot`.

use crate::config::EditorConfig;
use crate::debounce::Debouncer;
use crate::error::EditorError;
use crate::input::InputEvent;
use crate::reconcile::{Outcome, Reconciler, reconcile};
use crate::scenes::SceneLibrary;
use crate::tools::{Interaction, SceneEdit, ToolKind};
use kurbo::Point;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tc_core::{PresetId, Scene, SceneId, Session, Token, TokenId, TokenKind, TokenPatch, ViewWindow};
use tc_render::{Audience, Overlay, OverlaySource};
use tc_sync::{Baseline, ChannelState, Connector, LiveChannel, PresetFields, SessionStore};
use tokio::sync::watch;

pub struct SessionController<S: SessionStore> {
    store: Arc<S>,
    session_id: String,
    config: EditorConfig,
    baseline: Baseline,
    updates: watch::Receiver<Option<Arc<Session>>>,
    scenes: SceneLibrary,
    interaction: Interaction,
    view_commit: Debouncer<ViewWindow>,
    reconciler: Reconciler,
    channel: Option<LiveChannel>,
    overlay: Overlay,
    /// The active scene has edits the session has not seen.
    dirty: bool,
    /// A warp handle moved during the live drag; commit on release.
    warp_moved: bool,
    last_error: Option<String>,
}

impl<S: SessionStore> SessionController<S> {
    pub async fn start<C: Connector>(
        store: Arc<S>,
        session_id: &str,
        config: EditorConfig,
        connector: C,
    ) -> Result<Self, EditorError> {
        let session = store.session(session_id).await?;
        let baseline = Baseline::new();
        baseline.replace(session.clone());
        let updates = baseline.subscribe();

        let channel = LiveChannel::spawn(
            connector,
            session.id.clone(),
            baseline.clone(),
            config.sync.reconnect_policy(),
        );
        let name = session.name.clone().unwrap_or_else(|| "Scene 1".to_string());
        let scenes = SceneLibrary::from_session(&session, name);
        log::info!("editing session {}", session.id);

        let mut controller = Self {
            store,
            session_id: session.id,
            interaction: Interaction::new(config.tool_settings()),
            view_commit: Debouncer::new(config.view_debounce()),
            config,
            baseline,
            updates,
            scenes,
            reconciler: Reconciler::new(),
            channel: Some(channel),
            overlay: Overlay::default(),
            dirty: false,
            warp_moved: false,
            last_error: None,
        };
        controller.recompute();
        Ok(controller)
    }

    /// Flush pending commits, then close the live channel. A drag still
    /// live at this point is committed as if the pointer had been released.
    pub async fn stop(mut self) -> Result<(), EditorError> {
        self.settle_interaction();
        if let Some(view) = self.view_commit.flush() {
            log::debug!("flushing view {view:?} on stop");
            self.dirty = true;
        }
        let result = if self.dirty {
            self.sync().await.map(|_| ())
        } else {
            Ok(())
        };
        if let Some(channel) = self.channel.take() {
            channel.stop().await;
        }
        log::info!("stopped editing {}", self.session_id);
        result
    }

    /// Commit whatever the live interaction has produced so far, then
    /// return it to idle.
    fn settle_interaction(&mut self) {
        if let Some((id, to)) = self.interaction.token_draft() {
            SceneEdit::MoveToken { id, to }.apply(self.scenes.active_mut());
            self.dirty = true;
        }
        if let Some(stroke) = self.interaction.stroke_in_progress().cloned() {
            SceneEdit::AddStroke(stroke).apply(self.scenes.active_mut());
            self.dirty = true;
        }
        if std::mem::take(&mut self.warp_moved) {
            self.dirty = true;
        }
        self.interaction.set_tool(self.interaction.tool);
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn baseline(&self) -> Option<Arc<Session>> {
        self.baseline.current()
    }

    pub fn scenes(&self) -> &SceneLibrary {
        &self.scenes
    }

    pub fn active_scene(&self) -> &Scene {
        self.scenes.active()
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel
            .as_ref()
            .map_or(ChannelState::Closed, LiveChannel::state)
    }

    /// The message for the last failed sync, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn needs_sync(&self) -> bool {
        self.dirty
    }

    /// When `tick` next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.view_commit.deadline()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.interaction.set_tool(tool);
        self.warp_moved = false;
        self.recompute();
    }

    // ─── Input ──────────────────────────────────────────────────────────

    /// Apply one input event to the active scene. Returns `true` when the
    /// scene now has uncommitted edits that `sync` (or `tick`) should push.
    pub fn handle_input(&mut self, event: &InputEvent, now: Instant) -> bool {
        let edits = self.interaction.handle(event, self.scenes.active());
        for edit in edits {
            match &edit {
                SceneEdit::SetView(view) => self.view_commit.schedule(*view, now),
                SceneEdit::SetWarp(_) => self.warp_moved = true,
                _ => self.dirty = true,
            }
            edit.apply(self.scenes.active_mut());
        }
        if event.ends_interaction() {
            if self.view_commit.flush().is_some() {
                self.dirty = true;
            }
            if std::mem::take(&mut self.warp_moved) {
                self.dirty = true;
            }
        }
        self.recompute();
        self.dirty
    }

    /// Commit a debounced view change once its delay has passed, and any
    /// other outstanding edits while no drag is live.
    pub async fn tick(&mut self, now: Instant) -> Result<Option<Outcome>, EditorError> {
        if let Some(view) = self.view_commit.poll(now) {
            log::debug!("committing view {view:?}");
            self.dirty = true;
        }
        if self.dirty && self.interaction.is_idle() {
            return self.sync().await.map(Some);
        }
        Ok(None)
    }

    // ─── Sync ───────────────────────────────────────────────────────────

    /// Reconcile the active scene into the session.
    ///
    /// Plans from a fresh read: pushed snapshots can trail the store.
    pub async fn sync(&mut self) -> Result<Outcome, EditorError> {
        let current = self.store.session(&self.session_id).await?;
        let result = self
            .reconciler
            .run(&*self.store, self.scenes.active_mut(), current)
            .await;
        match result {
            Ok(outcome) => {
                if let Outcome::Converged { session, .. } = &outcome {
                    self.baseline.replace(session.clone());
                    self.dirty = false;
                    self.last_error = None;
                }
                self.recompute();
                Ok(outcome)
            }
            Err(e) => {
                self.baseline.replace(e.baseline.clone());
                self.last_error = Some(e.user_message());
                self.recompute();
                Err(e.into())
            }
        }
    }

    /// Wait for the next pushed snapshot. `None` once the channel is gone.
    pub async fn next_snapshot(&mut self) -> Option<Arc<Session>> {
        self.updates.changed().await.ok()?;
        let snapshot = self.updates.borrow_and_update().clone();
        self.recompute();
        snapshot
    }

    /// React to a pushed snapshot: re-converge if it disagrees with the
    /// active scene and no drag is live.
    pub async fn on_snapshot(&mut self) -> Result<Outcome, EditorError> {
        if !self.config.resync_on_push || !self.interaction.is_idle() {
            return Ok(Outcome::Skipped);
        }
        let Some(current) = self.baseline.current() else {
            return Ok(Outcome::Skipped);
        };
        if reconcile(self.scenes.active(), &current).is_empty() {
            return Ok(Outcome::Converged {
                session: Session::clone(&current),
                applied: 0,
                remapped: HashMap::new(),
            });
        }
        self.sync().await
    }

    // ─── Scenes ─────────────────────────────────────────────────────────

    /// Switch the active scene and converge the session onto it.
    pub async fn activate_scene(&mut self, id: SceneId) -> Result<Outcome, EditorError> {
        self.scenes.activate(id)?;
        self.interaction.set_tool(self.interaction.tool);
        self.view_commit.cancel();
        self.warp_moved = false;
        self.dirty = true;
        self.recompute();
        self.sync().await
    }

    pub fn clone_active_scene(&mut self, name: impl Into<String>) -> SceneId {
        self.scenes.clone_active(name)
    }

    /// Capture the session as it is now as a new, inactive scene.
    pub fn capture_session(&mut self, name: impl Into<String>) -> Option<SceneId> {
        let session = self.baseline.current()?;
        Some(self.scenes.capture_session(&session, name))
    }

    pub fn rename_scene(&mut self, id: SceneId, name: impl Into<String>) -> Result<(), EditorError> {
        Ok(self.scenes.rename(id, name)?)
    }

    pub async fn remove_scene(&mut self, id: SceneId) -> Result<(), EditorError> {
        let was_active = self.scenes.active_id() == id;
        self.scenes.remove(id)?;
        if was_active {
            self.dirty = true;
            self.recompute();
            self.sync().await?;
        }
        Ok(())
    }

    pub fn export_scenes(&self) -> Result<Vec<u8>, EditorError> {
        Ok(self.scenes.export()?)
    }

    /// Replace the library with an exported one and converge onto its
    /// active scene.
    pub async fn import_scenes(&mut self, bytes: &[u8]) -> Result<Outcome, EditorError> {
        self.scenes = SceneLibrary::import(bytes)?;
        self.interaction.set_tool(self.interaction.tool);
        self.dirty = true;
        self.recompute();
        self.sync().await
    }

    // ─── Tokens ─────────────────────────────────────────────────────────

    /// Stamp a token from the session's preset library. Returns the id the
    /// token ended up with in the session.
    pub async fn spawn_from_preset(&mut self, preset: PresetId, at: Point) -> Result<TokenId, EditorError> {
        let template = self
            .baseline
            .current()
            .and_then(|s| s.preset(preset).cloned())
            .ok_or(EditorError::UnknownPreset(preset))?;
        self.add_token(template.spawn(at)).await
    }

    /// One-off token not backed by a preset.
    pub async fn create_token(
        &mut self,
        name: impl Into<String>,
        kind: TokenKind,
        at: Point,
    ) -> Result<TokenId, EditorError> {
        let mut token = Token::new(TokenId::generate(), name);
        token.kind = kind;
        token.set_position(at);
        self.add_token(token).await
    }

    async fn add_token(&mut self, token: Token) -> Result<TokenId, EditorError> {
        let id = token.id;
        self.scenes.active_mut().add_token(token);
        self.dirty = true;
        match self.sync().await? {
            Outcome::Converged { remapped, .. } => Ok(remapped.get(&id).copied().unwrap_or(id)),
            Outcome::Skipped => Ok(id),
        }
    }

    pub async fn update_token(&mut self, id: TokenId, patch: &TokenPatch) -> Result<Outcome, EditorError> {
        let token = self
            .scenes
            .active_mut()
            .token_mut(id)
            .ok_or(EditorError::UnknownToken(id))?;
        patch.apply_to(token);
        self.dirty = true;
        self.sync().await
    }

    pub async fn remove_token(&mut self, id: TokenId) -> Result<Outcome, EditorError> {
        self.scenes
            .active_mut()
            .remove_token(id)
            .ok_or(EditorError::UnknownToken(id))?;
        self.dirty = true;
        self.sync().await
    }

    // ─── Presets ────────────────────────────────────────────────────────

    /// Presets live on the session only, so these go straight to the store.
    pub async fn add_preset(&mut self, fields: &PresetFields) -> Result<Option<PresetId>, EditorError> {
        let session = self.store.add_preset(&self.session_id, fields).await?;
        let id = session.presets.last().map(|p| p.id);
        self.baseline.replace(session);
        Ok(id)
    }

    pub async fn remove_preset(&mut self, id: PresetId) -> Result<(), EditorError> {
        let session = self.store.remove_preset(&self.session_id, id).await?;
        self.baseline.replace(session);
        Ok(())
    }

    // ─── Overlay ────────────────────────────────────────────────────────

    /// Rebuild the editor overlay. Called after every committed change.
    fn recompute(&mut self) {
        let grid = self.baseline.current().and_then(|s| s.map.grid_size);
        let surface = self.config.surface();
        let preview = self.interaction.token_draft().map(|(id, draft)| {
            let mut preview = self.scenes.active().clone();
            if let Some(token) = preview.token_mut(id) {
                token.set_position(draft);
            }
            preview
        });
        let scene = preview.as_ref().unwrap_or_else(|| self.scenes.active());
        self.overlay = Overlay::recompute(
            OverlaySource::Scene {
                scene,
                grid_size: grid,
            },
            Audience::Editor,
            surface,
        );
    }
}
