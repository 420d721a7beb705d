//! In-process session store with the session server's write semantics:
//! upper-case session ids, clamped token positions, normalized views,
//! and token order repaired after every mutation. Every mutation is
//! broadcast the way the server pushes it over the socket.

use crate::channel::{Connector, PushStream};
use crate::error::{StoreError, SyncError};
use crate::protocol::PushMessage;
use crate::store::{PresetFields, PresetPatch, SessionStore, StoreResult};
use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tc_core::model::TokenPreset;
use tc_core::stroke::Stroke;
use tc_core::{PresetId, Session, TokenFields, TokenId, TokenPatch, ViewWindow, WarpQuad};
use tokio::sync::broadcast;

const UPDATE_CAPACITY: usize = 64;

fn normalize_session_id(id: &str) -> String {
    id.trim().to_uppercase()
}

fn generate_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_uppercase()
}

#[derive(Debug)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Session>>,
    updates: broadcast::Sender<Session>,
    assign_token_ids: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store that honors requested token ids.
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            sessions: Mutex::new(HashMap::new()),
            updates,
            assign_token_ids: false,
        }
    }

    /// A store that ignores requested token ids and assigns its own,
    /// as the HTTP server does.
    pub fn assigning_ids() -> Self {
        Self {
            assign_token_ids: true,
            ..Self::new()
        }
    }

    /// Every committed snapshot, across all sessions.
    pub fn subscribe(&self) -> broadcast::Receiver<Session> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self, session: &str) -> Option<Session> {
        self.sessions.lock().get(&normalize_session_id(session)).cloned()
    }

    fn mutate<F>(&self, session: &str, f: F) -> StoreResult
    where
        F: FnOnce(&mut Session, bool) -> Result<(), StoreError>,
    {
        let id = normalize_session_id(session);
        let snapshot = {
            let mut sessions = self.sessions.lock();
            let current = sessions
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;
            f(current, self.assign_token_ids)?;
            current.sync_token_order();
            current.clone()
        };
        log::debug!("session {id} mutated");
        // No subscribers is fine.
        let _ = self.updates.send(snapshot.clone());
        Ok(snapshot)
    }

    fn create(&self, name: Option<&str>, requested_id: Option<&str>) -> StoreResult {
        let mut sessions = self.sessions.lock();
        let id = match requested_id.map(normalize_session_id) {
            Some(id) if !id.is_empty() => {
                if sessions.contains_key(&id) {
                    return Err(StoreError::SessionExists(id));
                }
                id
            }
            _ => loop {
                let id = generate_session_id();
                if !sessions.contains_key(&id) {
                    break id;
                }
            },
        };
        let mut session = Session::new(id.clone());
        session.name = name.map(str::to_string);
        sessions.insert(id.clone(), session.clone());
        log::info!("created session {id}");
        Ok(session)
    }
}

fn preset_mut(session: &mut Session, id: PresetId) -> Result<&mut TokenPreset, StoreError> {
    session
        .presets
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| StoreError::NotFound(format!("preset {id}")))
}

impl SessionStore for MemoryStore {
    async fn create_session(&self, name: Option<&str>, requested_id: Option<&str>) -> StoreResult {
        self.create(name, requested_id)
    }

    async fn session(&self, session: &str) -> StoreResult {
        let id = normalize_session_id(session);
        self.snapshot(&id)
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))
    }

    async fn set_map_image(&self, session: &str, url: Option<&str>) -> StoreResult {
        self.mutate(session, |s, _| {
            s.map.image_url = url.filter(|u| !u.is_empty()).map(str::to_string);
            Ok(())
        })
    }

    async fn set_warp(&self, session: &str, warp: &WarpQuad) -> StoreResult {
        self.mutate(session, |s, _| {
            s.map.warp = *warp;
            Ok(())
        })
    }

    async fn set_view(&self, session: &str, view: &ViewWindow) -> StoreResult {
        self.mutate(session, |s, _| {
            s.set_view(*view);
            Ok(())
        })
    }

    async fn set_strokes(&self, session: &str, strokes: &[Stroke]) -> StoreResult {
        self.mutate(session, |s, _| {
            s.map.strokes = strokes.to_vec();
            Ok(())
        })
    }

    async fn add_token(&self, session: &str, fields: &TokenFields) -> StoreResult {
        self.mutate(session, |s, assign| {
            let id = match fields.id {
                Some(id) if !assign && s.token(id).is_none() => id,
                _ => TokenId::generate(),
            };
            s.insert_token(fields.clone(), id);
            Ok(())
        })
    }

    async fn update_token(&self, session: &str, id: TokenId, patch: &TokenPatch) -> StoreResult {
        self.mutate(session, |s, _| {
            if s.patch_token(id, patch) {
                Ok(())
            } else {
                Err(StoreError::NotFound(format!("token {id}")))
            }
        })
    }

    async fn remove_token(&self, session: &str, id: TokenId) -> StoreResult {
        self.mutate(session, |s, _| {
            if s.delete_token(id) {
                Ok(())
            } else {
                Err(StoreError::NotFound(format!("token {id}")))
            }
        })
    }

    async fn set_token_order(&self, session: &str, order: &[TokenId]) -> StoreResult {
        self.mutate(session, |s, _| {
            s.reorder_tokens(order);
            Ok(())
        })
    }

    async fn add_preset(&self, session: &str, fields: &PresetFields) -> StoreResult {
        self.mutate(session, |s, _| {
            s.presets.push(TokenPreset {
                id: PresetId::generate(),
                name: fields.name.clone(),
                kind: fields.kind,
                color: fields.color.clone(),
                stats: fields.stats.clone(),
                notes: fields.notes.clone().filter(|n| !n.is_empty()),
            });
            Ok(())
        })
    }

    async fn update_preset(&self, session: &str, id: PresetId, patch: &PresetPatch) -> StoreResult {
        self.mutate(session, |s, _| {
            let preset = preset_mut(s, id)?;
            if let Some(name) = &patch.name {
                preset.name = name.clone();
            }
            if let Some(kind) = patch.kind {
                preset.kind = kind;
            }
            if let Some(color) = &patch.color {
                preset.color = color.clone();
            }
            if let Some(stats) = &patch.stats {
                preset.stats = stats.clone();
            }
            if let Some(notes) = &patch.notes {
                preset.notes = (!notes.is_empty()).then(|| notes.clone());
            }
            Ok(())
        })
    }

    async fn remove_preset(&self, session: &str, id: PresetId) -> StoreResult {
        self.mutate(session, |s, _| {
            preset_mut(s, id)?;
            s.presets.retain(|p| p.id != id);
            Ok(())
        })
    }
}

// ─── In-process push channel ─────────────────────────────────────────────

/// Connects a `LiveChannel` to a `MemoryStore`: the current snapshot on
/// connect, then every committed mutation of that session, encoded as
/// push frames.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

fn encode(session: Session) -> Result<String, SyncError> {
    Ok(PushMessage::State(session).encode()?)
}

impl Connector for MemoryConnector {
    fn connect(&self, session: &str) -> impl Future<Output = Result<PushStream, SyncError>> + Send {
        let id = normalize_session_id(session);
        let rx = self.store.subscribe();
        let initial = self.store.snapshot(&id);
        async move {
            let initial = initial.ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;
            let updates = stream::unfold((rx, id), |(mut rx, id)| async move {
                loop {
                    match rx.recv().await {
                        Ok(session) if session.id == id => {
                            return Some((encode(session), (rx, id)));
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            log::warn!("push subscriber for {id} lagged by {n} updates");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            });
            Ok(stream::once(async move { encode(initial) })
                .chain(updates)
                .boxed())
        }
    }
}
