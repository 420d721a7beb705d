//! Client-side scene library. Exactly one scene is active; the library is
//! never empty.

use crate::error::SceneError;
use serde::{Deserialize, Serialize};
use tc_core::{Scene, SceneId, Session};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLibrary {
    scenes: Vec<Scene>,
    active: SceneId,
}

impl SceneLibrary {
    pub fn new(first: Scene) -> Self {
        Self {
            active: first.id,
            scenes: vec![first],
        }
    }

    /// A library whose only scene mirrors the session.
    pub fn from_session(session: &Session, name: impl Into<String>) -> Self {
        Self::new(Scene::from_session(session, name))
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    pub fn get(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn active_id(&self) -> SceneId {
        self.active
    }

    fn active_index(&self) -> usize {
        // `active` always names a scene in the list.
        self.scenes
            .iter()
            .position(|s| s.id == self.active)
            .unwrap_or(0)
    }

    pub fn active(&self) -> &Scene {
        &self.scenes[self.active_index()]
    }

    pub fn active_mut(&mut self) -> &mut Scene {
        let index = self.active_index();
        &mut self.scenes[index]
    }

    /// Add a scene without activating it.
    pub fn insert(&mut self, scene: Scene) -> SceneId {
        let id = scene.id;
        self.scenes.push(scene);
        id
    }

    pub fn capture_session(&mut self, session: &Session, name: impl Into<String>) -> SceneId {
        self.insert(Scene::from_session(session, name))
    }

    /// Copy the active scene under a new id and name. Token ids are kept so
    /// switching between the copies updates the same session tokens.
    pub fn clone_active(&mut self, name: impl Into<String>) -> SceneId {
        let mut copy = self.active().clone();
        copy.id = SceneId::generate();
        copy.name = name.into();
        self.insert(copy)
    }

    pub fn rename(&mut self, id: SceneId, name: impl Into<String>) -> Result<(), SceneError> {
        let scene = self
            .scenes
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(SceneError::NotFound(id))?;
        scene.name = name.into();
        Ok(())
    }

    pub fn activate(&mut self, id: SceneId) -> Result<&Scene, SceneError> {
        if self.get(id).is_none() {
            return Err(SceneError::NotFound(id));
        }
        if self.active != id {
            log::debug!("activating scene {id}");
        }
        self.active = id;
        Ok(self.active())
    }

    /// Remove a scene. Removing the active one activates its neighbour.
    pub fn remove(&mut self, id: SceneId) -> Result<Scene, SceneError> {
        let index = self
            .scenes
            .iter()
            .position(|s| s.id == id)
            .ok_or(SceneError::NotFound(id))?;
        if self.scenes.len() == 1 {
            return Err(SceneError::LastScene);
        }
        let removed = self.scenes.remove(index);
        if self.active == id {
            self.active = self.scenes[index.min(self.scenes.len() - 1)].id;
        }
        Ok(removed)
    }

    /// MessagePack blob of the whole library.
    pub fn export(&self) -> Result<Vec<u8>, SceneError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn import(bytes: &[u8]) -> Result<Self, SceneError> {
        let mut library: SceneLibrary = rmp_serde::from_slice(bytes)?;
        if library.scenes.is_empty() {
            return Err(SceneError::Empty);
        }
        if library.get(library.active).is_none() {
            log::warn!("imported library names a missing active scene; using the first");
            library.active = library.scenes[0].id;
        }
        Ok(library)
    }
}
