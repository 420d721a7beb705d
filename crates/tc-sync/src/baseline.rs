//! The editor's last-known copy of the remote session.
//!
//! Written by the push channel and by store responses, always replaced
//! wholesale and never mutated in place. Readers clone the `Arc`.

use std::sync::Arc;
use tc_core::Session;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Baseline {
    tx: Arc<watch::Sender<Option<Arc<Session>>>>,
}

impl Default for Baseline {
    fn default() -> Self {
        Self::new()
    }
}

impl Baseline {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn replace(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.tx.send_replace(Some(Arc::clone(&session)));
        session
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.tx.borrow().clone()
    }

    /// Change notifications, one per replacement.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Session>>> {
        self.tx.subscribe()
    }
}
