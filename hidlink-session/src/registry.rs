//! Registry of live sessions
//!
//! The disconnect monitor only knows device paths. The registry maps them
//! back to sessions without keeping any session alive: entries are weak and
//! are removed at the start of `close`, so a removal event racing with a
//! close either finds a live session or nothing at all.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::session::{DisconnectReason, SessionShared};
use crate::types::SessionId;

static GLOBAL_REGISTRY: OnceLock<Arc<SessionRegistry>> = OnceLock::new();

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Weak<SessionShared>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry shared by the hidapi open path and its monitor
    pub fn global() -> Arc<SessionRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(SessionRegistry::new()))
            .clone()
    }

    pub(crate) fn insert(&self, shared: &Arc<SessionShared>) {
        let mut sessions = self.sessions.write();
        sessions.retain(|_, weak| weak.strong_count() > 0);
        sessions.insert(shared.id(), Arc::downgrade(shared));
    }

    pub(crate) fn remove(&self, id: SessionId) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    pub(crate) fn lookup(&self, id: SessionId) -> Option<Arc<SessionShared>> {
        self.sessions.read().get(&id).and_then(Weak::upgrade)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.lookup(id).is_some()
    }

    /// Number of live registered sessions
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Mark every session open on `path` as disconnected
    ///
    /// Sessions are collected under the read lock and notified after it is
    /// released, so disconnect callbacks may open or close sessions.
    /// Returns how many sessions transitioned.
    pub fn notify_removed(&self, path: &str) -> usize {
        let matching: Vec<Arc<SessionShared>> = self
            .sessions
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .filter(|shared| shared.path() == path)
            .collect();

        let count = matching
            .iter()
            .filter(|shared| shared.mark_disconnected(DisconnectReason::Removed))
            .count();
        debug!("Removal of {} disconnected {} session(s)", path, count);
        count
    }
}
