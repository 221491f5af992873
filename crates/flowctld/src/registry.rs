//! Registry of connected datapaths.
//!
//! The registry is the only shared mutable state in the controller. It is
//! injected into both the southbound event handlers and the REST adapter.
//! Entries are published as complete `Arc<DatapathSession>` values, so a
//! concurrent lookup sees either the old session, the new one, or nothing.

use crate::session::DatapathSession;
use dashmap::DashMap;
use flowctl_types::DatapathId;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DatapathRegistry {
    sessions: DashMap<DatapathId, Arc<DatapathSession>>,
}

impl DatapathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the session for `id`.
    pub fn register(&self, id: DatapathId, session: Arc<DatapathSession>) {
        if self.sessions.insert(id, session).is_some() {
            debug!(dpid = %id, "Replaced existing session");
        }
    }

    /// Returns the live session for `id`, if connected.
    pub fn lookup(&self, id: DatapathId) -> Option<Arc<DatapathSession>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes the entry for `id`. Returns whether one was present.
    pub fn unregister(&self, id: DatapathId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Removes the entry for `id` only if it still holds `session`.
    ///
    /// A switch that reconnects before its old connection is torn down must
    /// keep the newer session.
    pub fn unregister_session(&self, id: DatapathId, session: &Arc<DatapathSession>) -> bool {
        self.sessions
            .remove_if(&id, |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sorted snapshot of the connected datapath ids.
    pub fn ids(&self) -> Vec<DatapathId> {
        let mut ids: Vec<DatapathId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }
}
