use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::events::SessionId;
use super::user_session::UserSession;

/// The set of joined sessions, keyed by session ID.
///
/// Every operation is a plain in-memory map operation: nothing here fails,
/// invariant violations (double add, double remove) are no-ops.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: DashMap<SessionId, Arc<UserSession>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Returns false and leaves the existing entry alone
    /// if the ID is already registered.
    pub fn add(&self, session: Arc<UserSession>) -> bool {
        match self.sessions.entry(session.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        }
    }

    /// Remove a session, handing it back if it was present.
    pub fn remove(&self, session_id: SessionId) -> Option<Arc<UserSession>> {
        self.sessions.remove(&session_id).map(|(_, session)| session)
    }

    /// Copy out the sessions registered right now. Callers iterate the copy,
    /// so joins and leaves never contend with a fan-out in progress.
    pub fn snapshot(&self) -> Vec<Arc<UserSession>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, session_id: SessionId) -> Option<Arc<UserSession>> {
        self.sessions.get(&session_id).map(|s| s.clone())
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
