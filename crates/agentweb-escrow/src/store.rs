//! Session persistence.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::session::{PaymentSession, SessionId};

/// Key-value store for payment sessions. Last write wins.
pub trait SessionStore: Send + Sync + 'static {
    /// Fetch a session.
    fn get(&self, id: &SessionId) -> Option<PaymentSession>;

    /// Insert or replace a session.
    fn put(&self, session: PaymentSession);

    /// Mutate a session in place and return the updated copy.
    fn update<F>(&self, id: &SessionId, f: F) -> Option<PaymentSession>
    where
        F: FnOnce(&mut PaymentSession);

    /// All stored sessions, oldest first.
    fn list(&self) -> Vec<PaymentSession>;
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, PaymentSession>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &SessionId) -> Option<PaymentSession> {
        self.sessions.read().get(id).cloned()
    }

    fn put(&self, session: PaymentSession) {
        self.sessions.write().insert(session.id.clone(), session);
    }

    fn update<F>(&self, id: &SessionId, f: F) -> Option<PaymentSession>
    where
        F: FnOnce(&mut PaymentSession),
    {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(id)?;
        f(session);
        Some(session.clone())
    }

    fn list(&self) -> Vec<PaymentSession> {
        let mut sessions: Vec<_> = self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }
}
