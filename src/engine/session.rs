//! Per-customer session state
//!
//! A session is a runtime pointer into a flow's current node plus
//! accumulated context. The store enforces the single-active-session
//! invariant: starting a new flow deactivates the customer's existing
//! session. Deactivated sessions are kept, not deleted.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Context key holding the message that started the flow
pub const CTX_ORIGINAL_MESSAGE: &str = "original_message";
/// Context key holding the most recent free-text input
pub const CTX_LAST_INPUT: &str = "last_input";
/// Context key holding the most recent selection id
pub const CTX_SELECTION: &str = "selection";

/// A customer's runtime position in a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Store-assigned identifier
    pub id: u64,
    /// Customer identity
    pub customer: String,
    /// Name of the flow being executed (reference, not ownership)
    pub flow: String,
    /// Current node id; `None` means the session should be torn down
    pub current_node: Option<String>,
    /// Accumulated key/value state
    pub context: HashMap<String, String>,
    /// Whether the session is parked at a `choice`/`input` node
    pub awaiting_input: bool,
    /// Deactivated sessions are inert but preserved
    pub active: bool,
    /// When the flow started
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    sessions: Vec<Session>,
}

/// Owns all session records
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<Inner>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `customer` at `start_node` of `flow`.
    ///
    /// Any existing active session for the customer is deactivated first,
    /// so at most one active session per customer ever exists.
    pub fn start(
        &self,
        customer: &str,
        flow: &str,
        start_node: &str,
        original_message: &str,
    ) -> Session {
        let mut inner = self.lock();
        for session in &mut inner.sessions {
            if session.customer == customer && session.active {
                session.active = false;
                session.awaiting_input = false;
            }
        }

        inner.next_id += 1;
        let mut context = HashMap::new();
        context.insert(
            CTX_ORIGINAL_MESSAGE.to_string(),
            original_message.to_string(),
        );
        let session = Session {
            id: inner.next_id,
            customer: customer.to_string(),
            flow: flow.to_string(),
            current_node: Some(start_node.to_string()),
            context,
            awaiting_input: false,
            active: true,
            started_at: Utc::now(),
        };
        inner.sessions.push(session.clone());
        session
    }

    /// The customer's active session, if any.
    #[must_use]
    pub fn active(&self, customer: &str) -> Option<Session> {
        self.lock()
            .sessions
            .iter()
            .find(|s| s.customer == customer && s.active)
            .cloned()
    }

    /// Write back a mutated session by id. Unknown ids are ignored.
    pub fn save(&self, session: &Session) {
        let mut inner = self.lock();
        if let Some(slot) = inner.sessions.iter_mut().find(|s| s.id == session.id) {
            *slot = session.clone();
        }
    }

    /// All sessions for a customer, active or not, in creation order.
    #[must_use]
    pub fn all_for(&self, customer: &str) -> Vec<Session> {
        self.lock()
            .sessions
            .iter()
            .filter(|s| s.customer == customer)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
