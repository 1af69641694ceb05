//! In-memory conversation sessions.
//!
//! Each session has its own async mutex, so turns of one session run one after
//! another while different sessions proceed independently. A turn runs on a
//! copy of the conversation and is committed only when it succeeds.
//! Conversations do not survive a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::agent::{Agent, TurnOutcome};
use crate::error::AgentError;
use crate::message::ConversationState;

type SessionSlot = Arc<tokio::sync::Mutex<ConversationState>>;

struct SessionMap {
    entries: HashMap<String, SessionSlot>,
    lru: VecDeque<String>,
}

impl SessionMap {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key.to_string());
    }

    fn get_or_insert(&mut self, key: &str, max_entries: usize) -> SessionSlot {
        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(ConversationState::default())))
            .clone();
        self.touch(key);

        while self.lru.len() > max_entries {
            if let Some(oldest) = self.lru.pop_front() {
                tracing::debug!(session = %oldest, "evicting idle session");
                self.entries.remove(&oldest);
            }
        }
        slot
    }
}

pub struct SessionStore {
    sessions: Mutex<SessionMap>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(SessionMap {
                entries: HashMap::new(),
                lru: VecDeque::new(),
            }),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one turn. Without a session id the turn uses a throwaway
    /// conversation; with one, history accumulates across turns.
    pub async fn run_turn(
        &self,
        agent: &Agent,
        session_id: Option<&str>,
        query: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let Some(id) = session_id else {
            return agent.ask(query).await;
        };

        let slot = self.sessions.lock().get_or_insert(id, self.max_sessions);
        let mut committed = slot.lock().await;

        let mut working = committed.clone();
        working.begin_turn(query)?;
        let outcome = agent.run_turn(&mut working).await?;
        *committed = working;

        tracing::debug!(session = %id, messages = committed.messages().len(), "session updated");
        Ok(outcome)
    }

    /// Copy of a session's committed conversation.
    pub async fn snapshot(&self, session_id: &str) -> Option<ConversationState> {
        let slot = self.sessions.lock().entries.get(session_id).cloned()?;
        let state = slot.lock().await;
        Some(state.clone())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_SESSIONS)
    }
}
