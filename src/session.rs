//! In-memory session store.
//!
//! Sessions are ephemeral by design: a restart loses all of them, and callers
//! must treat session identifiers as soft. Each session holds a bounded
//! sliding window of turns; the oldest turn is evicted first.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::traits::{Turn, TurnRole};

pub struct SessionStore {
    sessions: RwLock<HashMap<String, VecDeque<Turn>>>,
    cap: usize,
}

impl SessionStore {
    pub fn new(cap: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            cap,
        }
    }

    /// Allocate a fresh session id.
    pub async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), VecDeque::new());
        id
    }

    /// Append a turn, creating the session implicitly if unknown. The length
    /// cap is enforced under the same write lock so concurrent appends can
    /// neither lose turns nor exceed the cap.
    pub async fn append(&self, session_id: &str, role: TurnRole, content: &str) {
        let mut sessions = self.sessions.write().await;
        let turns = sessions
            .entry(session_id.to_string())
            .or_insert_with(VecDeque::new);
        turns.push_back(Turn {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        while turns.len() > self.cap {
            turns.pop_front();
        }
        tracing::debug!(
            session_id,
            role = role.as_str(),
            len = turns.len(),
            cap = self.cap,
            "Session turn appended"
        );
    }

    /// Ordered history for a session; empty for unknown ids, never an error.
    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }
}
