// libs/agent-cell/src/services/session.rs
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::Turn;

/// Entities the conversation has already pinned down, carried so a later
/// elliptical turn ("book the 10:00 slot") can be resolved without the
/// user restating doctor or date.
#[derive(Debug, Clone, Default)]
pub struct ResolvedContext {
    pub doctor_name: Option<String>,
    pub date: Option<String>,
    pub slot_time: Option<String>,
}

impl ResolvedContext {
    pub fn is_empty(&self) -> bool {
        self.doctor_name.is_none() && self.date.is_none() && self.slot_time.is_none()
    }

    /// One-line summary injected into the system instruction.
    pub fn summary(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut parts = Vec::new();
        if let Some(ref doctor) = self.doctor_name {
            parts.push(format!("doctor={}", doctor));
        }
        if let Some(ref date) = self.date {
            parts.push(format!("date={}", date));
        }
        if let Some(ref slot) = self.slot_time {
            parts.push(format!("slot={}", slot));
        }
        Some(parts.join(", "))
    }
}

#[derive(Debug, Clone)]
struct ConversationSession {
    turns: Vec<Turn>,
    context: ResolvedContext,
    last_active: DateTime<Utc>,
}

impl ConversationSession {
    fn new() -> Self {
        Self {
            turns: Vec::new(),
            context: ResolvedContext::default(),
            last_active: Utc::now(),
        }
    }
}

/// In-memory per-session history keyed by an opaque id. Unknown ids start
/// a fresh session rather than erroring; idle sessions are evicted lazily
/// on next access.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, ConversationSession>>,
    idle_limit: Duration,
}

impl SessionStore {
    pub fn new(idle_minutes: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_limit: Duration::minutes(idle_minutes.max(1)),
        }
    }

    /// Resolves the session for an incoming prompt and appends the user
    /// turn. Returns the (possibly newly minted) session id, the turn
    /// history including the new prompt, and the resolved context.
    pub async fn begin_turn(
        &self,
        session_id: Option<String>,
        prompt: &str,
    ) -> (String, Vec<Turn>, ResolvedContext) {
        let id = session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut sessions = self.sessions.write().await;

        let expired = sessions
            .get(&id)
            .is_some_and(|s| Utc::now() - s.last_active > self.idle_limit);
        if expired {
            debug!("Session {} expired, starting fresh", id);
            sessions.remove(&id);
        }

        let session = sessions.entry(id.clone()).or_insert_with(|| {
            debug!("Starting new session {}", id);
            ConversationSession::new()
        });

        session.turns.push(Turn::user(prompt));
        session.last_active = Utc::now();

        (id, session.turns.clone(), session.context.clone())
    }

    /// Records a mid-loop turn (tool observation) so the next planning step
    /// sees it, preserving order within the session.
    pub async fn append(&self, session_id: &str, turn: Turn) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.turns.push(turn);
            session.last_active = Utc::now();
        }
    }

    /// Records the final assistant reply for the turn.
    pub async fn complete_turn(&self, session_id: &str, reply: &str) {
        self.append(session_id, Turn::assistant(reply)).await;
    }

    /// Merges newly resolved entities into the session context. `None`
    /// fields leave the existing value in place.
    pub async fn update_context(
        &self,
        session_id: &str,
        doctor_name: Option<String>,
        date: Option<String>,
        slot_time: Option<String>,
    ) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if doctor_name.is_some() {
                session.context.doctor_name = doctor_name;
            }
            if date.is_some() {
                session.context.date = date;
            }
            if slot_time.is_some() {
                session.context.slot_time = slot_time;
            }
        }
    }

    pub async fn turns(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.turns.clone())
            .unwrap_or_default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[cfg(test)]
    async fn backdate(&self, session_id: &str, by: Duration) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.last_active -= by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TurnRole;

    #[tokio::test]
    async fn unknown_id_starts_a_fresh_session() {
        let store = SessionStore::new(30);
        let (id, turns, _) = store.begin_turn(Some("never-seen".to_string()), "hello").await;
        assert_eq!(id, "never-seen");
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, TurnRole::User);
    }

    #[tokio::test]
    async fn missing_id_mints_one() {
        let store = SessionStore::new(30);
        let (id, _, _) = store.begin_turn(None, "hello").await;
        assert!(!id.is_empty());
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn turns_are_ordered_within_a_session() {
        let store = SessionStore::new(30);
        let (id, _, _) = store.begin_turn(Some("s1".to_string()), "first").await;
        store.complete_turn(&id, "reply one").await;
        let (_, turns, _) = store.begin_turn(Some(id.clone()), "second").await;

        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "reply one", "second"]);
    }

    #[tokio::test]
    async fn idle_session_is_evicted_on_next_access() {
        let store = SessionStore::new(30);
        let (id, _, _) = store.begin_turn(Some("s1".to_string()), "first").await;
        store
            .update_context(&id, Some("Dr. Ahuja".to_string()), None, None)
            .await;
        store.backdate(&id, Duration::minutes(31)).await;

        let (_, turns, context) = store.begin_turn(Some(id), "second").await;
        assert_eq!(turns.len(), 1);
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn context_merge_keeps_earlier_entities() {
        let store = SessionStore::new(30);
        let (id, _, _) = store.begin_turn(Some("s1".to_string()), "hi").await;
        store
            .update_context(
                &id,
                Some("Dr. Ahuja".to_string()),
                Some("2026-08-28".to_string()),
                None,
            )
            .await;
        store
            .update_context(&id, None, None, Some("10:00".to_string()))
            .await;

        let (_, _, context) = store.begin_turn(Some(id), "book it").await;
        assert_eq!(context.doctor_name.as_deref(), Some("Dr. Ahuja"));
        assert_eq!(context.date.as_deref(), Some("2026-08-28"));
        assert_eq!(context.slot_time.as_deref(), Some("10:00"));
        assert_eq!(
            context.summary().as_deref(),
            Some("doctor=Dr. Ahuja, date=2026-08-28, slot=10:00")
        );
    }

    #[tokio::test]
    async fn sessions_do_not_share_turns() {
        let store = SessionStore::new(30);
        store.begin_turn(Some("a".to_string()), "from a").await;
        store.begin_turn(Some("b".to_string()), "from b").await;

        let a = store.turns("a").await;
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "from a");
    }
}
