use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use ao_domain::error::{Error, Result};
use ao_domain::event::{Event, EventPayload};
use ao_domain::trace::TraceEvent;

use crate::migration::run_migrations;
use crate::schema::{DOMAIN, MIGRATIONS};

/// Session metadata, distinct from the event stream: the row tracking
/// which provider is currently bound to a session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
    pub provider_id: Option<String>,
}

/// Embedded transactional store for session events. One process may
/// hold many handles to the same file; all access to the shared
/// `Connection` goes through `inner`'s mutex, so the store is safe to
/// share across tasks on the same event loop (but, per the orchestrator's
/// concurrency model, is not meant to be driven from multiple threads
/// at once).
pub struct SessionStore {
    inner: Mutex<Connection>,
}

impl SessionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path).map_err(|e| Error::Store(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(|e| Error::Store(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| Error::Store(e.to_string()))?;
        run_migrations(&mut conn, DOMAIN, MIGRATIONS)?;
        Ok(Self { inner: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|e| Error::Store(e.to_string()))?;
        run_migrations(&mut conn, DOMAIN, MIGRATIONS)?;
        Ok(Self { inner: Mutex::new(conn) })
    }

    /// Create a new session row and return its id.
    pub fn start_session(&self) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let conn = self.inner.lock().map_err(|_| Error::Store("poisoned lock".into()))?;
        conn.execute(
            "INSERT INTO sessions (session_id, created_at, updated_at, provider_id) VALUES (?1, ?2, ?2, NULL)",
            rusqlite::params![session_id, now],
        )
        .map_err(|e| Error::Store(e.to_string()))?;
        TraceEvent::SessionResolved { session_id: session_id.clone(), is_new: true }.emit();
        Ok(session_id)
    }

    /// Append one event, assigning `seq` inside the same transaction
    /// that inserts the row so concurrent appenders cannot collide.
    pub fn append(&self, session_id: &str, payload: EventPayload) -> Result<i64> {
        let mut conn = self.inner.lock().map_err(|_| Error::Store("poisoned lock".into()))?;
        let tx = conn.transaction().map_err(|e| Error::Store(e.to_string()))?;

        let next_seq: i64 = tx
            .query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM events WHERE session_id = ?1", [session_id], |row| row.get(0))
            .map_err(|e| Error::Store(e.to_string()))?;

        let now = Utc::now();
        let payload_json = serde_json::to_string(&payload)?;

        tx.execute(
            "INSERT INTO events (session_id, seq, created_at, payload) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![session_id, next_seq, now.to_rfc3339(), payload_json],
        )
        .map_err(|e| Error::Store(e.to_string()))?;

        if let EventPayload::SessionMeta { key, value } = &payload {
            if key == "provider_id" {
                let provider_id = value.as_str().map(String::from);
                tx.execute(
                    "UPDATE sessions SET provider_id = ?1, updated_at = ?2 WHERE session_id = ?3",
                    rusqlite::params![provider_id, now.to_rfc3339(), session_id],
                )
                .map_err(|e| Error::Store(e.to_string()))?;
            }
        } else {
            tx.execute(
                "UPDATE sessions SET updated_at = ?1 WHERE session_id = ?2",
                rusqlite::params![now.to_rfc3339(), session_id],
            )
            .map_err(|e| Error::Store(e.to_string()))?;
        }

        tx.commit().map_err(|e| Error::Store(e.to_string()))?;

        TraceEvent::EventAppended { session_id: session_id.to_string(), seq: next_seq, kind: payload_kind(&payload).to_string() }.emit();

        Ok(next_seq)
    }

    pub fn read_events(&self, session_id: &str, from_seq: Option<i64>, limit: Option<usize>) -> Result<Vec<Event>> {
        let conn = self.inner.lock().map_err(|_| Error::Store("poisoned lock".into()))?;
        let from_seq = from_seq.unwrap_or(0);

        let mut stmt = conn
            .prepare("SELECT session_id, seq, created_at, payload FROM events WHERE session_id = ?1 AND seq > ?2 ORDER BY seq ASC")
            .map_err(|e| Error::Store(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params![session_id, from_seq], |row| {
                let session_id: String = row.get(0)?;
                let seq: i64 = row.get(1)?;
                let created_at: String = row.get(2)?;
                let payload: String = row.get(3)?;
                Ok((session_id, seq, created_at, payload))
            })
            .map_err(|e| Error::Store(e.to_string()))?;

        let mut events = Vec::new();
        for row in rows {
            let (session_id, seq, created_at, payload) = row.map_err(|e| Error::Store(e.to_string()))?;
            let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| Error::Store(e.to_string()))?
                .with_timezone(&Utc);
            let payload: EventPayload = serde_json::from_str(&payload)?;
            events.push(Event { session_id, seq, created_at, payload });
            if let Some(limit) = limit {
                if events.len() >= limit {
                    break;
                }
            }
        }
        Ok(events)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        let conn = self.inner.lock().map_err(|_| Error::Store("poisoned lock".into()))?;
        conn.query_row(
            "SELECT session_id, created_at, updated_at, provider_id FROM sessions WHERE session_id = ?1",
            [session_id],
            |row| {
                let session_id: String = row.get(0)?;
                let created_at: String = row.get(1)?;
                let updated_at: String = row.get(2)?;
                let provider_id: Option<String> = row.get(3)?;
                Ok((session_id, created_at, updated_at, provider_id))
            },
        )
        .optional()
        .map_err(|e| Error::Store(e.to_string()))?
        .map(|(session_id, created_at, updated_at, provider_id)| {
            Ok(SessionSummary {
                session_id,
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at).map_err(|e| Error::Store(e.to_string()))?.with_timezone(&Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at).map_err(|e| Error::Store(e.to_string()))?.with_timezone(&Utc),
                provider_id,
            })
        })
        .transpose()
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let conn = self.inner.lock().map_err(|_| Error::Store("poisoned lock".into()))?;
        let mut stmt = conn
            .prepare("SELECT session_id, created_at, updated_at, provider_id FROM sessions ORDER BY created_at ASC")
            .map_err(|e| Error::Store(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                let session_id: String = row.get(0)?;
                let created_at: String = row.get(1)?;
                let updated_at: String = row.get(2)?;
                let provider_id: Option<String> = row.get(3)?;
                Ok((session_id, created_at, updated_at, provider_id))
            })
            .map_err(|e| Error::Store(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows {
            let (session_id, created_at, updated_at, provider_id) = row.map_err(|e| Error::Store(e.to_string()))?;
            out.push(SessionSummary {
                session_id,
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at).map_err(|e| Error::Store(e.to_string()))?.with_timezone(&Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at).map_err(|e| Error::Store(e.to_string()))?.with_timezone(&Utc),
                provider_id,
            });
        }
        Ok(out)
    }

    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self.inner.lock().map_err(|_| Error::Store("poisoned lock".into()))?;
        conn.execute("DELETE FROM events WHERE session_id = ?1", [session_id]).map_err(|e| Error::Store(e.to_string()))?;
        conn.execute("DELETE FROM sessions WHERE session_id = ?1", [session_id]).map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }
}

fn payload_kind(payload: &EventPayload) -> &'static str {
    match payload {
        EventPayload::UserPrompt { .. } => "user_prompt",
        EventPayload::AssistantText { .. } => "assistant_text",
        EventPayload::AssistantToolCall { .. } => "assistant_tool_call",
        EventPayload::ToolResult { .. } => "tool_result",
        EventPayload::PolicyDecision { .. } => "policy_decision",
        EventPayload::Error { .. } => "error",
        EventPayload::SessionMeta { .. } => "session_meta",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_session_creates_row() {
        let store = SessionStore::open_in_memory().unwrap();
        let id = store.start_session().unwrap();
        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, id);
    }

    #[test]
    fn get_session_finds_existing_and_none_for_unknown() {
        let store = SessionStore::open_in_memory().unwrap();
        let id = store.start_session().unwrap();
        let found = store.get_session(&id).unwrap().expect("session should exist");
        assert_eq!(found.session_id, id);
        assert!(store.get_session("does-not-exist").unwrap().is_none());
    }

    #[test]
    fn append_assigns_monotonic_seq_with_no_gaps() {
        let store = SessionStore::open_in_memory().unwrap();
        let session_id = store.start_session().unwrap();
        let s1 = store.append(&session_id, EventPayload::UserPrompt { text: "hi".into() }).unwrap();
        let s2 = store.append(&session_id, EventPayload::AssistantText { text: "hello".into() }).unwrap();
        assert_eq!(s1, 1);
        assert_eq!(s2, 2);
    }

    #[test]
    fn read_events_returns_append_order() {
        let store = SessionStore::open_in_memory().unwrap();
        let session_id = store.start_session().unwrap();
        store.append(&session_id, EventPayload::UserPrompt { text: "one".into() }).unwrap();
        store.append(&session_id, EventPayload::AssistantText { text: "two".into() }).unwrap();

        let events = store.read_events(&session_id, None, None).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].seq, 1);
        assert_eq!(events[1].seq, 2);
    }

    #[test]
    fn read_events_respects_from_seq() {
        let store = SessionStore::open_in_memory().unwrap();
        let session_id = store.start_session().unwrap();
        store.append(&session_id, EventPayload::UserPrompt { text: "one".into() }).unwrap();
        store.append(&session_id, EventPayload::AssistantText { text: "two".into() }).unwrap();

        let events = store.read_events(&session_id, Some(1), None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 2);
    }

    #[test]
    fn session_meta_provider_change_updates_session_row() {
        let store = SessionStore::open_in_memory().unwrap();
        let session_id = store.start_session().unwrap();
        store
            .append(
                &session_id,
                EventPayload::SessionMeta { key: "provider_id".into(), value: serde_json::json!("anthropic") },
            )
            .unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions[0].provider_id.as_deref(), Some("anthropic"));
    }

    #[test]
    fn delete_session_removes_events_and_session_row() {
        let store = SessionStore::open_in_memory().unwrap();
        let session_id = store.start_session().unwrap();
        store.append(&session_id, EventPayload::UserPrompt { text: "hi".into() }).unwrap();

        store.delete_session(&session_id).unwrap();
        assert!(store.list_sessions().unwrap().is_empty());
        assert!(store.read_events(&session_id, None, None).unwrap().is_empty());
    }

    #[test]
    fn separate_sessions_have_independent_sequences() {
        let store = SessionStore::open_in_memory().unwrap();
        let s1 = store.start_session().unwrap();
        let s2 = store.start_session().unwrap();
        store.append(&s1, EventPayload::UserPrompt { text: "a".into() }).unwrap();
        let seq = store.append(&s2, EventPayload::UserPrompt { text: "b".into() }).unwrap();
        assert_eq!(seq, 1, "s2's sequence must not be affected by s1's appends");
    }
}
