use crate::migration::Migration;

pub const DOMAIN: &str = "session_store";

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create_sessions_and_events",
    sql: "
        CREATE TABLE sessions (
            session_id  TEXT PRIMARY KEY,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            provider_id TEXT
        );
        CREATE TABLE events (
            session_id TEXT NOT NULL,
            seq        INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            payload    TEXT NOT NULL,
            PRIMARY KEY (session_id, seq)
        );
        CREATE INDEX idx_events_session ON events (session_id, seq);
    ",
}];
