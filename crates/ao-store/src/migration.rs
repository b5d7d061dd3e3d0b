use rusqlite::Connection;

use ao_domain::error::{Error, Result};

/// One versioned schema change, scoped to a `domain` (a table
/// namespace within the one embedded database file).
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Create the `_migrations` tracking table if it doesn't exist yet.
pub fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            domain TEXT NOT NULL,
            version INTEGER NOT NULL,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL,
            PRIMARY KEY (domain, version)
        );",
    )
    .map_err(|e| Error::Store(e.to_string()))?;
    Ok(())
}

/// Apply every migration in `migrations` whose version has not yet
/// been recorded for `domain`, each inside its own transaction, in
/// ascending version order.
pub fn run_migrations(conn: &mut Connection, domain: &str, migrations: &[Migration]) -> Result<()> {
    ensure_migrations_table(conn)?;

    let mut sorted = migrations.to_vec();
    sorted.sort_by_key(|m| m.version);

    for migration in sorted {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM _migrations WHERE domain = ?1 AND version = ?2",
                rusqlite::params![domain, migration.version],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| Error::Store(e.to_string()))?
            > 0;

        if already_applied {
            continue;
        }

        let tx = conn.transaction().map_err(|e| Error::Store(e.to_string()))?;
        tx.execute_batch(migration.sql).map_err(|e| {
            Error::Store(format!("migration {domain}/{} ({}) failed: {e}", migration.version, migration.name))
        })?;
        tx.execute(
            "INSERT INTO _migrations (domain, version, name, applied_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![domain, migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Store(e.to_string()))?;
        tx.commit().map_err(|e| Error::Store(e.to_string()))?;
    }

    Ok(())
}
