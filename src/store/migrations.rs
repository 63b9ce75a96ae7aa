//! Schema versions for the libSQL backend.
//!
//! Applied steps are recorded in `schema_version`. Each pending step runs in
//! its own transaction together with its version row, so a failed step leaves
//! the database at the previous version.

use libsql::Connection;
use tracing::{debug, info};

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered schema steps. Append only.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "transcript_entries",
        sql: r#"
            CREATE TABLE IF NOT EXISTS transcript_entries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                topic_index INTEGER NOT NULL,
                topic_title TEXT NOT NULL,
                user_utterance TEXT NOT NULL,
                system_utterance TEXT NOT NULL,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transcript_user ON transcript_entries(user_id);
            CREATE INDEX IF NOT EXISTS idx_transcript_user_topic
                ON transcript_entries(user_id, topic_index);
        "#,
    },
    Migration {
        version: 2,
        name: "flow_states",
        sql: r#"
            CREATE TABLE IF NOT EXISTS flow_states (
                session_key TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
        "#,
    },
];

/// Version the schema reaches once every step is applied.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Bring the schema up to [`latest_version`].
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("schema_version table: {e}")))?;

    let from = schema_version(conn).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > from).collect();
    if pending.is_empty() {
        debug!(version = from, "Schema up to date");
        return Ok(());
    }

    for migration in pending {
        apply(conn, migration).await?;
    }
    info!(from, to = latest_version(), "Schema migrated");
    Ok(())
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let step = format!("V{} ({})", migration.version, migration.name);
    let failed = |e: libsql::Error| DatabaseError::Migration(format!("{step}: {e}"));

    let tx = conn.transaction().await.map_err(failed)?;
    tx.execute_batch(migration.sql).await.map_err(failed)?;
    tx.execute(
        "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
        libsql::params![migration.version, migration.name],
    )
    .await
    .map_err(failed)?;
    tx.commit().await.map_err(failed)?;

    info!(version = migration.version, name = migration.name, "Applied schema step");
    Ok(())
}

/// Highest applied version; 0 for an empty database.
pub async fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?;
    let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?
    else {
        return Ok(0);
    };
    row.get::<i64>(0)
        .map_err(|e| DatabaseError::Migration(format!("parsing schema version: {e}")))
}
