//! libSQL backend: durable transcript and flow-state storage.
//!
//! Supports local file and in-memory databases. Flow state is stored as one
//! JSON snapshot per session key.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::interview::{FlowStateStore, ReplyKind, SessionFlowState, SessionKey};
use crate::store::migrations;
use crate::store::traits::{TranscriptEntry, TranscriptStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_entries(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        op: &str,
    ) -> Result<Vec<TranscriptEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            entries.push(row_to_entry(&row)?);
        }
        Ok(entries)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Fixed-width timestamps so that text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const ENTRY_COLUMNS: &str =
    "id, user_id, topic_index, topic_title, user_utterance, system_utterance, kind, created_at";

/// Map a libsql Row (in `ENTRY_COLUMNS` order) to a TranscriptEntry.
fn row_to_entry(row: &libsql::Row) -> Result<TranscriptEntry, DatabaseError> {
    let get_text = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Query(format!("transcript column {idx}: {e}")))
    };

    let id_str = get_text(0)?;
    let topic_index: i64 = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("transcript topic_index: {e}")))?;
    let kind_str = get_text(6)?;
    let kind = ReplyKind::parse(&kind_str)
        .ok_or_else(|| DatabaseError::Serialization(format!("unknown entry kind '{kind_str}'")))?;

    Ok(TranscriptEntry {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        user_id: get_text(1)?,
        topic_index: usize::try_from(topic_index).map_err(|_| {
            DatabaseError::Serialization(format!("negative topic_index {topic_index}"))
        })?,
        topic_title: get_text(3)?,
        user_utterance: get_text(4)?,
        system_utterance: get_text(5)?,
        kind,
        created_at: parse_datetime(&get_text(7)?),
    })
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl TranscriptStore for LibSqlBackend {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO transcript_entries
                    (id, user_id, topic_index, topic_title, user_utterance, system_utterance, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.id.to_string(),
                    entry.user_id.as_str(),
                    entry.topic_index as i64,
                    entry.topic_title.as_str(),
                    entry.user_utterance.as_str(),
                    entry.system_utterance.as_str(),
                    entry.kind.as_str(),
                    format_datetime(&entry.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_transcript: {e}")))?;

        debug!(
            user = %entry.user_id,
            topic = entry.topic_index,
            kind = %entry.kind,
            "Transcript entry appended"
        );
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<TranscriptEntry>, DatabaseError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM transcript_entries
             WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC"
        );
        self.query_entries(&sql, params![user_id], "list_transcript_by_user")
            .await
    }

    async fn list_by_topic(
        &self,
        user_id: &str,
        topic_index: usize,
    ) -> Result<Vec<TranscriptEntry>, DatabaseError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM transcript_entries
             WHERE user_id = ?1 AND topic_index = ?2 ORDER BY created_at ASC, rowid ASC"
        );
        self.query_entries(
            &sql,
            params![user_id, topic_index as i64],
            "list_transcript_by_topic",
        )
        .await
    }
}

#[async_trait]
impl FlowStateStore for LibSqlBackend {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionFlowState>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT state FROM flow_states WHERE session_key = ?1",
                params![key.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_flow_state: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("load_flow_state: {e}")))?;
                let state = serde_json::from_str(&json)
                    .map_err(|e| DatabaseError::Serialization(format!("flow state {key}: {e}")))?;
                Ok(Some(state))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_flow_state: {e}"))),
        }
    }

    async fn save(&self, key: &SessionKey, state: &SessionFlowState) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(state)
            .map_err(|e| DatabaseError::Serialization(format!("flow state {key}: {e}")))?;
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO flow_states (session_key, state, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (session_key) DO UPDATE SET state = ?2, updated_at = ?3",
                params![key.as_str(), json, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_flow_state: {e}")))?;
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM flow_states WHERE session_key = ?1",
                params![key.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("remove_flow_state: {e}")))?;
        Ok(affected > 0)
    }

    async fn list_keys(&self) -> Result<Vec<SessionKey>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT session_key FROM flow_states ORDER BY session_key", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("list_flow_keys: {e}")))?;

        let mut keys = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_flow_keys: {e}")))?
        {
            let key: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_flow_keys: {e}")))?;
            keys.push(SessionKey::from(key));
        }
        Ok(keys)
    }
}
