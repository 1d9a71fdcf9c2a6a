//! Persistent session table
//!
//! Key-value rows `session_id -> (model_type, conversation, updated_at)`.
//! The transcript column is opaque JSON text at this layer; decoding and
//! validation happen in the store facade.

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::{Result, ResultExt};

/// One stored session row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    /// Participant label: a model type or persona id
    pub model_type: String,
    /// JSON array of `{role, content}` objects
    pub conversation: String,
    /// Fixed-width RFC 3339 UTC timestamp
    pub updated_at: String,
}

/// `conversation_store` table
#[derive(Debug, Clone)]
pub struct SessionTable {
    db: Database,
}

impl SessionTable {
    /// Bind to `db`, creating the table and its index when missing
    pub fn new(db: Database) -> Result<Self> {
        db.lock()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS conversation_store (
                session_id    TEXT PRIMARY KEY,
                model_type    TEXT NOT NULL,
                conversation  TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversation_updated
                ON conversation_store(updated_at);
            ",
            )
            .context("Migrating conversation_store")?;

        Ok(Self { db })
    }

    /// Point lookup by session id
    pub fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.db
            .lock()
            .query_row(
                "SELECT session_id, model_type, conversation, updated_at
                 FROM conversation_store WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok(SessionRecord {
                        session_id: row.get(0)?,
                        model_type: row.get(1)?,
                        conversation: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("SELECT conversation_store")
    }

    /// Insert or replace a row, then sweep rows updated before `sweep_before`.
    ///
    /// Both statements share one transaction. Returns the number of rows swept.
    pub fn upsert(&self, record: &SessionRecord, sweep_before: Option<&str>) -> Result<usize> {
        let mut conn = self.db.lock();
        let tx = conn.transaction().context("BEGIN upsert")?;

        tx.execute(
            "INSERT INTO conversation_store (session_id, model_type, conversation, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                model_type = excluded.model_type,
                conversation = excluded.conversation,
                updated_at = excluded.updated_at",
            params![
                record.session_id,
                record.model_type,
                record.conversation,
                record.updated_at
            ],
        )
        .context("UPSERT conversation_store")?;

        let swept = match sweep_before {
            Some(cutoff) => tx
                .execute(
                    "DELETE FROM conversation_store WHERE updated_at < ?1",
                    params![cutoff],
                )
                .context("Sweeping expired sessions")?,
            None => 0,
        };

        tx.commit().context("COMMIT upsert")?;
        Ok(swept)
    }

    /// Delete one row; `false` when the id was unknown
    pub fn delete(&self, session_id: &str) -> Result<bool> {
        let deleted = self
            .db
            .lock()
            .execute(
                "DELETE FROM conversation_store WHERE session_id = ?1",
                params![session_id],
            )
            .context("DELETE conversation_store")?;
        Ok(deleted > 0)
    }

    pub fn delete_all(&self) -> Result<usize> {
        self.db
            .lock()
            .execute("DELETE FROM conversation_store", [])
            .context("DELETE all conversation_store")
    }

    /// Range delete by age
    pub fn delete_older_than(&self, cutoff: &str) -> Result<usize> {
        self.db
            .lock()
            .execute(
                "DELETE FROM conversation_store WHERE updated_at < ?1",
                params![cutoff],
            )
            .context("Sweeping expired sessions")
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .lock()
            .query_row("SELECT COUNT(*) FROM conversation_store", [], |row| {
                row.get(0)
            })
            .context("COUNT conversation_store")?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
