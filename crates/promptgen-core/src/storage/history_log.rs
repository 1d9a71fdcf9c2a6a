//! Generation history log
//!
//! Append/query/delete table of past generations. Lives in the same database
//! as the session table but is independent of it.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::Database;
use crate::conversation::format_timestamp;
use crate::error::{Result, ResultExt};

/// Largest page the query accepts
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Which surface produced a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryMode {
    Oneshot,
    Chat,
    PersonaChat,
}

impl HistoryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryMode::Oneshot => "oneshot",
            HistoryMode::Chat => "chat",
            HistoryMode::PersonaChat => "persona-chat",
        }
    }
}

/// A generation about to be recorded
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub user_input: String,
    pub generated_output: String,
    /// Model type, or persona id for persona chats
    pub model: String,
    pub presets: serde_json::Value,
    pub mode: HistoryMode,
}

/// A recorded generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: String,
    pub user_input: String,
    pub generated_output: String,
    pub model: String,
    pub presets: serde_json::Value,
    pub mode: String,
}

/// `prompt_history` table
#[derive(Debug, Clone)]
pub struct HistoryLog {
    db: Database,
}

impl HistoryLog {
    pub fn new(db: Database) -> Result<Self> {
        db.lock()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS prompt_history (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp         TEXT NOT NULL,
                user_input        TEXT NOT NULL,
                generated_output  TEXT NOT NULL,
                model             TEXT NOT NULL,
                presets           TEXT,
                mode              TEXT NOT NULL
            );
            ",
            )
            .context("Migrating prompt_history")?;

        Ok(Self { db })
    }

    /// Append a generation, returning its row id
    pub fn record(&self, entry: &NewHistoryEntry) -> Result<i64> {
        let presets = serde_json::to_string(&entry.presets)?;
        let timestamp = format_timestamp(Utc::now());

        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO prompt_history (timestamp, user_input, generated_output, model, presets, mode)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                timestamp,
                entry.user_input,
                entry.generated_output,
                entry.model,
                presets,
                entry.mode.as_str()
            ],
        )
        .context("INSERT prompt_history")?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Saved generation to history with id {}", id);
        Ok(id)
    }

    /// Newest first, optionally filtered by a substring of input or output.
    ///
    /// `limit` is clamped to `1..=MAX_HISTORY_LIMIT`.
    pub fn query(&self, limit: usize, search: Option<&str>) -> Result<Vec<HistoryEntry>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT) as i64;
        let pattern = search
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q));

        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, user_input, generated_output, model, presets, mode
             FROM prompt_history
             WHERE ?1 IS NULL OR user_input LIKE ?1 OR generated_output LIKE ?1
             ORDER BY id DESC LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![pattern, limit], |row| {
                let presets: Option<String> = row.get(5)?;
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    user_input: row.get(2)?,
                    generated_output: row.get(3)?,
                    model: row.get(4)?,
                    presets: presets
                        .and_then(|p| serde_json::from_str(&p).ok())
                        .unwrap_or_else(|| serde_json::json!({})),
                    mode: row.get(6)?,
                })
            })
            .context("Query prompt_history")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Collecting prompt_history rows")
    }

    /// `false` when no row had this id
    pub fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self
            .db
            .lock()
            .execute("DELETE FROM prompt_history WHERE id = ?1", params![id])
            .context("DELETE prompt_history")?;

        if deleted > 0 {
            tracing::info!("Deleted history item {}", id);
        } else {
            tracing::warn!("No history item found with id {}", id);
        }
        Ok(deleted > 0)
    }
}
