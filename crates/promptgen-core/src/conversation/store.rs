//! Conversation store facade
//!
//! The only interface the route layer touches. Composes the session table,
//! the trimming policy and the expiry policy:
//!
//! - reads are total: a missing, unknown or unreadable session is an empty
//!   [`Conversation`], never an error;
//! - every save trims, upserts with a fresh `updated_at`, then sweeps stale
//!   rows in the same transaction;
//! - only storage I/O failures surface as [`StoreError`](crate::StoreError).

use chrono::Utc;

use super::expiry::{format_timestamp, ExpiryPolicy};
use super::trimming::TrimPolicy;
use crate::error::{Result, ResultExt};
use crate::storage::{Database, SessionRecord, SessionTable};
use crate::types::{Conversation, Message, SessionId, Transcript};

/// Server-side transcript cache keyed by opaque session id
#[derive(Debug, Clone)]
pub struct ConversationStore {
    table: SessionTable,
    trim: TrimPolicy,
    expiry: ExpiryPolicy,
}

impl ConversationStore {
    /// Bind a store to `db` with the given budget and session lifetime
    pub fn new(db: Database, max_messages: usize, max_age_hours: u64) -> Result<Self> {
        let table = SessionTable::new(db)?;
        Ok(Self {
            table,
            trim: TrimPolicy::new(max_messages),
            expiry: ExpiryPolicy::from_hours(max_age_hours),
        })
    }

    pub fn max_messages(&self) -> usize {
        self.trim.max_messages()
    }

    pub fn trim_policy(&self) -> TrimPolicy {
        self.trim
    }

    /// Start a new session under a fresh identifier
    pub fn create_session(&self, participant: &str, initial: &[Message]) -> Result<SessionId> {
        let session_id = SessionId::generate();
        self.save_messages(&session_id, initial, participant)
            .context("Creating session")?;

        tracing::debug!(
            "Created session {} for '{}' with {} messages",
            short_id(&session_id),
            participant,
            initial.len()
        );
        Ok(session_id)
    }

    /// Load a conversation; `None`, unknown and corrupt sessions read as empty
    pub fn get_conversation(&self, session_id: Option<&SessionId>) -> Result<Conversation> {
        let Some(session_id) = session_id.filter(|id| !id.as_str().is_empty()) else {
            return Ok(Conversation::empty());
        };

        let Some(record) = self.table.get(session_id.as_str())? else {
            return Ok(Conversation::empty());
        };

        let messages = match serde_json::from_str::<Transcript>(&record.conversation) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(
                    "Discarding unreadable transcript for session {}: {}",
                    short_id(session_id),
                    e
                );
                Vec::new()
            }
        };

        Ok(Conversation {
            messages,
            participant: Some(record.model_type),
        })
    }

    /// Trim, persist and return exactly what was stored
    pub fn save_messages(
        &self,
        session_id: &SessionId,
        messages: &[Message],
        participant: &str,
    ) -> Result<Transcript> {
        let trimmed = self.trim.trim(messages);
        let now = Utc::now();

        let record = SessionRecord {
            session_id: session_id.as_str().to_string(),
            model_type: participant.to_string(),
            conversation: serde_json::to_string(&trimmed)?,
            updated_at: format_timestamp(now),
        };
        let cutoff = self.expiry.cutoff(now).map(format_timestamp);

        let swept = self.table.upsert(&record, cutoff.as_deref())?;
        if swept > 0 {
            tracing::info!("Expired {} stale conversation sessions", swept);
        }
        if trimmed.len() < messages.len() {
            tracing::debug!(
                "Trimmed session {} from {} to {} messages",
                short_id(session_id),
                messages.len(),
                trimmed.len()
            );
        }

        Ok(trimmed)
    }

    /// Idempotent; unknown and `None` ids are a no-op
    pub fn delete_session(&self, session_id: Option<&SessionId>) -> Result<()> {
        if let Some(session_id) = session_id.filter(|id| !id.as_str().is_empty()) {
            if self.table.delete(session_id.as_str())? {
                tracing::debug!("Deleted session {}", short_id(session_id));
            }
        }
        Ok(())
    }

    /// Drop every session
    pub fn clear_all(&self) -> Result<usize> {
        let cleared = self.table.delete_all()?;
        tracing::info!("Cleared {} conversation sessions", cleared);
        Ok(cleared)
    }

    /// Run the expiry sweep without a write
    pub fn sweep_expired(&self) -> Result<usize> {
        match self.expiry.cutoff(Utc::now()) {
            Some(cutoff) => self.table.delete_older_than(&format_timestamp(cutoff)),
            None => Ok(0),
        }
    }

    pub fn session_count(&self) -> Result<usize> {
        self.table.count()
    }
}

/// Log-safe prefix of a session id
fn short_id(session_id: &SessionId) -> &str {
    let id = session_id.as_str();
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> ConversationStore {
        ConversationStore::new(Database::open_in_memory().unwrap(), 21, 24).unwrap()
    }

    #[test]
    fn test_create_and_read_back() {
        let store = temp_store();
        let id = store
            .create_session("flux", &[Message::system("S")])
            .unwrap();

        let conv = store.get_conversation(Some(&id)).unwrap();
        assert_eq!(conv.messages, vec![Message::system("S")]);
        assert_eq!(conv.participant.as_deref(), Some("flux"));
    }

    #[test]
    fn test_missing_sessions_read_empty() {
        let store = temp_store();
        assert_eq!(store.get_conversation(None).unwrap(), Conversation::empty());
        assert_eq!(
            store.get_conversation(Some(&SessionId::from(""))).unwrap(),
            Conversation::empty()
        );
        assert_eq!(
            store
                .get_conversation(Some(&SessionId::from("nope")))
                .unwrap(),
            Conversation::empty()
        );
    }

    #[test]
    fn test_create_session_with_empty_transcript() {
        let store = temp_store();
        let id = store.create_session("sdxl", &[]).unwrap();

        let conv = store.get_conversation(Some(&id)).unwrap();
        assert!(conv.messages.is_empty());
        assert_eq!(conv.participant.as_deref(), Some("sdxl"));
        assert_eq!(store.session_count().unwrap(), 1);
    }

    #[test]
    fn test_short_id_handles_short_values() {
        assert_eq!(short_id(&SessionId::from("abc")), "abc");
        assert_eq!(short_id(&SessionId::from("0123456789")), "01234567");
    }
}
