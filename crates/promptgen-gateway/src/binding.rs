//! Route-level session binding
//!
//! Links the opaque id in a client cookie to a stored conversation:
//!
//! ```text
//!  Absent ──message──▶ Active ──same participant──▶ Active
//!    ▲                   │
//!    │           other participant
//!    │                   ▼
//!    └──── delete ─── Superseded
//! ```
//!
//! The cookie only ever carries the session id; transcripts stay server-side.

use axum::http::{header, HeaderMap};
use promptgen_core::{Conversation, ConversationStore, Message, SessionId, Transcript};

use crate::error::Result;

/// Cookie binding the model chat
pub const CHAT_COOKIE: &str = "conversation_id";

/// Cookie binding the persona chat
pub const PERSONA_COOKIE: &str = "persona_conversation_id";

/// Where a client's stored conversation stands relative to a new turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Nothing usable is stored
    Absent,
    /// Stored transcript belongs to the requested participant
    Active,
    /// Stored transcript belongs to another participant
    Superseded,
}

impl BindingState {
    pub fn classify(current: &Conversation, participant: &str) -> Self {
        match current.participant.as_deref() {
            Some(stored) if stored != participant => BindingState::Superseded,
            _ if current.is_empty() => BindingState::Absent,
            _ => BindingState::Active,
        }
    }
}

/// Session id from the named cookie, if present and non-empty
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| SessionId::from(value))
}

/// `Set-Cookie` value binding `session_id`
pub fn session_cookie(name: &str, session_id: &SessionId) -> String {
    format!("{}={}; HttpOnly; SameSite=Lax; Path=/", name, session_id)
}

/// `Set-Cookie` value removing the binding
pub fn clear_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

/// A user turn that has been appended and saved, ready for the model
#[derive(Debug, Clone)]
pub struct Turn {
    pub session_id: SessionId,
    pub participant: String,
    /// Stored transcript, ending with the user turn
    pub transcript: Transcript,
    /// Copy handed to the model call
    pub snapshot: Transcript,
    /// A fresh session was created for this turn
    pub started_new: bool,
}

impl Turn {
    /// Whether the client must be sent a new cookie
    pub fn needs_cookie(&self, client_id: Option<&SessionId>) -> bool {
        self.started_new || client_id != Some(&self.session_id)
    }
}

/// Binds one cookie name to the conversation store
#[derive(Debug, Clone)]
pub struct SessionBinding {
    store: ConversationStore,
    cookie: &'static str,
}

impl SessionBinding {
    pub fn new(store: ConversationStore, cookie: &'static str) -> Self {
        Self { store, cookie }
    }

    pub fn cookie_name(&self) -> &'static str {
        self.cookie
    }

    /// Resolve the client's session for `participant`, append `user_message`
    /// and persist it.
    ///
    /// `system_prompt` is only consulted when a new session is started.
    pub fn begin_turn(
        &self,
        client_id: Option<&SessionId>,
        participant: &str,
        system_prompt: &str,
        user_message: String,
    ) -> Result<Turn> {
        let current = self.store.get_conversation(client_id)?;
        let state = BindingState::classify(&current, participant);

        let (session_id, transcript, started_new) = match (state, client_id) {
            (BindingState::Active, Some(id)) => (id.clone(), current.messages, false),
            (state, _) => {
                if state == BindingState::Superseded {
                    tracing::info!(
                        "Participant changed from {} to {}, starting new conversation",
                        current.participant.as_deref().unwrap_or("unknown"),
                        participant
                    );
                }
                self.store.delete_session(client_id)?;

                let initial = vec![Message::system(system_prompt)];
                let id = self.store.create_session(participant, &initial)?;
                (id, initial, true)
            }
        };

        // leave room so the save below never trims the new user turn
        let mut transcript = self.store.trim_policy().trim_for_pending_turn(&transcript);
        transcript.push(Message::user(user_message));
        let transcript = self.store.save_messages(&session_id, &transcript, participant)?;

        Ok(Turn {
            session_id,
            participant: participant.to_string(),
            snapshot: transcript.clone(),
            transcript,
            started_new,
        })
    }

    /// Append the model's reply and persist; returns what was stored
    pub fn finish_turn(&self, turn: Turn, reply: &str) -> Result<Transcript> {
        let mut transcript = turn.transcript;
        transcript.push(Message::assistant(reply));
        Ok(self
            .store
            .save_messages(&turn.session_id, &transcript, &turn.participant)?)
    }

    /// Forget the client's conversation
    pub fn reset(&self, client_id: Option<&SessionId>) -> Result<()> {
        self.store.delete_session(client_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use promptgen_core::{Database, Role};

    fn binding(max_messages: usize) -> (ConversationStore, SessionBinding) {
        let store =
            ConversationStore::new(Database::open_in_memory().unwrap(), max_messages, 24).unwrap();
        (store.clone(), SessionBinding::new(store, CHAT_COOKIE))
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; conversation_id=abc123; other=1"),
        );
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("persona_conversation_id=p42"),
        );

        assert_eq!(read_cookie(&headers, CHAT_COOKIE), Some(SessionId::from("abc123")));
        assert_eq!(read_cookie(&headers, PERSONA_COOKIE), Some(SessionId::from("p42")));
        assert_eq!(read_cookie(&headers, "missing"), None);

        let mut empty = HeaderMap::new();
        empty.insert(header::COOKIE, HeaderValue::from_static("conversation_id="));
        assert_eq!(read_cookie(&empty, CHAT_COOKIE), None);
    }

    #[test]
    fn test_cookie_values() {
        let id = SessionId::from("abc");
        assert_eq!(
            session_cookie(CHAT_COOKIE, &id),
            "conversation_id=abc; HttpOnly; SameSite=Lax; Path=/"
        );
        assert!(clear_cookie(CHAT_COOKIE).ends_with("Max-Age=0"));
    }

    #[test]
    fn test_classify() {
        let empty = Conversation::empty();
        assert_eq!(BindingState::classify(&empty, "flux"), BindingState::Absent);

        let flux = Conversation {
            messages: vec![Message::system("S")],
            participant: Some("flux".into()),
        };
        assert_eq!(BindingState::classify(&flux, "flux"), BindingState::Active);
        assert_eq!(BindingState::classify(&flux, "sdxl"), BindingState::Superseded);
    }

    #[test]
    fn test_first_turn_creates_session() {
        let (store, binding) = binding(21);
        let turn = binding.begin_turn(None, "flux", "S", "hi".into()).unwrap();

        assert!(turn.started_new);
        assert!(turn.needs_cookie(None));
        assert_eq!(turn.snapshot, vec![Message::system("S"), Message::user("hi")]);

        let saved = binding.finish_turn(turn.clone(), "hello").unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(
            store.get_conversation(Some(&turn.session_id)).unwrap().messages,
            saved
        );
    }

    #[test]
    fn test_active_session_is_continued() {
        let (_store, binding) = binding(21);
        let first = binding.begin_turn(None, "flux", "S", "hi".into()).unwrap();
        let id = first.session_id.clone();
        binding.finish_turn(first, "hello").unwrap();

        let second = binding
            .begin_turn(Some(&id), "flux", "ignored", "more".into())
            .unwrap();
        assert!(!second.started_new);
        assert!(!second.needs_cookie(Some(&id)));
        assert_eq!(second.session_id, id);
        assert_eq!(second.snapshot[0], Message::system("S"));
        assert_eq!(second.snapshot.len(), 4);
    }

    #[test]
    fn test_participant_switch_replaces_session() {
        let (store, binding) = binding(21);
        let flux = binding.begin_turn(None, "flux", "F", "hi".into()).unwrap();
        let old = flux.session_id.clone();

        let sdxl = binding.begin_turn(Some(&old), "sdxl", "X", "hi".into()).unwrap();
        assert!(sdxl.started_new);
        assert_ne!(sdxl.session_id, old);
        assert_eq!(sdxl.snapshot[0], Message::system("X"));
        assert!(store.get_conversation(Some(&old)).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_cookie_starts_fresh() {
        let (_store, binding) = binding(21);
        let stale = SessionId::from("gone");
        let turn = binding.begin_turn(Some(&stale), "flux", "S", "hi".into()).unwrap();
        assert!(turn.needs_cookie(Some(&stale)));
    }

    #[test]
    fn test_user_turn_survives_full_budget() {
        let (_store, binding) = binding(3);
        let mut turn = binding.begin_turn(None, "flux", "S", "one".into()).unwrap();
        let id = turn.session_id.clone();

        for message in ["two", "three", "four"] {
            binding.finish_turn(turn, "reply").unwrap();
            turn = binding.begin_turn(Some(&id), "flux", "S", message.into()).unwrap();

            assert_eq!(turn.snapshot.len(), 2);
            assert_eq!(turn.snapshot[0].role, Role::System);
            assert_eq!(turn.snapshot[1], Message::user(message));
        }
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (store, binding) = binding(21);
        let turn = binding.begin_turn(None, "flux", "S", "hi".into()).unwrap();

        binding.reset(Some(&turn.session_id)).unwrap();
        binding.reset(Some(&turn.session_id)).unwrap();
        binding.reset(None).unwrap();
        assert_eq!(store.session_count().unwrap(), 0);
    }
}
