//! Promptgen Core - server-side conversation store
//!
//! Keeps chat transcripts out of client-visible state: the browser holds an
//! opaque session id, the transcript lives here.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 ConversationStore                    │
//! │    create / get / save (trim + sweep) / delete       │
//! ├──────────────┬──────────────────┬────────────────────┤
//! │  TrimPolicy  │  ExpiryPolicy    │   SessionTable     │
//! │  (pure)      │  (cutoff)        │   (SQLite WAL)     │
//! └──────────────┴──────────────────┴────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use promptgen_core::{ConversationStore, Database, Message};
//!
//! let store = ConversationStore::new(Database::open_in_memory().unwrap(), 21, 24).unwrap();
//! let id = store.create_session("flux", &[Message::system("You write prompts.")]).unwrap();
//!
//! let mut messages = store.get_conversation(Some(&id)).unwrap().messages;
//! messages.push(Message::user("a lighthouse at dusk"));
//! messages.push(Message::assistant("A lone lighthouse..."));
//! let saved = store.save_messages(&id, &messages, "flux").unwrap();
//! assert_eq!(saved.len(), 3);
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations)]

pub mod conversation;
pub mod error;
pub mod storage;
pub mod types;

pub use conversation::{
    format_timestamp, trim, ConversationStore, ExpiryPolicy, TrimPolicy, DEFAULT_MAX_AGE_HOURS,
    DEFAULT_MAX_MESSAGES,
};
pub use error::{Result, ResultExt, StoreError};
pub use storage::{
    Database, HistoryEntry, HistoryLog, HistoryMode, NewHistoryEntry, SessionRecord, SessionTable,
    MAX_HISTORY_LIMIT,
};
pub use types::{Conversation, Message, Role, SessionId, Transcript, SESSION_ID_BYTES};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
