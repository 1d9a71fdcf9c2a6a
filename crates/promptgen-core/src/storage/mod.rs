//! Persistent storage layer: SQLite WAL
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                   Database                    │
//! ├───────────────────────────────────────────────┤
//! │  conversation_store      │  prompt_history    │
//! │  (session transcripts)   │  (generation log)  │
//! └───────────────────────────────────────────────┘
//!         ↓ WAL mode: concurrent reads, serialized writes
//! ```

pub mod database;
pub mod history_log;
pub mod session_table;

pub use database::Database;
pub use history_log::{HistoryEntry, HistoryLog, HistoryMode, NewHistoryEntry, MAX_HISTORY_LIMIT};
pub use session_table::{SessionRecord, SessionTable};
