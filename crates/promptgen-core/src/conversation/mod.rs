//! Conversation lifecycle: trimming, expiry and the store facade

pub mod expiry;
pub mod store;
pub mod trimming;

pub use expiry::{format_timestamp, ExpiryPolicy, DEFAULT_MAX_AGE_HOURS};
pub use store::ConversationStore;
pub use trimming::{trim, TrimPolicy, DEFAULT_MAX_MESSAGES};
