//! Error types for the conversation store
//!
//! Only storage I/O is fatal. Missing sessions and corrupt transcripts are
//! not errors at this layer: they degrade to an empty conversation.

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failures (open, query, constraint)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Transcript or preset serialization failures on the write path
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors (creating the database directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A message carried a role outside `system | user | assistant`
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<StoreError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }
}
