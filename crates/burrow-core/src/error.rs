use crate::shortcode::ShortCode;
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The original URL already has a canonical short code.
    ///
    /// Not a failure: callers turn this into a conflict response that still
    /// points at the existing code.
    #[error("url already shortened as {0}")]
    Duplicate(ShortCode),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code collides with another url: {0}")]
    CodeCollision(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("journal write failed: {0}")]
    Journal(String),
    #[error("storage initialization failed: {0}")]
    Initialization(String),
    #[error("schema migration failed: {0}")]
    Migration(String),
    #[error("storage is not configured: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Returns `true` for the duplicate signal.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate(_))
    }

    /// The existing short code carried by a duplicate signal.
    pub fn existing_code(&self) -> Option<&ShortCode> {
        match self {
            StoreError::Duplicate(code) => Some(code),
            _ => None,
        }
    }

    /// Returns `true` for errors raised while constructing a store.
    ///
    /// A process that sees one of these should not start serving requests.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Initialization(_) | StoreError::Migration(_) | StoreError::Configuration(_)
        )
    }
}
