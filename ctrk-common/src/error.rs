//! Common error types for the congress tracker

use thiserror::Error;

/// Common result type for congress tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the UI layer
///
/// Every session operation that returns one of these has left the session
/// untouched. Save failures after an applied change are reported through
/// [`crate::session::Persisted::Failed`] instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced competitor or resolution does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Name or title collision on add/rename
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// Action attempted before its prerequisite state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid user input (blank names, unparseable values)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O failure while loading, saving or clearing a session
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// Competitor table could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Side file could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures of the durable store rather than of the request itself
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_) | Error::Csv(_) | Error::Json(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts_to_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(err.is_persistence());
        assert!(err.to_string().starts_with("Persistence error"));
    }

    #[test]
    fn test_state_errors_are_not_persistence() {
        assert!(!Error::NotFound("Alice".into()).is_persistence());
        assert!(!Error::Duplicate("Alice".into()).is_persistence());
        assert!(!Error::InvalidState("not tracking".into()).is_persistence());
    }
}
