//! Error types for the media renamer.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media renamer.
#[derive(Error, Debug)]
pub enum Error {
    // Template errors
    #[error("No template applies to item {0}")]
    Validation(String),

    #[error("Path is too long ({length} > {limit}): {path}")]
    Length {
        path: String,
        length: usize,
        limit: usize,
    },

    #[error("Duplicate suffixes exhausted for {0}")]
    DuplicateExhausted(String),

    // Transaction errors
    #[error("File doesn't exist on disk: {0}")]
    FileMissing(String),

    #[error("A process is holding the file: {0}")]
    LockedFile(String),

    #[error("Index update failed: {0}")]
    Database(String),

    #[error("Rollback failed, {path} no longer matches the index: {reason}")]
    RollbackFailure { path: String, reason: String },

    #[error("Audit log write failed: {0}")]
    AuditLog(String),

    #[error("Move failed: {0}")]
    Move(String),

    // Metadata service errors
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("HTTP Error 401, Unauthorised")]
    Unauthorized,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // SQLite errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // TOML errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Whether the error must stop the whole invocation instead of only the
    /// current file or item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::GraphQl(_) | Error::Unauthorized | Error::Http(_) | Error::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Unauthorized.is_fatal());
        assert!(Error::GraphQl("boom".to_string()).is_fatal());
        assert!(!Error::Database("locked".to_string()).is_fatal());
        assert!(!Error::DuplicateExhausted("a.mp4".to_string()).is_fatal());
    }

    #[test]
    fn test_length_message() {
        let err = Error::Length {
            path: "/a/b".to_string(),
            length: 300,
            limit: 240,
        };
        assert_eq!(err.to_string(), "Path is too long (300 > 240): /a/b");
    }
}
