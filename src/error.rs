//! Error types for Archivist.

use thiserror::Error;

use crate::auth::validation::ValidationError;

/// Common error type for Archivist.
///
/// Permission denials and missing records are not errors: operations
/// signal them with `false`, `None` or an empty list.
#[derive(Error, Debug)]
pub enum ArchivistError {
    /// User-facing validation failure. The message is safe to show.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Key-value store failure (transport or transaction).
    ///
    /// Errors from sqlx are converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored JSON record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Password hashing failure.
    #[error("password error: {0}")]
    Password(#[from] crate::auth::PasswordError),

    /// Remote storage collaborator failure.
    #[error("remote storage error: {0}")]
    Remote(String),

    /// Mail delivery failure.
    #[error("mail error: {0}")]
    Mail(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ArchivistError {
    /// Returns the validation error if this is a user-facing failure.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ArchivistError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ArchivistError {
    fn from(e: sqlx::Error) -> Self {
        ArchivistError::Database(e.to_string())
    }
}

/// Result type alias for Archivist operations.
pub type Result<T> = std::result::Result<T, ArchivistError>;
