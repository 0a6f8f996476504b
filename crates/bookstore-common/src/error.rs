//! Error types for the bookstore runner

use thiserror::Error;

/// Result type alias for bookstore operations
pub type Result<T> = std::result::Result<T, BookstoreError>;

/// Unified error type for store and runner operations
#[derive(Error, Debug, Clone)]
pub enum BookstoreError {
    #[error("MongoDB error: {0}")]
    MongoDB(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// An index name is already bound to a different definition
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl BookstoreError {
    /// Returns true if the store could not be reached at all
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, BookstoreError::Connection(_))
    }
}

impl From<serde_json::Error> for BookstoreError {
    fn from(err: serde_json::Error) -> Self {
        BookstoreError::Serialization(err.to_string())
    }
}

// Server codes for IndexOptionsConflict and IndexKeySpecsConflict
#[cfg(feature = "mongodb-errors")]
const INDEX_CONFLICT_CODES: [i32; 2] = [85, 86];

#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for BookstoreError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;
        match err.kind.as_ref() {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Authentication { .. } => BookstoreError::Connection(err.to_string()),
            ErrorKind::Command(command) if INDEX_CONFLICT_CODES.contains(&command.code) => {
                BookstoreError::Conflict(err.to_string())
            }
            _ => BookstoreError::MongoDB(err.to_string()),
        }
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for BookstoreError {
    fn from(err: bson::ser::Error) -> Self {
        BookstoreError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for BookstoreError {
    fn from(err: bson::de::Error) -> Self {
        BookstoreError::Deserialization(format!("BSON deserialization error: {}", err))
    }
}
