//! Name validation for configured databases and collections
//!
//! Names arrive from the environment, so they are checked before they reach
//! the driver. Records themselves are never validated.

use bookstore_common::{BookstoreError, Result};
use std::fmt;

/// Maximum allowed length for collection names (MongoDB limit is 255, we're more conservative)
const MAX_COLLECTION_NAME_LENGTH: usize = 120;

/// MongoDB limit for database names
const MAX_DATABASE_NAME_LENGTH: usize = 63;

/// Characters MongoDB rejects in database names
const FORBIDDEN_DATABASE_CHARS: [char; 7] = ['/', '\\', '.', ' ', '"', '$', '\0'];

/// Validated collection name
///
/// # Guarantees
/// - Not empty
/// - Maximum 120 characters
/// - No null bytes
/// - No "system." prefix (system collections)
/// - No $ characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCollectionName {
    name: String,
}

impl ValidatedCollectionName {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(BookstoreError::Validation(
                "Collection name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_COLLECTION_NAME_LENGTH {
            return Err(BookstoreError::Validation(format!(
                "Collection name exceeds maximum length of {} characters: '{}'",
                MAX_COLLECTION_NAME_LENGTH, name
            )));
        }

        if name.contains('\0') {
            return Err(BookstoreError::Validation(
                "Collection name cannot contain null bytes".to_string(),
            ));
        }

        if name.starts_with("system.") {
            return Err(BookstoreError::Validation(format!(
                "Collection name cannot start with 'system.' (reserved): '{}'",
                name
            )));
        }

        if name.contains('$') {
            return Err(BookstoreError::Validation(format!(
                "Collection name cannot contain '$' character: '{}'",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ValidatedCollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Validated database name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDatabaseName {
    name: String,
}

impl ValidatedDatabaseName {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(BookstoreError::Validation(
                "Database name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_DATABASE_NAME_LENGTH {
            return Err(BookstoreError::Validation(format!(
                "Database name exceeds maximum length of {} characters: '{}'",
                MAX_DATABASE_NAME_LENGTH, name
            )));
        }

        if let Some(c) = name.chars().find(|c| FORBIDDEN_DATABASE_CHARS.contains(c)) {
            return Err(BookstoreError::Validation(format!(
                "Database name cannot contain {:?}: '{}'",
                c, name
            )));
        }

        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ValidatedDatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
