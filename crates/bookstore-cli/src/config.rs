//! Environment configuration
//!
//! ```text
//! MONGODB_URI            connection string (required when connecting)
//! BOOKSTORE_DB           database name, default "plp_bookstore"
//! BOOKSTORE_COLLECTION   collection name, default "books"
//! ```

use bookstore_common::{BookstoreError, Result};
use bookstore_mongodb::book::DEFAULT_COLLECTION;
use bookstore_mongodb::{ValidatedCollectionName, ValidatedDatabaseName};

pub const URI_VAR: &str = "MONGODB_URI";
pub const DATABASE_VAR: &str = "BOOKSTORE_DB";
pub const COLLECTION_VAR: &str = "BOOKSTORE_COLLECTION";

pub const DEFAULT_DATABASE: &str = "plp_bookstore";

#[derive(Debug, Clone)]
pub struct AppConfig {
    uri: Option<String>,
    pub database: ValidatedDatabaseName,
    pub collection: ValidatedCollectionName,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database = read(DATABASE_VAR).unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let collection = read(COLLECTION_VAR).unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        Ok(Self {
            uri: read(URI_VAR),
            database: ValidatedDatabaseName::new(&database)?,
            collection: ValidatedCollectionName::new(&collection)?,
        })
    }

    /// Connection string; missing is a connection failure
    pub fn require_uri(&self) -> Result<&str> {
        self.uri
            .as_deref()
            .ok_or_else(|| BookstoreError::Connection(format!("{} is not set", URI_VAR)))
    }
}
