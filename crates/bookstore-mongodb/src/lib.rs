//! Book collection queries over MongoDB
//!
//! This crate runs a fixed checklist of reads, point writes, aggregations and
//! index operations against a `books` collection.
//!
//! # Features
//! - Typed filters, projections, sorting and pagination
//! - Aggregation pipelines (average price per genre, top author, decade buckets)
//! - Index listing, creation and explain-plan statistics
//! - `BookStore` seam with MongoDB and in-memory implementations

pub mod book;
pub mod connection;
pub mod index;
pub mod memory;
pub mod pipeline;
pub mod query;
pub mod runner;
pub mod store;
pub mod validation;

pub use bookstore_common::{BookstoreError, Result};
pub use book::{AuthorBookCount, Book, BookField, BookSummary, DecadeCount, GenreAveragePrice};
pub use connection::{Connection, PoolConfig};
pub use index::{ExplainStats, IndexInfo, IndexSpec};
pub use memory::MemoryBookStore;
pub use query::{BookFilter, FindQuery, SortDirection};
pub use runner::{Catalog, QueryRunner, RunReport, Step, StepOutcome};
pub use store::{BookStore, DeleteOutcome, MongoBookStore, UpdateOutcome};
pub use validation::{ValidatedCollectionName, ValidatedDatabaseName};
