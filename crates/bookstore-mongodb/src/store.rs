//! The command interface the runner issues against a book collection
//!
//! `BookStore` is the seam between the runner and the database engine.
//! `MongoBookStore` forwards every call to a MongoDB collection in one round
//! trip; `MemoryBookStore` (see `memory.rs`) gives the same answers in process.

use crate::book::{AuthorBookCount, Book, BookSummary, DecadeCount, GenreAveragePrice};
use crate::index::{explain_command, ExplainStats, IndexInfo, IndexSpec};
use crate::pipeline;
use crate::query::{summary_projection, BookFilter, FindQuery};
use async_trait::async_trait;
use bookstore_common::Result;
use bson::{doc, Document as BsonDocument};
use futures::TryStreamExt;
use mongodb::{Collection, Database};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Counts reported by a point update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Count reported by a point delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

/// Find, update, delete, aggregate and index commands over book records
///
/// A title that matches nothing is a zero-count success for updates and
/// deletes, never an error.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Full records matching the query
    async fn find(&self, query: &FindQuery) -> Result<Vec<Book>>;

    /// `{title, author, price}` projections of records matching the query
    async fn find_summaries(&self, query: &FindQuery) -> Result<Vec<BookSummary>>;

    /// Set the price of at most one record with this exact title
    async fn update_price(&self, title: &str, price: f64) -> Result<UpdateOutcome>;

    /// Remove at most one record with this exact title
    async fn delete_by_title(&self, title: &str) -> Result<DeleteOutcome>;

    /// Mean price per genre, highest first
    async fn average_price_by_genre(&self) -> Result<Vec<GenreAveragePrice>>;

    /// Author with the most records, `None` for an empty collection
    async fn top_author(&self) -> Result<Option<AuthorBookCount>>;

    /// Record count per decade label, ascending by label
    async fn books_by_decade(&self) -> Result<Vec<DecadeCount>>;

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>>;

    /// Create the index and return its name; recreating an identical index is a no-op
    async fn create_index(&self, spec: &IndexSpec) -> Result<String>;

    /// Execution statistics for a find with this filter, optionally forcing an index
    async fn explain(&self, filter: &BookFilter, hint: Option<&str>) -> Result<ExplainStats>;
}

/// `BookStore` backed by a MongoDB collection
#[derive(Debug, Clone)]
pub struct MongoBookStore {
    database: Database,
    collection: Collection<BsonDocument>,
}

impl MongoBookStore {
    pub fn new(database: &Database, collection_name: &str) -> Self {
        Self {
            database: database.clone(),
            collection: database.collection(collection_name),
        }
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    async fn find_typed<T>(&self, query: &FindQuery, projection: Option<BsonDocument>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let filter = query.get_filter().to_document();
        debug!(collection = self.collection_name(), ?filter, "find");

        let cursor = self
            .collection
            .clone_with_type::<T>()
            .find(filter)
            .with_options(query.find_options(projection))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn aggregate<T>(&self, stages: Vec<BsonDocument>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        debug!(collection = self.collection_name(), ?stages, "aggregate");

        let cursor = self.collection.aggregate(stages).await?;
        let docs: Vec<BsonDocument> = cursor.try_collect().await?;
        docs.into_iter()
            .map(|doc| bson::from_document(doc).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl BookStore for MongoBookStore {
    async fn find(&self, query: &FindQuery) -> Result<Vec<Book>> {
        self.find_typed(query, None).await
    }

    async fn find_summaries(&self, query: &FindQuery) -> Result<Vec<BookSummary>> {
        self.find_typed(query, Some(summary_projection())).await
    }

    async fn update_price(&self, title: &str, price: f64) -> Result<UpdateOutcome> {
        let filter = BookFilter::new().title(title).to_document();
        let update = doc! { "$set": { "price": price } };

        let result = self.collection.update_one(filter, update).await?;
        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_by_title(&self, title: &str) -> Result<DeleteOutcome> {
        let filter = BookFilter::new().title(title).to_document();

        let result = self.collection.delete_one(filter).await?;
        Ok(DeleteOutcome {
            deleted_count: result.deleted_count,
        })
    }

    async fn average_price_by_genre(&self) -> Result<Vec<GenreAveragePrice>> {
        self.aggregate(pipeline::average_price_by_genre()).await
    }

    async fn top_author(&self) -> Result<Option<AuthorBookCount>> {
        let mut groups: Vec<AuthorBookCount> = self.aggregate(pipeline::top_author()).await?;
        Ok(if groups.is_empty() {
            None
        } else {
            Some(groups.swap_remove(0))
        })
    }

    async fn books_by_decade(&self) -> Result<Vec<DecadeCount>> {
        self.aggregate(pipeline::books_by_decade()).await
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        let cursor = self.collection.list_indexes().await?;
        let models: Vec<mongodb::IndexModel> = cursor.try_collect().await?;
        Ok(models.into_iter().map(IndexInfo::from_model).collect())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String> {
        let result = self.collection.create_index(spec.to_model()).await?;
        Ok(result.index_name)
    }

    async fn explain(&self, filter: &BookFilter, hint: Option<&str>) -> Result<ExplainStats> {
        let command = explain_command(self.collection_name(), filter, hint);
        let response = self.database.run_command(command).await?;
        Ok(ExplainStats::from_explain(&response))
    }
}
