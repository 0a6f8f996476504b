//! Query builders for find operations
//!
//! `BookFilter` covers the predicates the runner issues (exact equality on
//! text and boolean fields, strict lower bound on the publication year).
//! It renders to a BSON filter for the server and also evaluates in memory.

use crate::book::{Book, BookField};
use bson::{doc, Document as BsonDocument};
use mongodb::options::FindOptions;

/// Conjunction of field predicates; an empty filter matches every record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    title: Option<String>,
    author: Option<String>,
    genre: Option<String>,
    in_stock: Option<bool>,
    published_after: Option<i32>,
}

impl BookFilter {
    /// Create a filter matching all records
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact title match
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Exact author match
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Exact genre match
    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    /// Stock flag match
    pub fn in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = Some(in_stock);
        self
    }

    /// `publishedYear > year`
    pub fn published_after(mut self, year: i32) -> Self {
        self.published_after = Some(year);
        self
    }

    /// Keep only the predicate on `field`, if there is one
    pub fn restricted_to(&self, field: BookField) -> BookFilter {
        let mut restricted = BookFilter::new();
        match field {
            BookField::Title => restricted.title = self.title.clone(),
            BookField::Author => restricted.author = self.author.clone(),
            BookField::Genre => restricted.genre = self.genre.clone(),
            BookField::InStock => restricted.in_stock = self.in_stock,
            BookField::PublishedYear => restricted.published_after = self.published_after,
            BookField::Price => {}
        }
        restricted
    }

    /// Check whether no predicate is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Render as a server-side filter document
    pub fn to_document(&self) -> BsonDocument {
        let mut filter = BsonDocument::new();
        if let Some(title) = &self.title {
            filter.insert(BookField::Title.as_str(), title.as_str());
        }
        if let Some(author) = &self.author {
            filter.insert(BookField::Author.as_str(), author.as_str());
        }
        if let Some(genre) = &self.genre {
            filter.insert(BookField::Genre.as_str(), genre.as_str());
        }
        if let Some(in_stock) = self.in_stock {
            filter.insert(BookField::InStock.as_str(), in_stock);
        }
        if let Some(year) = self.published_after {
            filter.insert(BookField::PublishedYear.as_str(), doc! { "$gt": year });
        }
        filter
    }

    /// Evaluate against a record held in memory
    pub fn matches(&self, book: &Book) -> bool {
        self.title.as_ref().map_or(true, |t| *t == book.title)
            && self.author.as_ref().map_or(true, |a| *a == book.author)
            && self.genre.as_ref().map_or(true, |g| *g == book.genre)
            && self.in_stock.map_or(true, |s| s == book.in_stock)
            && self.published_after.map_or(true, |y| book.published_year > y)
    }
}

/// Sort direction for sorts and index keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// `1` or `-1`, as the server expects
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// Find request: filter, optional sort and pagination window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    filter: BookFilter,
    sort: Option<(BookField, SortDirection)>,
    skip: Option<u64>,
    limit: Option<i64>,
}

impl FindQuery {
    /// Create a query over all records
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter
    pub fn filter(mut self, filter: BookFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the sort order
    pub fn sort(mut self, field: BookField, direction: SortDirection) -> Self {
        self.sort = Some((field, direction));
        self
    }

    /// Set the number of records to skip
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Set the maximum number of records to return
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Select one 1-based page of `page_size` records
    ///
    /// Returns `None` for page 0 or when the offset overflows.
    pub fn page(self, page: u64, page_size: u64) -> Option<Self> {
        let offset = page.checked_sub(1)?.checked_mul(page_size)?;
        let limit = i64::try_from(page_size).ok()?;
        Some(self.skip(offset).limit(limit))
    }

    pub fn get_filter(&self) -> &BookFilter {
        &self.filter
    }

    pub fn get_sort(&self) -> Option<(BookField, SortDirection)> {
        self.sort
    }

    pub fn get_skip(&self) -> Option<u64> {
        self.skip
    }

    pub fn get_limit(&self) -> Option<i64> {
        self.limit
    }

    /// Driver options for this query, with an optional projection
    pub fn find_options(&self, projection: Option<BsonDocument>) -> FindOptions {
        let mut options = FindOptions::default();
        options.projection = projection;
        options.sort = self.sort.map(|(field, direction)| {
            let mut sort = BsonDocument::new();
            sort.insert(field.as_str(), direction.as_i32());
            sort
        });
        options.skip = self.skip;
        options.limit = self.limit;
        options
    }
}

/// `{title: 1, author: 1, price: 1, _id: 0}`
pub fn summary_projection() -> BsonDocument {
    let mut projection = BsonDocument::new();
    for field in BookField::SUMMARY {
        projection.insert(field.as_str(), 1);
    }
    projection.insert("_id", 0);
    projection
}
