//! In-process `BookStore`
//!
//! Records keep insertion order, which stands in for the server's natural
//! order: unsorted reads, pagination and sort ties all follow it. Explain
//! reports a COLLSCAN unless an index leads with a field the filter pins
//! (or one is hinted), mirroring the server's planner for these queries.

use crate::book::{decade_label, AuthorBookCount, Book, BookField, BookSummary, DecadeCount, GenreAveragePrice};
use crate::index::{ExplainStats, IndexInfo, IndexSpec, ID_INDEX};
use crate::query::{BookFilter, FindQuery, SortDirection};
use crate::store::{BookStore, DeleteOutcome, UpdateOutcome};
use async_trait::async_trait;
use bookstore_common::{BookstoreError, Result};
use bson::{doc, oid::ObjectId};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug)]
struct MemoryState {
    books: Vec<Book>,
    indexes: Vec<IndexInfo>,
}

/// `BookStore` holding its records in memory
#[derive(Debug)]
pub struct MemoryBookStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryBookStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBookStore {
    /// Empty collection with only the `_id_` index
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                books: Vec::new(),
                indexes: vec![IndexInfo {
                    name: ID_INDEX.to_string(),
                    keys: doc! { "_id": 1 },
                }],
            }),
        }
    }

    /// Collection seeded with `books`, in order
    pub fn with_books(books: impl IntoIterator<Item = Book>) -> Self {
        let store = Self::new();
        for book in books {
            store.insert(book);
        }
        store
    }

    /// Append a record, assigning an `_id` when it has none
    pub fn insert(&self, mut book: Book) -> ObjectId {
        let id = *book.id.get_or_insert_with(ObjectId::new);
        self.state.lock().books.push(book);
        id
    }

    /// Copy of every record in natural order
    pub fn snapshot(&self) -> Vec<Book> {
        self.state.lock().books.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, query: &FindQuery) -> Result<Vec<Book>> {
        let state = self.state.lock();
        let mut matched: Vec<Book> = state
            .books
            .iter()
            .filter(|book| query.get_filter().matches(book))
            .cloned()
            .collect();

        if let Some((field, direction)) = query.get_sort() {
            // sort_by is stable, so equal keys keep natural order
            matched.sort_by(|a, b| match direction {
                SortDirection::Ascending => a.cmp_by(b, field),
                SortDirection::Descending => b.cmp_by(a, field),
            });
        }

        let skip = usize::try_from(query.get_skip().unwrap_or(0)).unwrap_or(usize::MAX);
        // The server treats a negative limit like its absolute value and zero as no limit
        let limit = match query.get_limit().map(i64::unsigned_abs) {
            None | Some(0) => usize::MAX,
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };

        Ok(matched.into_iter().skip(skip).take(limit).collect())
    }
}

fn find_index<'a>(indexes: &'a [IndexInfo], name: &str) -> Result<&'a IndexInfo> {
    indexes
        .iter()
        .find(|index| index.name == name)
        .ok_or_else(|| {
            BookstoreError::Query(format!(
                "hint provided does not correspond to an existing index: {}",
                name
            ))
        })
}

/// Book field an index leads with, if it is one
fn leading_field(index: &IndexInfo) -> Option<BookField> {
    let first = index.keys.keys().next()?;
    [
        BookField::Title,
        BookField::Author,
        BookField::Genre,
        BookField::PublishedYear,
        BookField::Price,
        BookField::InStock,
    ]
    .into_iter()
    .find(|field| field.as_str() == first)
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn find(&self, query: &FindQuery) -> Result<Vec<Book>> {
        self.select(query)
    }

    async fn find_summaries(&self, query: &FindQuery) -> Result<Vec<BookSummary>> {
        Ok(self.select(query)?.iter().map(Book::summary).collect())
    }

    async fn update_price(&self, title: &str, price: f64) -> Result<UpdateOutcome> {
        let mut state = self.state.lock();
        let Some(book) = state.books.iter_mut().find(|book| book.title == title) else {
            return Ok(UpdateOutcome {
                matched_count: 0,
                modified_count: 0,
            });
        };

        // Setting a field to its current value matches without modifying
        let modified = book.price != price;
        book.price = price;
        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count: u64::from(modified),
        })
    }

    async fn delete_by_title(&self, title: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        let deleted_count = match state.books.iter().position(|book| book.title == title) {
            Some(position) => {
                state.books.remove(position);
                1
            }
            None => 0,
        };
        Ok(DeleteOutcome { deleted_count })
    }

    async fn average_price_by_genre(&self) -> Result<Vec<GenreAveragePrice>> {
        let state = self.state.lock();
        let mut groups: Vec<(String, f64, u32)> = Vec::new();
        for book in &state.books {
            match groups.iter_mut().find(|(genre, _, _)| *genre == book.genre) {
                Some((_, sum, count)) => {
                    *sum += book.price;
                    *count += 1;
                }
                None => groups.push((book.genre.clone(), book.price, 1)),
            }
        }

        let mut averages: Vec<GenreAveragePrice> = groups
            .into_iter()
            .map(|(genre, sum, count)| GenreAveragePrice {
                genre,
                average_price: sum / f64::from(count),
            })
            .collect();
        averages.sort_by(|a, b| b.average_price.total_cmp(&a.average_price));
        Ok(averages)
    }

    async fn top_author(&self) -> Result<Option<AuthorBookCount>> {
        let state = self.state.lock();
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for book in &state.books {
            *counts.entry(book.author.as_str()).or_default() += 1;
        }

        // Highest count first, ties by author name
        Ok(counts
            .into_iter()
            .min_by(|(a_name, a_count), (b_name, b_count)| {
                b_count.cmp(a_count).then_with(|| a_name.cmp(b_name))
            })
            .map(|(author, book_count)| AuthorBookCount {
                author: author.to_string(),
                book_count,
            }))
    }

    async fn books_by_decade(&self) -> Result<Vec<DecadeCount>> {
        let state = self.state.lock();
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for book in &state.books {
            *counts.entry(decade_label(book.published_year)).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(decade, count)| DecadeCount { decade, count })
            .collect())
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        Ok(self.state.lock().indexes.clone())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String> {
        let mut state = self.state.lock();
        let requested = IndexInfo::from(spec);

        if let Some(existing) = state.indexes.iter().find(|index| index.name == requested.name) {
            if existing.keys == requested.keys {
                return Ok(requested.name);
            }
            return Err(BookstoreError::Conflict(format!(
                "an index named {} already exists with different keys",
                requested.name
            )));
        }
        if let Some(existing) = state.indexes.iter().find(|index| index.keys == requested.keys) {
            return Err(BookstoreError::Conflict(format!(
                "index {} already covers these keys under the name {}",
                requested.name, existing.name
            )));
        }

        let name = requested.name.clone();
        state.indexes.push(requested);
        Ok(name)
    }

    async fn explain(&self, filter: &BookFilter, hint: Option<&str>) -> Result<ExplainStats> {
        let state = self.state.lock();
        let total = state.books.len() as i64;
        let n_returned = state.books.iter().filter(|book| filter.matches(book)).count() as i64;

        let hinted = hint.map(|name| find_index(&state.indexes, name)).transpose()?;
        let usable = hinted.or_else(|| {
            state.indexes.iter().find(|index| {
                leading_field(index).is_some_and(|field| !filter.restricted_to(field).is_empty())
            })
        });

        let stats = match usable {
            Some(index) => {
                // Scan bounds come from the leading key; a hinted index without one scans every key
                let examined = match leading_field(index).map(|field| filter.restricted_to(field)) {
                    Some(bounds) if !bounds.is_empty() => {
                        state.books.iter().filter(|book| bounds.matches(book)).count() as i64
                    }
                    _ => total,
                };
                ExplainStats {
                    stages: vec!["FETCH".to_string(), "IXSCAN".to_string()],
                    index_name: Some(index.name.clone()),
                    n_returned,
                    total_keys_examined: examined,
                    total_docs_examined: examined,
                    execution_time_millis: 0,
                }
            }
            None => ExplainStats {
                stages: vec!["COLLSCAN".to_string()],
                index_name: None,
                n_returned,
                total_keys_examined: 0,
                total_docs_examined: total,
                execution_time_millis: 0,
            },
        };
        Ok(stats)
    }
}
