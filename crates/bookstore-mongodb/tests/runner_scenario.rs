//! Runner behaviour against the in-memory store

use async_trait::async_trait;
use bookstore_mongodb::{
    AuthorBookCount, Book, BookField, BookFilter, BookStore, BookSummary, BookstoreError, Catalog,
    DecadeCount, DeleteOutcome, ExplainStats, FindQuery, GenreAveragePrice, IndexInfo, IndexSpec,
    MemoryBookStore, QueryRunner, Result, SortDirection, Step, StepOutcome, UpdateOutcome,
};
use parking_lot::Mutex;

fn scenario_books() -> Vec<Book> {
    vec![
        Book::new("A", "X", "SF", 2012, 10.0, true),
        Book::new("B", "X", "SF", 2018, 20.0, false),
        Book::new("C", "Y", "Drama", 2005, 15.0, true),
    ]
}

fn scenario_catalog() -> Catalog {
    Catalog {
        genre: "SF".to_string(),
        author: "X".to_string(),
        in_stock_after: 2010,
        update_title: "C".to_string(),
        new_price: 17.5,
        delete_title: "No Such Title".to_string(),
        page: 1,
        page_size: 2,
        explain_title: "A".to_string(),
        ..Catalog::default()
    }
}

fn titles(books: &[Book]) -> Vec<&str> {
    books.iter().map(|book| book.title.as_str()).collect()
}

fn summary_titles(summaries: &[BookSummary]) -> Vec<&str> {
    summaries.iter().map(|summary| summary.title.as_str()).collect()
}

#[tokio::test]
async fn test_scenario_genre_author_and_stock_filters() {
    let store = MemoryBookStore::with_books(scenario_books());
    let runner = QueryRunner::new(scenario_catalog()).with_steps([
        Step::BooksByGenre,
        Step::TopAuthor,
        Step::InStockPublishedAfter,
    ]);

    let report = runner.run(&store).await.unwrap();
    assert_eq!(
        report.steps(),
        vec![Step::BooksByGenre, Step::InStockPublishedAfter, Step::TopAuthor]
    );

    match report.get(Step::BooksByGenre) {
        Some(StepOutcome::Books(books)) => assert_eq!(titles(books), vec!["A", "B"]),
        other => panic!("unexpected genre outcome: {:?}", other),
    }

    match report.get(Step::TopAuthor) {
        Some(StepOutcome::TopAuthor(Some(top))) => {
            assert_eq!(
                top,
                &AuthorBookCount {
                    author: "X".to_string(),
                    book_count: 2
                }
            );
        }
        other => panic!("unexpected top author outcome: {:?}", other),
    }

    match report.get(Step::InStockPublishedAfter) {
        Some(StepOutcome::Summaries(summaries)) => {
            assert_eq!(
                summaries,
                &vec![BookSummary {
                    title: "A".to_string(),
                    author: "X".to_string(),
                    price: 10.0,
                }]
            );
        }
        other => panic!("unexpected in-stock outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_published_after_is_strict() {
    let store = MemoryBookStore::with_books(scenario_books());
    let catalog = Catalog {
        published_after: 2012,
        ..scenario_catalog()
    };
    let runner = QueryRunner::new(catalog);

    match runner.run_step(&store, Step::BooksPublishedAfter).await.unwrap() {
        StepOutcome::Books(books) => assert_eq!(titles(&books), vec!["B"]),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_no_match_is_empty_not_error() {
    let store = MemoryBookStore::with_books(scenario_books());
    let catalog = Catalog {
        genre: "Poetry".to_string(),
        author: "Nobody".to_string(),
        ..scenario_catalog()
    };
    let runner = QueryRunner::new(catalog);

    for step in [Step::BooksByGenre, Step::BooksByAuthor] {
        match runner.run_step(&store, step).await.unwrap() {
            StepOutcome::Books(books) => assert!(books.is_empty()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_update_changes_only_matched_price() {
    let store = MemoryBookStore::with_books(scenario_books());
    let before = store.snapshot();

    let outcome = store.update_price("C", 17.5).await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome {
            matched_count: 1,
            modified_count: 1
        }
    );

    let after = store.snapshot();
    for (old, new) in before.iter().zip(&after) {
        if old.title == "C" {
            assert_eq!(new.price, 17.5);
            assert_eq!(
                Book { price: old.price, ..new.clone() },
                old.clone(),
                "only the price may change"
            );
        } else {
            assert_eq!(old, new);
        }
    }
}

#[tokio::test]
async fn test_update_missing_title_reports_zero() {
    let store = MemoryBookStore::with_books(scenario_books());
    let before = store.snapshot();

    let outcome = store.update_price("Missing", 1.0).await.unwrap();
    assert_eq!(outcome.matched_count, 0);
    assert_eq!(outcome.modified_count, 0);
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_delete_removes_exactly_matched_record() {
    let store = MemoryBookStore::with_books(scenario_books());

    let outcome = store.delete_by_title("B").await.unwrap();
    assert_eq!(outcome.deleted_count, 1);
    assert_eq!(titles(&store.snapshot()), vec!["A", "C"]);
}

#[tokio::test]
async fn test_delete_missing_title_leaves_collection_unchanged() {
    let store = MemoryBookStore::with_books(scenario_books());
    let before = store.snapshot();

    let runner = QueryRunner::new(scenario_catalog());
    match runner.run_step(&store, Step::DeleteByTitle).await.unwrap() {
        StepOutcome::Deleted(outcome) => assert_eq!(outcome.deleted_count, 0),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_sorted_reads_are_reverses() {
    let store = MemoryBookStore::with_books(scenario_books());
    let runner = QueryRunner::new(scenario_catalog());

    let ascending = match runner.run_step(&store, Step::SortByPriceAscending).await.unwrap() {
        StepOutcome::Summaries(summaries) => summaries,
        other => panic!("unexpected outcome: {:?}", other),
    };
    let descending = match runner.run_step(&store, Step::SortByPriceDescending).await.unwrap() {
        StepOutcome::Summaries(summaries) => summaries,
        other => panic!("unexpected outcome: {:?}", other),
    };

    assert_eq!(summary_titles(&ascending), vec!["A", "C", "B"]);
    let mut reversed = descending.clone();
    reversed.reverse();
    assert_eq!(ascending, reversed);
}

#[tokio::test]
async fn test_sort_ties_keep_natural_order() {
    let store = MemoryBookStore::with_books([
        Book::new("First", "X", "SF", 2000, 9.0, true),
        Book::new("Second", "Y", "SF", 2001, 9.0, true),
        Book::new("Cheap", "Z", "SF", 2002, 1.0, true),
    ]);

    let query = FindQuery::new().sort(BookField::Price, SortDirection::Descending);
    let summaries = store.find_summaries(&query).await.unwrap();
    assert_eq!(summary_titles(&summaries), vec!["First", "Second", "Cheap"]);
}

#[tokio::test]
async fn test_pagination_partitions_natural_order() {
    let books: Vec<Book> = (0..5)
        .map(|i| Book::new(format!("T{}", i), "X", "SF", 2000 + i, 10.0 + f64::from(i), true))
        .collect();
    let store = MemoryBookStore::with_books(books);

    let everything = store.find_summaries(&FindQuery::new()).await.unwrap();

    let mut concatenated = Vec::new();
    for page in 1..=3 {
        let runner = QueryRunner::new(Catalog {
            page,
            page_size: 2,
            ..scenario_catalog()
        });
        match runner.run_step(&store, Step::Paginate).await.unwrap() {
            StepOutcome::Summaries(summaries) => {
                assert!(summaries.len() <= 2);
                concatenated.extend(summaries);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
    assert_eq!(concatenated, everything);

    let past_end = QueryRunner::new(Catalog {
        page: 4,
        page_size: 2,
        ..scenario_catalog()
    });
    match past_end.run_step(&store, Step::Paginate).await.unwrap() {
        StepOutcome::Summaries(summaries) => assert!(summaries.is_empty()),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_average_price_by_genre() {
    let store = MemoryBookStore::with_books([
        Book::new("A", "X", "SF", 2012, 10.0, true),
        Book::new("B", "X", "SF", 2018, 20.0, false),
        Book::new("C", "Y", "SF", 2005, 30.0, true),
        Book::new("D", "Y", "Drama", 2005, 5.0, true),
    ]);

    let averages = store.average_price_by_genre().await.unwrap();
    assert_eq!(
        averages,
        vec![
            GenreAveragePrice {
                genre: "SF".to_string(),
                average_price: 20.0
            },
            GenreAveragePrice {
                genre: "Drama".to_string(),
                average_price: 5.0
            },
        ]
    );
    assert!(averages.iter().all(|group| group.genre != "Poetry"));
}

#[tokio::test]
async fn test_books_by_decade() {
    let store = MemoryBookStore::with_books([
        Book::new("Late", "X", "SF", 2020, 10.0, true),
        Book::new("Mid", "X", "SF", 2013, 10.0, true),
        Book::new("Also mid", "Y", "SF", 2019, 10.0, true),
        Book::new("Old", "Y", "SF", 1999, 10.0, true),
    ]);

    let decades = store.books_by_decade().await.unwrap();
    assert_eq!(
        decades,
        vec![
            DecadeCount {
                decade: "1990s".to_string(),
                count: 1
            },
            DecadeCount {
                decade: "2010s".to_string(),
                count: 2
            },
            DecadeCount {
                decade: "2020s".to_string(),
                count: 1
            },
        ]
    );
}

#[tokio::test]
async fn test_empty_collection_has_no_top_author() {
    let store = MemoryBookStore::new();
    let runner = QueryRunner::new(scenario_catalog());

    match runner.run_step(&store, Step::TopAuthor).await.unwrap() {
        StepOutcome::TopAuthor(top) => assert!(top.is_none()),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(store.average_price_by_genre().await.unwrap().is_empty());
    assert!(store.books_by_decade().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_full_checklist_demonstrates_index_plans() {
    let store = MemoryBookStore::with_books(scenario_books());
    let report = QueryRunner::new(scenario_catalog()).run(&store).await.unwrap();
    assert_eq!(report.steps(), Step::ALL.to_vec());
    assert!(report.finished_at >= report.started_at);

    match report.get(Step::ListIndexes) {
        Some(StepOutcome::Indexes(indexes)) => {
            let names: Vec<&str> = indexes.iter().map(|index| index.name.as_str()).collect();
            assert_eq!(names, vec!["_id_"]);
        }
        other => panic!("unexpected index listing: {:?}", other),
    }

    let explain = |step| match report.get(step) {
        Some(StepOutcome::Explain(stats)) => stats.clone(),
        other => panic!("unexpected explain outcome: {:?}", other),
    };
    let baseline = explain(Step::ExplainBaseline);
    let indexed = explain(Step::ExplainIndexed);
    let hinted = explain(Step::ExplainHinted);

    assert!(baseline.is_collection_scan());
    assert_eq!(baseline.total_docs_examined, 3);
    assert!(!indexed.is_collection_scan());
    assert_eq!(indexed.total_docs_examined, 1);
    assert_eq!(hinted.index_name.as_deref(), Some("idx_title"));

    let names: Vec<String> = store
        .list_indexes()
        .await
        .unwrap()
        .into_iter()
        .map(|index| index.name)
        .collect();
    assert_eq!(names, vec!["_id_", "idx_title", "idx_author_publishedYear"]);

    // Same names and keys on a second run: nothing new is created
    QueryRunner::new(scenario_catalog()).run(&store).await.unwrap();
    assert_eq!(store.list_indexes().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_invalid_catalog_runs_nothing() {
    let store = FailingStore::new(None);
    let runner = QueryRunner::new(Catalog {
        page: 0,
        ..scenario_catalog()
    });

    let result = runner.run(&store).await;
    assert!(matches!(result, Err(BookstoreError::Validation(_))));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_failure_aborts_remaining_steps() {
    let store = FailingStore::new(Some("delete_by_title"));
    let result = QueryRunner::new(scenario_catalog()).run(&store).await;

    match result {
        Err(BookstoreError::MongoDB(message)) => assert!(message.contains("delete_by_title")),
        other => panic!("expected store failure, got {:?}", other.map(|r| r.steps())),
    }
    assert_eq!(
        store.calls(),
        vec!["find", "find", "find", "update_price", "delete_by_title"]
    );
}

/// Memory store that records each call and fails the named one
struct FailingStore {
    inner: MemoryBookStore,
    fail_on: Option<&'static str>,
    calls: Mutex<Vec<&'static str>>,
}

impl FailingStore {
    fn new(fail_on: Option<&'static str>) -> Self {
        Self {
            inner: MemoryBookStore::with_books(scenario_books()),
            fail_on,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &'static str) -> Result<()> {
        self.calls.lock().push(call);
        if self.fail_on == Some(call) {
            return Err(BookstoreError::MongoDB(format!("{} failed", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl BookStore for FailingStore {
    async fn find(&self, query: &FindQuery) -> Result<Vec<Book>> {
        self.record("find")?;
        self.inner.find(query).await
    }

    async fn find_summaries(&self, query: &FindQuery) -> Result<Vec<BookSummary>> {
        self.record("find_summaries")?;
        self.inner.find_summaries(query).await
    }

    async fn update_price(&self, title: &str, price: f64) -> Result<UpdateOutcome> {
        self.record("update_price")?;
        self.inner.update_price(title, price).await
    }

    async fn delete_by_title(&self, title: &str) -> Result<DeleteOutcome> {
        self.record("delete_by_title")?;
        self.inner.delete_by_title(title).await
    }

    async fn average_price_by_genre(&self) -> Result<Vec<GenreAveragePrice>> {
        self.record("average_price_by_genre")?;
        self.inner.average_price_by_genre().await
    }

    async fn top_author(&self) -> Result<Option<AuthorBookCount>> {
        self.record("top_author")?;
        self.inner.top_author().await
    }

    async fn books_by_decade(&self) -> Result<Vec<DecadeCount>> {
        self.record("books_by_decade")?;
        self.inner.books_by_decade().await
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        self.record("list_indexes")?;
        self.inner.list_indexes().await
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String> {
        self.record("create_index")?;
        self.inner.create_index(spec).await
    }

    async fn explain(&self, filter: &BookFilter, hint: Option<&str>) -> Result<ExplainStats> {
        self.record("explain")?;
        self.inner.explain(filter, hint).await
    }
}
