//! The query runner: a fixed checklist of independent steps
//!
//! Each step is one round trip to the store. Steps run strictly in checklist
//! order, each result is logged before the next step starts, and the first
//! failure stops the run.

use crate::book::{AuthorBookCount, Book, BookField, BookSummary, DecadeCount, GenreAveragePrice};
use crate::index::{ExplainStats, IndexInfo, IndexSpec, TITLE_INDEX};
use crate::query::{BookFilter, FindQuery, SortDirection};
use crate::store::{BookStore, DeleteOutcome, UpdateOutcome};
use bookstore_common::{BookstoreError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{error, info};

/// One entry of the checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Step {
    BooksByGenre,
    BooksPublishedAfter,
    BooksByAuthor,
    UpdatePrice,
    DeleteByTitle,
    InStockPublishedAfter,
    SortByPriceAscending,
    SortByPriceDescending,
    Paginate,
    AveragePriceByGenre,
    TopAuthor,
    BooksByDecade,
    ListIndexes,
    ExplainBaseline,
    CreateTitleIndex,
    CreateAuthorYearIndex,
    ExplainIndexed,
    ExplainHinted,
}

impl Step {
    /// Every step, in checklist order
    pub const ALL: [Step; 18] = [
        Step::BooksByGenre,
        Step::BooksPublishedAfter,
        Step::BooksByAuthor,
        Step::UpdatePrice,
        Step::DeleteByTitle,
        Step::InStockPublishedAfter,
        Step::SortByPriceAscending,
        Step::SortByPriceDescending,
        Step::Paginate,
        Step::AveragePriceByGenre,
        Step::TopAuthor,
        Step::BooksByDecade,
        Step::ListIndexes,
        Step::ExplainBaseline,
        Step::CreateTitleIndex,
        Step::CreateAuthorYearIndex,
        Step::ExplainIndexed,
        Step::ExplainHinted,
    ];

    /// Name accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Step::BooksByGenre => "books-by-genre",
            Step::BooksPublishedAfter => "books-published-after",
            Step::BooksByAuthor => "books-by-author",
            Step::UpdatePrice => "update-price",
            Step::DeleteByTitle => "delete-by-title",
            Step::InStockPublishedAfter => "in-stock-published-after",
            Step::SortByPriceAscending => "sort-by-price-asc",
            Step::SortByPriceDescending => "sort-by-price-desc",
            Step::Paginate => "paginate",
            Step::AveragePriceByGenre => "average-price-by-genre",
            Step::TopAuthor => "top-author",
            Step::BooksByDecade => "books-by-decade",
            Step::ListIndexes => "list-indexes",
            Step::ExplainBaseline => "explain-baseline",
            Step::CreateTitleIndex => "create-title-index",
            Step::CreateAuthorYearIndex => "create-author-year-index",
            Step::ExplainIndexed => "explain-indexed",
            Step::ExplainHinted => "explain-hinted",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Step::BooksByGenre => "Books in genre",
            Step::BooksPublishedAfter => "Books published after year",
            Step::BooksByAuthor => "Books by author",
            Step::UpdatePrice => "Price update result",
            Step::DeleteByTitle => "Delete result",
            Step::InStockPublishedAfter => "In-stock books published after year",
            Step::SortByPriceAscending => "Books sorted by price (ascending)",
            Step::SortByPriceDescending => "Books sorted by price (descending)",
            Step::Paginate => "Page of books",
            Step::AveragePriceByGenre => "Average price by genre",
            Step::TopAuthor => "Author with most books",
            Step::BooksByDecade => "Books grouped by decade",
            Step::ListIndexes => "Existing indexes",
            Step::ExplainBaseline => "Explain before creating index",
            Step::CreateTitleIndex => "Index created on { title: 1 }",
            Step::CreateAuthorYearIndex => "Index created on { author: 1, publishedYear: -1 }",
            Step::ExplainIndexed => "Explain after creating index",
            Step::ExplainHinted => "Explain using hint 'idx_title'",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.name() == s)
            .ok_or_else(|| format!("Unknown step: '{}'. Run `bookstore steps` for the list", s))
    }
}

/// Parameters of the checklist
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub genre: String,
    pub published_after: i32,
    pub author: String,
    pub update_title: String,
    pub new_price: f64,
    pub delete_title: String,
    pub in_stock_after: i32,
    /// 1-based
    pub page: u64,
    pub page_size: u64,
    pub explain_title: String,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            genre: "Science Fiction".to_string(),
            published_after: 2015,
            author: "F. Scott Fitzgerald".to_string(),
            update_title: "Kindred".to_string(),
            new_price: 18.99,
            delete_title: "Old Man's War".to_string(),
            in_stock_after: 2010,
            page: 2,
            page_size: 5,
            explain_title: "Kindred".to_string(),
        }
    }
}

impl Catalog {
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(BookstoreError::Validation("page must be at least 1".to_string()));
        }
        if self.page_size == 0 {
            return Err(BookstoreError::Validation(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn page_query(&self) -> Result<FindQuery> {
        FindQuery::new()
            .page(self.page, self.page_size)
            .ok_or_else(|| {
                BookstoreError::Validation(format!(
                    "page {} of size {} is out of range",
                    self.page, self.page_size
                ))
            })
    }
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepOutcome {
    Books(Vec<Book>),
    Summaries(Vec<BookSummary>),
    Updated(UpdateOutcome),
    Deleted(DeleteOutcome),
    GenreAverages(Vec<GenreAveragePrice>),
    TopAuthor(Option<AuthorBookCount>),
    Decades(Vec<DecadeCount>),
    Indexes(Vec<IndexInfo>),
    IndexCreated(IndexInfo),
    Explain(ExplainStats),
}

impl StepOutcome {
    /// Pretty JSON for the log
    pub fn render(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Outcomes of a completed run, in checklist order
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<(Step, StepOutcome)>,
}

impl RunReport {
    pub fn get(&self, step: Step) -> Option<&StepOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn steps(&self) -> Vec<Step> {
        self.outcomes.iter().map(|(step, _)| *step).collect()
    }
}

/// Runs the checklist against a store
#[derive(Debug, Clone)]
pub struct QueryRunner {
    catalog: Catalog,
    steps: Vec<Step>,
}

impl QueryRunner {
    /// Runner for the whole checklist
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            steps: Step::ALL.to_vec(),
        }
    }

    /// Restrict to `steps`; they still run in checklist order, once each
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        let mut selected: Vec<Step> = steps.into_iter().collect();
        selected.sort();
        selected.dedup();
        self.steps = selected;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every selected step, stopping at the first failure
    pub async fn run(&self, store: &dyn BookStore) -> Result<RunReport> {
        self.catalog.validate()?;

        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(self.steps.len());

        for &step in &self.steps {
            let outcome = match self.run_step(store, step).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(step = step.name(), error = %e, "step failed, aborting run");
                    return Err(e);
                }
            };
            info!(step = step.name(), "{}:\n{}", step.description(), outcome.render()?);
            outcomes.push((step, outcome));
        }

        let finished_at = Utc::now();
        info!(
            steps = outcomes.len(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "run complete"
        );
        Ok(RunReport {
            started_at,
            finished_at,
            outcomes,
        })
    }

    /// Execute a single step
    pub async fn run_step(&self, store: &dyn BookStore, step: Step) -> Result<StepOutcome> {
        let catalog = &self.catalog;
        let explain_filter = BookFilter::new().title(catalog.explain_title.as_str());

        let outcome = match step {
            Step::BooksByGenre => {
                let query = FindQuery::new().filter(BookFilter::new().genre(catalog.genre.as_str()));
                StepOutcome::Books(store.find(&query).await?)
            }
            Step::BooksPublishedAfter => {
                let query =
                    FindQuery::new().filter(BookFilter::new().published_after(catalog.published_after));
                StepOutcome::Books(store.find(&query).await?)
            }
            Step::BooksByAuthor => {
                let query = FindQuery::new().filter(BookFilter::new().author(catalog.author.as_str()));
                StepOutcome::Books(store.find(&query).await?)
            }
            Step::UpdatePrice => StepOutcome::Updated(
                store
                    .update_price(&catalog.update_title, catalog.new_price)
                    .await?,
            ),
            Step::DeleteByTitle => {
                StepOutcome::Deleted(store.delete_by_title(&catalog.delete_title).await?)
            }
            Step::InStockPublishedAfter => {
                let filter = BookFilter::new()
                    .in_stock(true)
                    .published_after(catalog.in_stock_after);
                StepOutcome::Summaries(store.find_summaries(&FindQuery::new().filter(filter)).await?)
            }
            Step::SortByPriceAscending => {
                let query = FindQuery::new().sort(BookField::Price, SortDirection::Ascending);
                StepOutcome::Summaries(store.find_summaries(&query).await?)
            }
            Step::SortByPriceDescending => {
                let query = FindQuery::new().sort(BookField::Price, SortDirection::Descending);
                StepOutcome::Summaries(store.find_summaries(&query).await?)
            }
            Step::Paginate => {
                StepOutcome::Summaries(store.find_summaries(&catalog.page_query()?).await?)
            }
            Step::AveragePriceByGenre => {
                StepOutcome::GenreAverages(store.average_price_by_genre().await?)
            }
            Step::TopAuthor => StepOutcome::TopAuthor(store.top_author().await?),
            Step::BooksByDecade => StepOutcome::Decades(store.books_by_decade().await?),
            Step::ListIndexes => StepOutcome::Indexes(store.list_indexes().await?),
            Step::ExplainBaseline | Step::ExplainIndexed => {
                StepOutcome::Explain(store.explain(&explain_filter, None).await?)
            }
            Step::CreateTitleIndex => create_index(store, IndexSpec::title()).await?,
            Step::CreateAuthorYearIndex => {
                create_index(store, IndexSpec::author_published_year()).await?
            }
            Step::ExplainHinted => {
                StepOutcome::Explain(store.explain(&explain_filter, Some(TITLE_INDEX)).await?)
            }
        };
        Ok(outcome)
    }
}

async fn create_index(store: &dyn BookStore, spec: IndexSpec) -> Result<StepOutcome> {
    let name = store.create_index(&spec).await?;
    Ok(StepOutcome::IndexCreated(IndexInfo {
        name,
        keys: spec.keys_document(),
    }))
}
