//! Index definitions and explain-plan statistics

use crate::book::BookField;
use crate::query::{BookFilter, SortDirection};
use bson::{doc, Bson, Document as BsonDocument};
use mongodb::options::IndexOptions;
use mongodb::IndexModel;
use serde::Serialize;

/// Name of the single-field title index
pub const TITLE_INDEX: &str = "idx_title";

/// Name of the compound author/year index
pub const AUTHOR_YEAR_INDEX: &str = "idx_author_publishedYear";

/// Name the server gives the primary key index
pub const ID_INDEX: &str = "_id_";

/// Named index over one or more book fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    name: String,
    keys: Vec<(BookField, SortDirection)>,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
        }
    }

    /// Append a key; order matters for compound indexes
    pub fn key(mut self, field: BookField, direction: SortDirection) -> Self {
        self.keys.push((field, direction));
        self
    }

    /// `{title: 1}` named `idx_title`
    pub fn title() -> Self {
        Self::new(TITLE_INDEX).key(BookField::Title, SortDirection::Ascending)
    }

    /// `{author: 1, publishedYear: -1}` named `idx_author_publishedYear`
    pub fn author_published_year() -> Self {
        Self::new(AUTHOR_YEAR_INDEX)
            .key(BookField::Author, SortDirection::Ascending)
            .key(BookField::PublishedYear, SortDirection::Descending)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key pattern as the server expects it
    pub fn keys_document(&self) -> BsonDocument {
        let mut keys = BsonDocument::new();
        for (field, direction) in &self.keys {
            keys.insert(field.as_str(), direction.as_i32());
        }
        keys
    }

    pub fn to_model(&self) -> IndexModel {
        IndexModel::builder()
            .keys(self.keys_document())
            .options(IndexOptions::builder().name(self.name.clone()).build())
            .build()
    }
}

/// Index metadata as listed by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub keys: BsonDocument,
}

impl IndexInfo {
    pub fn from_model(model: IndexModel) -> Self {
        let name = model
            .options
            .and_then(|options| options.name)
            .unwrap_or_default();
        Self {
            name,
            keys: model.keys,
        }
    }
}

impl From<&IndexSpec> for IndexInfo {
    fn from(spec: &IndexSpec) -> Self {
        Self {
            name: spec.name.clone(),
            keys: spec.keys_document(),
        }
    }
}

/// `explain` command for a find, at `executionStats` verbosity
pub fn explain_command(collection: &str, filter: &BookFilter, hint: Option<&str>) -> BsonDocument {
    let mut find = doc! {
        "find": collection,
        "filter": filter.to_document(),
    };
    if let Some(index_name) = hint {
        find.insert("hint", index_name);
    }
    doc! {
        "explain": find,
        "verbosity": "executionStats",
    }
}

/// Cost statistics of the winning plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainStats {
    /// Plan stages from the root down, e.g. `["FETCH", "IXSCAN"]`
    pub stages: Vec<String>,
    /// Index the plan scans, if any
    pub index_name: Option<String>,
    pub n_returned: i64,
    pub total_keys_examined: i64,
    pub total_docs_examined: i64,
    pub execution_time_millis: i64,
}

impl ExplainStats {
    /// True when the plan reads the whole collection
    pub fn is_collection_scan(&self) -> bool {
        self.stages.iter().any(|stage| stage == "COLLSCAN")
    }

    /// Extract statistics from an explain response
    pub fn from_explain(explain: &BsonDocument) -> Self {
        let stats = explain
            .get_document("executionStats")
            .cloned()
            .unwrap_or_default();

        // Servers running the slot-based engine nest the classic plan under `queryPlan`
        let winning_plan = explain
            .get_document("queryPlanner")
            .and_then(|planner| planner.get_document("winningPlan"))
            .map(|plan| plan.get_document("queryPlan").unwrap_or(plan))
            .ok();

        let mut stages = Vec::new();
        let mut index_name = None;
        let mut current = winning_plan;
        while let Some(stage) = current {
            if let Ok(name) = stage.get_str("stage") {
                stages.push(name.to_string());
            }
            if index_name.is_none() {
                index_name = stage.get_str("indexName").ok().map(str::to_string);
            }
            current = stage.get_document("inputStage").ok();
        }

        Self {
            stages,
            index_name,
            n_returned: integer(&stats, "nReturned"),
            total_keys_examined: integer(&stats, "totalKeysExamined"),
            total_docs_examined: integer(&stats, "totalDocsExamined"),
            execution_time_millis: integer(&stats, "executionTimeMillis"),
        }
    }
}

fn integer(doc: &BsonDocument, key: &str) -> i64 {
    match doc.get(key) {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        Some(Bson::Double(n)) => n.round() as i64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_index_keys() {
        let spec = IndexSpec::title();
        assert_eq!(spec.name(), "idx_title");
        assert_eq!(spec.keys_document(), doc! { "title": 1 });
    }

    #[test]
    fn test_author_year_index_keys_keep_order() {
        let spec = IndexSpec::author_published_year();
        assert_eq!(spec.name(), "idx_author_publishedYear");

        let keys = spec.keys_document();
        let names: Vec<&String> = keys.keys().collect();
        assert_eq!(names, vec!["author", "publishedYear"]);
        assert_eq!(keys.get_i32("author").unwrap(), 1);
        assert_eq!(keys.get_i32("publishedYear").unwrap(), -1);
    }

    #[test]
    fn test_to_model_carries_name() {
        let model = IndexSpec::title().to_model();
        let info = IndexInfo::from_model(model);
        assert_eq!(info.name, "idx_title");
        assert_eq!(info.keys, doc! { "title": 1 });
    }

    #[test]
    fn test_explain_command_with_hint() {
        let filter = BookFilter::new().title("Kindred");
        let command = explain_command("books", &filter, Some(TITLE_INDEX));

        assert_eq!(command.get_str("verbosity").unwrap(), "executionStats");
        let find = command.get_document("explain").unwrap();
        assert_eq!(find.get_str("find").unwrap(), "books");
        assert_eq!(find.get_document("filter").unwrap(), &doc! { "title": "Kindred" });
        assert_eq!(find.get_str("hint").unwrap(), "idx_title");
    }

    #[test]
    fn test_explain_command_without_hint() {
        let command = explain_command("books", &BookFilter::new().title("Kindred"), None);
        let find = command.get_document("explain").unwrap();
        assert!(!find.contains_key("hint"));
    }

    #[test]
    fn test_from_explain_collection_scan() {
        let explain = doc! {
            "queryPlanner": {
                "winningPlan": { "stage": "COLLSCAN", "direction": "forward" }
            },
            "executionStats": {
                "executionSuccess": true,
                "nReturned": 1,
                "executionTimeMillis": 0,
                "totalKeysExamined": 0,
                "totalDocsExamined": 25,
            }
        };

        let stats = ExplainStats::from_explain(&explain);
        assert!(stats.is_collection_scan());
        assert_eq!(stats.stages, vec!["COLLSCAN"]);
        assert_eq!(stats.index_name, None);
        assert_eq!(stats.total_docs_examined, 25);
        assert_eq!(stats.n_returned, 1);
    }

    #[test]
    fn test_from_explain_index_scan_nested_plan() {
        let explain = doc! {
            "queryPlanner": {
                "winningPlan": {
                    "queryPlan": {
                        "stage": "FETCH",
                        "inputStage": { "stage": "IXSCAN", "indexName": "idx_title" }
                    }
                }
            },
            "executionStats": {
                "nReturned": 1,
                "executionTimeMillis": 2_i64,
                "totalKeysExamined": 1,
                "totalDocsExamined": 1,
            }
        };

        let stats = ExplainStats::from_explain(&explain);
        assert!(!stats.is_collection_scan());
        assert_eq!(stats.stages, vec!["FETCH", "IXSCAN"]);
        assert_eq!(stats.index_name.as_deref(), Some("idx_title"));
        assert_eq!(stats.total_keys_examined, 1);
        assert_eq!(stats.execution_time_millis, 2);
    }

    #[test]
    fn test_from_explain_rounds_double_counters() {
        let explain = doc! {
            "executionStats": {
                "nReturned": 2.0,
                "totalKeysExamined": 2.9999999,
                "executionTimeMillis": Bson::Int64(7),
            },
        };

        let stats = ExplainStats::from_explain(&explain);
        assert_eq!(stats.n_returned, 2);
        assert_eq!(stats.total_keys_examined, 3);
        assert_eq!(stats.execution_time_millis, 7);
        assert_eq!(stats.total_docs_examined, 0);
        assert!(stats.stages.is_empty());
    }
}
