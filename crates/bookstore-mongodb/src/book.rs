//! Book records and the result shapes returned by reads and aggregations
//!
//! Field names on the wire are camelCase (`publishedYear`, `inStock`), matching
//! the documents already stored in the `books` collection.
//!
//! Records are read as they are stored. Apart from `title`, a missing field
//! decodes to its empty value, and numbers may use any BSON numeric type
//! (`Double`, `Int32`, `Int64`, `Decimal128`).

use bookstore_common::{BookstoreError, Result};
use bson::{oid::ObjectId, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Default collection holding book records
pub const DEFAULT_COLLECTION: &str = "books";

/// A single book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default, deserialize_with = "lenient::to_i32")]
    pub published_year: i32,
    #[serde(default, deserialize_with = "lenient::to_f64")]
    pub price: f64,
    #[serde(default)]
    pub in_stock: bool,
}

impl Book {
    /// Create a record without an `_id`; the store assigns one on insert
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        genre: impl Into<String>,
        published_year: i32,
        price: f64,
        in_stock: bool,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: author.into(),
            genre: genre.into(),
            published_year,
            price,
            in_stock,
        }
    }

    /// Convert to BSON
    pub fn to_bson(&self) -> Result<BsonDocument> {
        bson::to_document(self).map_err(|e| BookstoreError::Serialization(e.to_string()))
    }

    /// Create from BSON
    pub fn from_bson(doc: BsonDocument) -> Result<Self> {
        bson::from_document(doc).map_err(|e| BookstoreError::Deserialization(e.to_string()))
    }

    /// The `{title, author, price}` projection of this record
    pub fn summary(&self) -> BookSummary {
        BookSummary {
            title: self.title.clone(),
            author: self.author.clone(),
            price: self.price,
        }
    }

    /// Total order on a single field, used for in-memory sorting
    pub fn cmp_by(&self, other: &Book, field: BookField) -> Ordering {
        match field {
            BookField::Title => self.title.cmp(&other.title),
            BookField::Author => self.author.cmp(&other.author),
            BookField::Genre => self.genre.cmp(&other.genre),
            BookField::PublishedYear => self.published_year.cmp(&other.published_year),
            BookField::Price => self.price.total_cmp(&other.price),
            BookField::InStock => self.in_stock.cmp(&other.in_stock),
        }
    }
}

/// Projected read shape: `{title, author, price}` without `_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, deserialize_with = "lenient::to_f64")]
    pub price: f64,
}

/// Stored field of a book record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookField {
    Title,
    Author,
    Genre,
    PublishedYear,
    Price,
    InStock,
}

impl BookField {
    /// Field name as stored in the collection
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Genre => "genre",
            Self::PublishedYear => "publishedYear",
            Self::Price => "price",
            Self::InStock => "inStock",
        }
    }

    /// Fields kept by the summary projection
    pub const SUMMARY: [BookField; 3] = [Self::Title, Self::Author, Self::Price];
}

impl fmt::Display for BookField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ _id: <genre>, averagePrice }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreAveragePrice {
    #[serde(rename = "_id")]
    pub genre: String,
    #[serde(rename = "averagePrice", default, deserialize_with = "lenient::to_f64")]
    pub average_price: f64,
}

/// `{ _id: <author>, bookCount }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorBookCount {
    #[serde(rename = "_id")]
    pub author: String,
    #[serde(rename = "bookCount")]
    pub book_count: i64,
}

/// `{ _id: <decade label>, count }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecadeCount {
    #[serde(rename = "_id")]
    pub decade: String,
    pub count: i64,
}

mod lenient {
    use bson::Bson;
    use serde::{Deserialize, Deserializer};

    fn number(value: &Bson) -> Option<f64> {
        match value {
            Bson::Double(n) => Some(*n),
            Bson::Int32(n) => Some(f64::from(*n)),
            Bson::Int64(n) => Some(*n as f64),
            Bson::Decimal128(d) => d.to_string().parse().ok(),
            _ => None,
        }
    }

    /// Any numeric value as `f64`; anything else is zero
    pub fn to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Bson::deserialize(deserializer)?;
        Ok(number(&value).filter(|n| n.is_finite()).unwrap_or_default())
    }

    /// Any numeric value rounded to `i32`; anything else is zero
    pub fn to_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Bson::deserialize(deserializer)?;
        Ok(number(&value)
            .filter(|n| n.is_finite())
            .map(|n| n.round() as i32)
            .unwrap_or_default())
    }
}

/// Decade label for a publication year: `floor(year / 10) * 10` followed by "s"
pub fn decade_label(published_year: i32) -> String {
    format!("{}s", published_year.div_euclid(10) * 10)
}
