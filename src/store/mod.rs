//! Persistence of parsed records and per-query run logs.
//!
//! The crawler only sees the [`RecordSink`] seam; [`PaperStore`] is the
//! `SQLite` implementation backed by [`Database`].
//!
//! # Example
//!
//! ```ignore
//! use scopus_core::store::{PaperStore, RecordSink};
//! use scopus_core::Database;
//!
//! let db = Database::new(Path::new("papers.db")).await?;
//! let store = PaperStore::new(db);
//! let outcome = store.store(&record, &query).await?;
//! ```

mod error;

pub use error::{StoreDbErrorKind, StoreError};

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, Row};
use tracing::{debug, instrument};

use crate::crawl::QueryOutcome;
use crate::db::Database;
use crate::search::{ParsedRecord, RecordKey, SearchQuery};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Aggregation types whose abstracts feed text statistics, lower-cased.
pub const DEFAULT_ABSTRACT_SOURCES: [&str; 2] = ["journal", "conference proceeding"];

/// What happened to a record handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOutcome {
    /// A new row was written.
    Inserted,
    /// A record with the same key already exists.
    Duplicate,
    /// The record has neither DOI nor title and cannot be de-duplicated.
    Unidentifiable,
}

/// Destination for crawled records.
///
/// Implementations must be idempotent: handing over the same record twice
/// stores it once.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Stores `record` unless a record with the same key exists.
    async fn store(&self, record: &ParsedRecord, query: &SearchQuery) -> Result<StoreOutcome>;

    /// Keys of every record already stored.
    async fn known_keys(&self) -> Result<HashSet<RecordKey>>;

    /// Records the outcome of one executed query.
    async fn log_query(&self, outcome: &QueryOutcome) -> Result<()>;
}

/// A stored paper row.
#[derive(Debug, Clone, FromRow)]
pub struct PaperRow {
    /// Row id.
    pub id: i64,
    /// DOI, when known.
    pub doi: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Abstract text.
    #[sqlx(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Author ids as a JSON array.
    pub authors: String,
    /// Publication year.
    pub year: Option<String>,
    /// Publication month.
    pub month: Option<String>,
    /// Source title.
    pub journal: Option<String>,
    /// Source type.
    pub aggregation_type: Option<String>,
    /// Country of the first affiliation.
    pub country: Option<String>,
    /// Citation count at crawl time, as delivered.
    pub cited_by: Option<String>,
    /// Author keywords as a JSON array.
    pub keywords: String,
    /// Query that found the paper.
    pub search_query: String,
}

impl PaperRow {
    /// Decoded author ids; empty if the column is not a JSON array.
    #[must_use]
    pub fn author_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.authors).unwrap_or_default()
    }

    /// Decoded keywords; empty if the column is not a JSON array.
    #[must_use]
    pub fn keyword_list(&self) -> Vec<String> {
        serde_json::from_str(&self.keywords).unwrap_or_default()
    }
}

/// A logged query execution.
#[derive(Debug, Clone, FromRow)]
pub struct SearchRun {
    /// Row id.
    pub id: i64,
    /// Rendered query string.
    pub query: String,
    /// Keyword part.
    pub keyword: String,
    /// Document type part.
    pub doc_type: String,
    /// Declared total, if the first page arrived.
    pub total_results: Option<i64>,
    /// Records handed to the sink.
    pub processed: i64,
    /// Records newly written.
    pub stored: i64,
    /// Records already present.
    pub duplicates: i64,
    /// Failure text for aborted queries.
    pub error: Option<String>,
}

/// `SQLite`-backed paper store.
#[derive(Debug, Clone)]
pub struct PaperStore {
    db: Database,
}

impl PaperStore {
    /// Creates a store over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether a paper with `key` is stored.
    ///
    /// A title key only matches papers that have no DOI.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn exists(&self, key: &RecordKey) -> Result<bool> {
        let row = match key {
            RecordKey::Doi(doi) => {
                sqlx::query(r"SELECT COUNT(*) AS count FROM papers WHERE doi = ?")
                    .bind(doi)
                    .fetch_one(self.db.pool())
                    .await?
            }
            RecordKey::Title(title) => {
                sqlx::query(
                    r"SELECT COUNT(*) AS count FROM papers WHERE doi IS NULL AND title = ?",
                )
                .bind(title)
                .fetch_one(self.db.pool())
                .await?
            }
        };
        Ok(row.get::<i64, _>("count") > 0)
    }

    /// Inserts `record` unless its key is already present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] if a list column cannot be encoded, or
    /// [`StoreError::Database`] if a statement fails.
    #[instrument(skip(self, record), fields(query = %query))]
    pub async fn insert(&self, record: &ParsedRecord, query: &SearchQuery) -> Result<StoreOutcome> {
        let Some(key) = record.key() else {
            return Ok(StoreOutcome::Unidentifiable);
        };
        if self.exists(&key).await? {
            debug!(?key, "paper already stored");
            return Ok(StoreOutcome::Duplicate);
        }

        let authors = serde_json::to_string(&record.authors)
            .map_err(|e| StoreError::serialize("authors", &e))?;
        let keywords = serde_json::to_string(&record.keywords)
            .map_err(|e| StoreError::serialize("keywords", &e))?;

        // OR IGNORE covers a concurrent writer slipping in after the check.
        let result = sqlx::query(
            r"INSERT OR IGNORE INTO papers (
                doi,
                title,
                abstract,
                authors,
                cover_date,
                year,
                month,
                journal,
                aggregation_type,
                country,
                cited_by,
                keywords,
                search_query
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.doi.as_deref())
        .bind(record.title.as_deref())
        .bind(record.abstract_text.as_deref())
        .bind(authors)
        .bind(record.cover_date.as_deref())
        .bind(record.year.as_deref())
        .bind(record.month.as_deref())
        .bind(record.journal.as_deref())
        .bind(record.aggregation_type.as_deref())
        .bind(record.country.as_deref())
        .bind(record.cited_by.as_deref())
        .bind(keywords)
        .bind(query.to_query_string())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            Ok(StoreOutcome::Duplicate)
        } else {
            Ok(StoreOutcome::Inserted)
        }
    }

    /// Number of stored papers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query(r"SELECT COUNT(*) AS count FROM papers")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.get("count"))
    }

    /// All stored papers in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn papers(&self) -> Result<Vec<PaperRow>> {
        let rows = sqlx::query_as::<_, PaperRow>(
            r"SELECT id, doi, title, abstract, authors, year, month, journal,
                     aggregation_type, country, cited_by, keywords, search_query
              FROM papers
              ORDER BY id ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Non-empty abstracts whose aggregation type is one of `aggregation_types`
    /// (compared case-insensitively). An empty filter returns every abstract.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn abstracts(&self, aggregation_types: &[&str]) -> Result<Vec<String>> {
        let mut sql = String::from(
            "SELECT abstract FROM papers WHERE abstract IS NOT NULL AND abstract != ''",
        );
        if !aggregation_types.is_empty() {
            let placeholders = vec!["?"; aggregation_types.len()].join(", ");
            sql.push_str(" AND LOWER(aggregation_type) IN (");
            sql.push_str(&placeholders);
            sql.push(')');
        }
        sql.push_str(" ORDER BY id ASC");

        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for aggregation_type in aggregation_types {
            query = query.bind(aggregation_type.to_lowercase());
        }
        Ok(query.fetch_all(self.db.pool()).await?)
    }

    /// Logged query executions in order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn search_runs(&self) -> Result<Vec<SearchRun>> {
        let rows = sqlx::query_as::<_, SearchRun>(
            r"SELECT id, query, keyword, doc_type, total_results, processed, stored,
                     duplicates, error
              FROM search_runs
              ORDER BY id ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecordSink for PaperStore {
    async fn store(&self, record: &ParsedRecord, query: &SearchQuery) -> Result<StoreOutcome> {
        self.insert(record, query).await
    }

    async fn known_keys(&self) -> Result<HashSet<RecordKey>> {
        let rows = sqlx::query(r"SELECT doi, title FROM papers")
            .fetch_all(self.db.pool())
            .await?;

        let mut keys = HashSet::with_capacity(rows.len());
        for row in rows {
            let doi: Option<String> = row.try_get("doi")?;
            let title: Option<String> = row.try_get("title")?;
            let key = doi.map(RecordKey::Doi).or_else(|| title.map(RecordKey::Title));
            keys.extend(key);
        }
        Ok(keys)
    }

    async fn log_query(&self, outcome: &QueryOutcome) -> Result<()> {
        sqlx::query(
            r"INSERT INTO search_runs (
                query,
                keyword,
                doc_type,
                total_results,
                processed,
                stored,
                duplicates,
                error
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(outcome.query.to_query_string())
        .bind(&outcome.query.keyword)
        .bind(&outcome.query.doc_type)
        .bind(outcome.total_results.map(to_i64))
        .bind(to_i64(outcome.processed))
        .bind(to_i64(outcome.stored))
        .bind(to_i64(outcome.duplicates))
        .bind(outcome.failure.as_deref())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn store() -> PaperStore {
        PaperStore::new(Database::new_in_memory().await.unwrap())
    }

    fn record(doi: Option<&str>, title: &str) -> ParsedRecord {
        ParsedRecord {
            doi: doi.map(str::to_string),
            title: Some(title.to_string()),
            abstract_text: Some(format!("Abstract of {title}")),
            authors: vec!["1".to_string(), "2".to_string()],
            aggregation_type: Some("Journal".to_string()),
            keywords: vec!["ai".to_string()],
            ..ParsedRecord::default()
        }
    }

    fn query() -> SearchQuery {
        SearchQuery::new("ai", "ar")
    }

    #[tokio::test]
    async fn test_store_insert_then_duplicate_doi() {
        let store = store().await;
        let first = record(Some("10.1/a"), "Title A");
        let same_doi = record(Some("10.1/a"), "Different title");

        assert_eq!(store.insert(&first, &query()).await.unwrap(), StoreOutcome::Inserted);
        assert_eq!(
            store.insert(&same_doi, &query()).await.unwrap(),
            StoreOutcome::Duplicate
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_title_dedup_only_without_doi() {
        let store = store().await;
        assert_eq!(
            store.insert(&record(None, "Shared"), &query()).await.unwrap(),
            StoreOutcome::Inserted
        );
        assert_eq!(
            store.insert(&record(None, "Shared"), &query()).await.unwrap(),
            StoreOutcome::Duplicate
        );
        // Same title with a DOI is a different paper.
        assert_eq!(
            store
                .insert(&record(Some("10.1/b"), "Shared"), &query())
                .await
                .unwrap(),
            StoreOutcome::Inserted
        );
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_store_unidentifiable_record_is_not_written() {
        let store = store().await;
        let outcome = store.insert(&ParsedRecord::default(), &query()).await.unwrap();
        assert_eq!(outcome, StoreOutcome::Unidentifiable);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_list_columns_round_trip_as_json() {
        let store = store().await;
        store
            .insert(&record(Some("10.1/c"), "Lists"), &query())
            .await
            .unwrap();
        let rows = store.papers().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].author_ids(), vec!["1", "2"]);
        assert_eq!(rows[0].keyword_list(), vec!["ai"]);
        assert_eq!(rows[0].search_query, "ai AND DOCTYPE(ar)");
    }

    #[tokio::test]
    async fn test_store_known_keys_uses_doi_then_title() {
        let store = store().await;
        store.insert(&record(Some("10.1/d"), "With DOI"), &query()).await.unwrap();
        store.insert(&record(None, "No DOI"), &query()).await.unwrap();

        let keys = store.known_keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&RecordKey::Doi("10.1/d".to_string())));
        assert!(keys.contains(&RecordKey::Title("No DOI".to_string())));
    }

    #[tokio::test]
    async fn test_store_abstracts_filter_by_aggregation_type() {
        let store = store().await;
        store.insert(&record(Some("10.1/e"), "Journal paper"), &query()).await.unwrap();
        let mut book = record(Some("10.1/f"), "Book chapter");
        book.aggregation_type = Some("Book".to_string());
        store.insert(&book, &query()).await.unwrap();
        let mut bare = record(Some("10.1/g"), "No abstract");
        bare.abstract_text = None;
        store.insert(&bare, &query()).await.unwrap();

        let filtered = store.abstracts(&DEFAULT_ABSTRACT_SOURCES).await.unwrap();
        assert_eq!(filtered, vec!["Abstract of Journal paper"]);

        let all = store.abstracts(&[]).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_store_log_query_persists_run() {
        let store = store().await;
        let outcome = QueryOutcome {
            query: query(),
            total_results: Some(120),
            processed: 100,
            stored: 98,
            duplicates: 2,
            failure: None,
        };
        store.log_query(&outcome).await.unwrap();

        let failed = QueryOutcome {
            query: SearchQuery::new("ai", "cp"),
            total_results: None,
            processed: 0,
            stored: 0,
            duplicates: 0,
            failure: Some("HTTP 500".to_string()),
        };
        store.log_query(&failed).await.unwrap();

        let runs = store.search_runs().await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].query, "ai AND DOCTYPE(ar)");
        assert_eq!(runs[0].total_results, Some(120));
        assert_eq!(runs[0].stored, 98);
        assert_eq!(runs[1].doc_type, "cp");
        assert_eq!(runs[1].total_results, None);
        assert_eq!(runs[1].error.as_deref(), Some("HTTP 500"));
    }
}
