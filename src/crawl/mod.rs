//! The crawl loop: every (keyword, document type) pair, page by page.
//!
//! For each pair the crawler starts at cursor `*`, fetches a page through the
//! [`RateLimitedFetcher`], filters and parses the entries, hands each record to
//! a [`RecordSink`] and follows `cursor.@next` until the declared total or the
//! per-query limit is reached.
//!
//! A failure inside one pair aborts only that pair. Key exhaustion and storage
//! failures stop the whole run.
//!
//! # Example
//!
//! ```ignore
//! let crawler = Crawler::new(fetcher, Arc::new(PaperStore::new(db)), CrawlOptions::default());
//! let report = crawler.run(&["ai".into()], &["ar".into(), "cp".into()]).await?;
//! println!("{} stored, {} queries failed", report.stored(), report.failed());
//! ```

mod lookup;
mod report;

pub use lookup::{LookupClient, LookupCounter, LookupError};
pub use report::{CrawlReport, QueryOutcome};

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::fetch::{FetchError, RateLimitedFetcher, ScopusEndpoints};
use crate::keys::{KeyPoolError, ServiceClass};
use crate::search::{
    PageError, PageFilterCounts, RecordKey, SearchPage, SearchQuery, filter_page_count,
    parse_entry,
};
use crate::store::{RecordSink, StoreError, StoreOutcome};

/// Cursor value that requests the first page.
pub const START_CURSOR: &str = "*";

/// Default number of entries requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

const SORT_ORDER: &str = "citedby-count";
const SEARCH_VIEW: &str = "COMPLETE";

/// Where duplicate detection happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// The sink checks existence before every insert.
    #[default]
    Sink,
    /// The crawler also keeps a run-wide key set seeded from the sink.
    InMemory,
}

/// Knobs for a crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Upstream endpoints.
    pub endpoints: ScopusEndpoints,
    /// Entries requested per page.
    pub page_size: u32,
    /// Stop a query after this many records reached the sink.
    pub per_query_limit: Option<u64>,
    /// Drop entries with fewer pages than this.
    pub min_pages: Option<i64>,
    /// Inclusive publication year window applied to every query.
    pub year_range: Option<(i32, i32)>,
    /// Duplicate detection strategy.
    pub dedup: DedupStrategy,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            endpoints: ScopusEndpoints::default(),
            page_size: DEFAULT_PAGE_SIZE,
            per_query_limit: None,
            min_pages: None,
            year_range: None,
            dedup: DedupStrategy::default(),
        }
    }
}

/// Errors that stop a whole crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Every paper-search key is exhausted.
    #[error(transparent)]
    NoMoreKeys(#[from] KeyPoolError),

    /// The sink failed; records can no longer be persisted.
    #[error("record sink failed: {0}")]
    Store(#[from] StoreError),
}

/// Reasons a single query stops early.
#[derive(Debug, Error)]
enum QueryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unexpected search response: {0}")]
    Page(#[from] PageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives searches through the fetcher into a sink.
pub struct Crawler {
    fetcher: Arc<RateLimitedFetcher>,
    sink: Arc<dyn RecordSink>,
    options: CrawlOptions,
}

impl Crawler {
    /// Creates a crawler.
    #[must_use]
    pub fn new(
        fetcher: Arc<RateLimitedFetcher>,
        sink: Arc<dyn RecordSink>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            fetcher,
            sink,
            options,
        }
    }

    /// The options this crawler runs with.
    #[must_use]
    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Crawls the cross product of `keywords` and `doc_types`, keywords outermost.
    ///
    /// # Errors
    ///
    /// See [`Crawler::run_queries`].
    pub async fn run(
        &self,
        keywords: &[String],
        doc_types: &[String],
    ) -> Result<CrawlReport, CrawlError> {
        let queries = SearchQuery::cross_product(keywords, doc_types, self.options.year_range);
        self.run_queries(&queries).await
    }

    /// Crawls `queries` in order.
    ///
    /// # Errors
    ///
    /// - [`CrawlError::NoMoreKeys`] when the paper-search keys are exhausted
    /// - [`CrawlError::Store`] when the sink fails
    ///
    /// Other failures are recorded in the report and the crawl moves on.
    #[instrument(skip(self, queries), fields(queries = queries.len()))]
    pub async fn run_queries(&self, queries: &[SearchQuery]) -> Result<CrawlReport, CrawlError> {
        let mut known_keys = match self.options.dedup {
            DedupStrategy::Sink => None,
            DedupStrategy::InMemory => {
                let keys = self.sink.known_keys().await?;
                debug!(known = keys.len(), "seeded in-memory dedup set");
                Some(keys)
            }
        };

        let mut report = CrawlReport::default();
        for query in queries {
            info!(query = %query, "Starting query");
            let mut outcome = QueryOutcome::new(query.clone());

            let result = self
                .crawl_query(query, &mut outcome, known_keys.as_mut(), &mut report.filter)
                .await;

            match result {
                Ok(()) => info!(
                    query = %query,
                    total = ?outcome.total_results,
                    processed = outcome.processed,
                    stored = outcome.stored,
                    duplicates = outcome.duplicates,
                    "Query finished"
                ),
                Err(QueryError::Fetch(FetchError::Keys(e))) => {
                    outcome.failure = Some(e.to_string());
                    if let Err(log_err) = self.sink.log_query(&outcome).await {
                        warn!(error = %log_err, "failed to log aborted query");
                    }
                    return Err(CrawlError::NoMoreKeys(e));
                }
                Err(QueryError::Store(e)) => return Err(CrawlError::Store(e)),
                Err(e) => {
                    error!(query = %query, error = %e, "Query aborted");
                    outcome.failure = Some(e.to_string());
                }
            }

            self.sink.log_query(&outcome).await?;
            report.queries.push(outcome);
        }

        Ok(report)
    }

    async fn crawl_query(
        &self,
        query: &SearchQuery,
        outcome: &mut QueryOutcome,
        mut known_keys: Option<&mut HashSet<RecordKey>>,
        filter_counts: &mut PageFilterCounts,
    ) -> Result<(), QueryError> {
        let url = self.options.endpoints.search();
        let query_string = query.to_query_string();
        let count = self.options.page_size.to_string();
        let mut cursor = START_CURSOR.to_string();
        let mut seen: u64 = 0;

        loop {
            let params = [
                ("query", query_string.as_str()),
                ("cursor", cursor.as_str()),
                ("count", count.as_str()),
                ("sort", SORT_ORDER),
                ("view", SEARCH_VIEW),
            ];
            let body = self
                .fetcher
                .fetch(ServiceClass::PaperSearch, &url, &params)
                .await?;
            let page = SearchPage::from_json(&body)?;

            let total = *outcome.total_results.get_or_insert(page.total_results);
            let page_len = page.entries.len() as u64;
            seen += page_len;
            debug!(cursor = %cursor, entries = page_len, seen, total, "page received");

            let entries = match self.options.min_pages {
                Some(min_pages) => {
                    let filtered = filter_page_count(page.entries, min_pages);
                    filter_counts.add(filtered.counts);
                    filtered.kept
                }
                None => page.entries,
            };

            for entry in &entries {
                if self.limit_reached(outcome) {
                    break;
                }

                let parsed = parse_entry(entry);
                let record = parsed.record;
                if !parsed.malformed_fields.is_empty() {
                    warn!(
                        fields = ?parsed.malformed_fields,
                        title = record.title.as_deref().unwrap_or("<untitled>"),
                        "entry has malformed fields"
                    );
                }

                let key = record.key();
                if let (Some(keys), Some(key)) = (known_keys.as_deref(), key.as_ref())
                    && keys.contains(key)
                {
                    outcome.duplicates += 1;
                    continue;
                }

                outcome.processed += 1;
                match self.sink.store(&record, query).await? {
                    StoreOutcome::Inserted => {
                        outcome.stored += 1;
                        if let (Some(keys), Some(key)) = (known_keys.as_deref_mut(), key) {
                            keys.insert(key);
                        }
                    }
                    StoreOutcome::Duplicate => outcome.duplicates += 1,
                    StoreOutcome::Unidentifiable => {
                        warn!(query = %query, "entry has neither DOI nor title, not stored");
                    }
                }
            }

            if self.limit_reached(outcome) {
                debug!(processed = outcome.processed, "per-query limit reached");
                return Ok(());
            }
            if seen >= total || page_len == 0 {
                return Ok(());
            }
            match page.next_cursor {
                Some(next) if next != cursor => cursor = next,
                _ => {
                    debug!(seen, total, "no further cursor, ending query");
                    return Ok(());
                }
            }
        }
    }

    fn limit_reached(&self, outcome: &QueryOutcome) -> bool {
        self.options
            .per_query_limit
            .is_some_and(|limit| outcome.processed >= limit)
    }
}
