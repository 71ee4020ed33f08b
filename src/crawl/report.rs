//! Outcome reporting for a crawl run.

use serde::Serialize;

use crate::search::{PageFilterCounts, SearchQuery};

/// What one (keyword, document type) query produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOutcome {
    /// The executed query.
    pub query: SearchQuery,
    /// Declared total from the first page; `None` if no page arrived.
    pub total_results: Option<u64>,
    /// Records handed to the sink.
    pub processed: u64,
    /// Records newly stored.
    pub stored: u64,
    /// Records already known, by the sink or the run-wide key set.
    pub duplicates: u64,
    /// Why the query was aborted, if it was.
    pub failure: Option<String>,
}

impl QueryOutcome {
    /// An empty outcome for `query`.
    #[must_use]
    pub fn new(query: SearchQuery) -> Self {
        Self {
            query,
            total_results: None,
            processed: 0,
            stored: 0,
            duplicates: 0,
            failure: None,
        }
    }

    /// Whether the query was aborted.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Summary of a whole crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// One outcome per query, in execution order.
    pub queries: Vec<QueryOutcome>,
    /// Page filter counters summed over every page.
    pub filter: PageFilterCounts,
}

impl CrawlReport {
    /// Number of aborted queries.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.queries.iter().filter(|q| q.is_failed()).count()
    }

    /// Number of queries that ran to completion.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.queries.len() - self.failed()
    }

    /// Records newly stored across all queries.
    #[must_use]
    pub fn stored(&self) -> u64 {
        self.queries.iter().map(|q| q.stored).sum()
    }

    /// Records handed to the sink across all queries.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.queries.iter().map(|q| q.processed).sum()
    }
}
