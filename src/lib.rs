//! Scopus Crawler Core Library
//!
//! Crawls the Scopus search API for every (keyword, document type) pair,
//! rotating API keys as their quotas run out, and stores normalized paper
//! records in `SQLite`.
//!
//! # Architecture
//!
//! - [`keys`] - Per-service API key pools with quota-aware rotation
//! - [`fetch`] - HTTP fetcher that retries on quota exhaustion with the next key
//! - [`search`] - Query strings, page decoding, page-count filter, record parsing
//! - [`store`] - Record sink seam and the `SQLite` paper store
//! - [`crawl`] - The crawl loop plus abstract/author lookups
//! - [`analysis`] - N-gram statistics over stored abstracts
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod crawl;
pub mod db;
pub mod fetch;
pub mod keys;
pub mod search;
pub mod store;

#[cfg(test)]
mod test_support;
mod user_agent;

// Re-export commonly used types
pub use crawl::{CrawlError, CrawlOptions, CrawlReport, Crawler, DedupStrategy, QueryOutcome};
pub use db::{Database, DbError};
pub use fetch::{FetchError, FetcherSettings, RateLimitedFetcher, ScopusEndpoints, ServiceThrottle};
pub use keys::{ApiKey, KeyPool, KeyPoolError, ServiceClass};
pub use search::{ParsedRecord, RecordKey, SearchQuery};
pub use store::{PaperStore, RecordSink, StoreError, StoreOutcome};
