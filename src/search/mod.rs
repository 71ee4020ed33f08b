//! Scopus search: query construction, page decoding, filtering and record
//! normalization.
//!
//! The crawler drives these pieces in order for every page it receives:
//!
//! 1. [`SearchQuery`] renders the boolean query string sent as `query`.
//! 2. [`SearchPage::from_json`] pulls the total, entries and next cursor out
//!    of the `search-results` envelope.
//! 3. [`filter_page_count`] optionally drops short papers (fail open).
//! 4. [`parse_entry`] turns each raw entry into a [`ParsedRecord`].
//!
//! # Example
//!
//! ```
//! use scopus_core::search::{SearchQuery, parse_entry};
//!
//! let query = SearchQuery::new("ai", "ar").with_year_range(2019, 2021);
//! assert_eq!(
//!     query.to_query_string(),
//!     "ai AND DOCTYPE(ar) AND (PUBYEAR AFT 2018 AND PUBYEAR BEF 2022)"
//! );
//!
//! let entry = serde_json::json!({"dc:title": "Deep nets", "authkeywords": "ai | climate"});
//! let parsed = parse_entry(&entry);
//! assert_eq!(parsed.record.keywords, vec!["ai", "climate"]);
//! ```

mod filter;
mod page;
mod query;
mod record;

pub use filter::{PAGE_RANGE_FIELD, PageFilterCounts, PageFilterOutcome, filter_page_count};
pub use page::{PageError, SearchPage};
pub use query::SearchQuery;
pub use record::{ParsedEntry, ParsedRecord, RecordKey, parse_entry};
