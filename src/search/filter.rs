//! Page-count filter over raw search entries.
//!
//! The filter fails open: an entry whose page range cannot be read is kept and
//! counted, never dropped.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Entry field holding `"<first>-<last>"`.
pub const PAGE_RANGE_FIELD: &str = "prism:pageRange";

/// Counters produced by [`filter_page_count`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageFilterCounts {
    /// Range present but unparseable (entry kept).
    pub unexpected: u64,
    /// No range at all (entry kept).
    pub no_page_info: u64,
    /// Parsed range shorter than the minimum (entry dropped).
    pub skipped: u64,
}

impl PageFilterCounts {
    /// Adds another set of counters into this one.
    pub fn add(&mut self, other: Self) {
        self.unexpected += other.unexpected;
        self.no_page_info += other.no_page_info;
        self.skipped += other.skipped;
    }
}

/// Entries that survived the filter plus the counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageFilterOutcome {
    /// Entries kept, in input order.
    pub kept: Vec<Value>,
    /// What happened to the rest.
    pub counts: PageFilterCounts,
}

enum PageRange {
    Absent,
    Unparseable,
    Pages(i64),
}

fn page_range(entry: &Value) -> PageRange {
    let raw = match entry.get(PAGE_RANGE_FIELD) {
        None | Some(Value::Null) => return PageRange::Absent,
        Some(Value::String(raw)) => raw,
        Some(_) => return PageRange::Unparseable,
    };

    let parts: Vec<&str> = raw.split('-').collect();
    let [first, last] = parts.as_slice() else {
        return PageRange::Unparseable;
    };
    match (first.trim().parse::<i64>(), last.trim().parse::<i64>()) {
        (Ok(first), Ok(last)) => last
            .checked_sub(first)
            .and_then(|span| span.checked_add(1))
            .map_or(PageRange::Unparseable, PageRange::Pages),
        _ => PageRange::Unparseable,
    }
}

/// Keeps entries with at least `min_pages` pages.
///
/// Entries without a page range, or with one that does not parse, are kept
/// and counted. The boundary is inclusive: `"1-10"` passes `min_pages = 10`.
#[must_use]
pub fn filter_page_count(entries: Vec<Value>, min_pages: i64) -> PageFilterOutcome {
    let mut outcome = PageFilterOutcome::default();

    for entry in entries {
        match page_range(&entry) {
            PageRange::Absent => {
                outcome.counts.no_page_info += 1;
                outcome.kept.push(entry);
            }
            PageRange::Unparseable => {
                debug!(range = ?entry.get(PAGE_RANGE_FIELD), "unparseable page range, keeping entry");
                outcome.counts.unexpected += 1;
                outcome.kept.push(entry);
            }
            PageRange::Pages(pages) if pages >= min_pages => outcome.kept.push(entry),
            PageRange::Pages(pages) => {
                debug!(pages, min_pages, "skipping short paper");
                outcome.counts.skipped += 1;
            }
        }
    }

    outcome
}
