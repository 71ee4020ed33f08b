//! Decoding of one search response page.

use serde_json::Value;
use thiserror::Error;

const RESULTS_KEY: &str = "search-results";
const TOTAL_KEY: &str = "opensearch:totalResults";

/// Errors for a search response that does not have the expected envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The body has no `search-results` object.
    #[error("response has no 'search-results' object")]
    MissingEnvelope,

    /// `opensearch:totalResults` is absent or not a non-negative integer.
    #[error("invalid total results value: {value}")]
    InvalidTotal {
        /// The raw value, rendered as JSON.
        value: String,
    },

    /// `entry` is present but not an array.
    #[error("'entry' is not an array")]
    InvalidEntries,
}

/// The parts of a search response the crawler consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    /// Declared number of results for the whole query.
    pub total_results: u64,
    /// Raw result entries, placeholders removed.
    pub entries: Vec<Value>,
    /// Cursor for the following page, if any.
    pub next_cursor: Option<String>,
}

impl SearchPage {
    /// Extracts total, entries and next cursor from a search response body.
    ///
    /// Scopus reports the total as a string and pads empty result sets with a
    /// single `{"error": "Result set was empty"}` entry; both are handled here.
    ///
    /// # Errors
    ///
    /// Returns [`PageError`] when the envelope or total is missing or malformed.
    pub fn from_json(body: &Value) -> Result<Self, PageError> {
        let results = body
            .get(RESULTS_KEY)
            .filter(|v| v.is_object())
            .ok_or(PageError::MissingEnvelope)?;

        let total_results = parse_total(results.get(TOTAL_KEY))?;

        let entries = match results.get("entry") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .filter(|entry| !is_placeholder(entry))
                .cloned()
                .collect(),
            Some(_) => return Err(PageError::InvalidEntries),
        };

        let next_cursor = results
            .pointer("/cursor/@next")
            .and_then(Value::as_str)
            .filter(|cursor| !cursor.is_empty())
            .map(str::to_string);

        Ok(Self {
            total_results,
            entries,
            next_cursor,
        })
    }
}

fn parse_total(value: Option<&Value>) -> Result<u64, PageError> {
    let parsed = match value {
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    };
    parsed.ok_or_else(|| PageError::InvalidTotal {
        value: value.map_or_else(|| "null".to_string(), Value::to_string),
    })
}

fn is_placeholder(entry: &Value) -> bool {
    entry.get("error").is_some()
        && entry.get("dc:title").is_none()
        && entry.get("dc:identifier").is_none()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_page_reads_total_entries_and_cursor() {
        let body = json!({
            "search-results": {
                "opensearch:totalResults": "42",
                "cursor": {"@current": "*", "@next": "AoJ3"},
                "entry": [{"dc:title": "A"}, {"dc:title": "B"}]
            }
        });
        let page = SearchPage::from_json(&body).unwrap();
        assert_eq!(page.total_results, 42);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("AoJ3"));
    }

    #[test]
    fn test_page_drops_empty_result_placeholder() {
        let body = json!({
            "search-results": {
                "opensearch:totalResults": "0",
                "entry": [{"@_fa": "true", "error": "Result set was empty"}]
            }
        });
        let page = SearchPage::from_json(&body).unwrap();
        assert_eq!(page.total_results, 0);
        assert!(page.entries.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_page_missing_envelope_is_error() {
        assert_eq!(
            SearchPage::from_json(&json!({"service-error": {}})),
            Err(PageError::MissingEnvelope)
        );
    }

    #[test]
    fn test_page_invalid_total_is_error() {
        let body = json!({"search-results": {"opensearch:totalResults": "many"}});
        assert!(matches!(
            SearchPage::from_json(&body),
            Err(PageError::InvalidTotal { .. })
        ));
    }

    #[test]
    fn test_page_numeric_total_and_missing_entries() {
        let body = json!({"search-results": {"opensearch:totalResults": 7}});
        let page = SearchPage::from_json(&body).unwrap();
        assert_eq!(page.total_results, 7);
        assert!(page.entries.is_empty());
    }
}
