//! Boolean query strings for the search endpoint.

use std::fmt;

use serde::Serialize;

/// One (keyword, document type) pair of a crawl, plus an optional year window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SearchQuery {
    /// Free-text keyword, passed through verbatim.
    pub keyword: String,
    /// Two-letter Scopus document type code; empty means no filter.
    pub doc_type: String,
    /// Inclusive publication year window.
    pub year_range: Option<(i32, i32)>,
}

impl SearchQuery {
    /// Creates a query without a year window.
    #[must_use]
    pub fn new(keyword: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            doc_type: doc_type.into(),
            year_range: None,
        }
    }

    /// Restricts the query to publications in `from..=to`.
    #[must_use]
    pub fn with_year_range(mut self, from: i32, to: i32) -> Self {
        self.year_range = Some((from, to));
        self
    }

    /// Renders the `query` parameter, e.g. `ai AND DOCTYPE(ar)`.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut query = if self.doc_type.is_empty() {
            self.keyword.clone()
        } else {
            format!("{} AND DOCTYPE({})", self.keyword, self.doc_type)
        };
        if let Some((from, to)) = self.year_range {
            // Scopus only offers strict AFT/BEF comparisons.
            query.push_str(&format!(
                " AND (PUBYEAR AFT {} AND PUBYEAR BEF {})",
                from.saturating_sub(1),
                to.saturating_add(1)
            ));
        }
        query
    }

    /// Builds every (keyword, doc type) pair, keywords outermost, in input order.
    #[must_use]
    pub fn cross_product(
        keywords: &[String],
        doc_types: &[String],
        year_range: Option<(i32, i32)>,
    ) -> Vec<Self> {
        keywords
            .iter()
            .flat_map(|keyword| {
                doc_types.iter().map(move |doc_type| Self {
                    keyword: keyword.clone(),
                    doc_type: doc_type.clone(),
                    year_range,
                })
            })
            .collect()
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}
