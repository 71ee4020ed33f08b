//! Scopus endpoint URLs.

/// Production Scopus API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.elsevier.com";

/// Builds endpoint URLs against a base URL (overridable for wiremock).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopusEndpoints {
    base_url: String,
}

impl Default for ScopusEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ScopusEndpoints {
    /// Creates endpoints rooted at `base_url` (trailing slashes are ignored).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Paper search endpoint.
    #[must_use]
    pub fn search(&self) -> String {
        format!("{}/content/search/scopus", self.base_url)
    }

    /// Abstract retrieval endpoint for one Scopus id.
    #[must_use]
    pub fn abstract_by_id(&self, scopus_id: &str) -> String {
        format!(
            "{}/content/abstract/scopus_id/{}",
            self.base_url,
            urlencoding::encode(scopus_id)
        )
    }

    /// Author retrieval endpoint for one Scopus author id.
    #[must_use]
    pub fn author_by_id(&self, author_id: &str) -> String {
        format!(
            "{}/content/author/author_id/{}",
            self.base_url,
            urlencoding::encode(author_id)
        )
    }
}
