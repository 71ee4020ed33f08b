//! JSON run configuration and API key files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use scopus_core::crawl::{CrawlOptions, DEFAULT_PAGE_SIZE, DedupStrategy};
use scopus_core::fetch::{
    DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_ROTATION_PAUSE, FetcherSettings,
    ScopusEndpoints,
};
use serde::Deserialize;
use url::Url;

/// Scopus document type codes are two lower-case letters (`ar`, `cp`, `re`, ...).
/// An empty code searches the keyword without a `DOCTYPE` clause.
#[allow(clippy::expect_used)]
static DOC_TYPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z]{2})?$").expect("doc type regex is valid") // Static pattern, safe to panic
});

const DEFAULT_DATABASE: &str = "papers.db";

/// File configuration for a crawl; CLI flags override individual values.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlConfig {
    /// API keys; replaced by `--keys-file` when given.
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Search keywords, crawled in order.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Document type codes, crawled in order for each keyword.
    #[serde(default)]
    pub doc_types: Vec<String>,
    /// Inclusive `[from, to]` publication years.
    #[serde(default)]
    pub year_range: Option<(i32, i32)>,
    /// Maximum records per (keyword, doc type) pair.
    #[serde(default)]
    pub per_query_limit: Option<u64>,
    /// Minimum page count for kept papers.
    #[serde(default)]
    pub min_pages: Option<i64>,
    /// Entries per search page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// `SQLite` database path.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pause after a key rotation, in milliseconds.
    #[serde(default = "default_rotation_pause_ms")]
    pub rotation_pause_ms: u64,
    /// Duplicate detection strategy.
    #[serde(default)]
    pub dedup: DedupStrategy,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE)
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_rotation_pause_ms() -> u64 {
    u64::try_from(DEFAULT_ROTATION_PAUSE.as_millis()).unwrap_or(u64::MAX)
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            keywords: Vec::new(),
            doc_types: Vec::new(),
            year_range: None,
            per_query_limit: None,
            min_pages: None,
            page_size: default_page_size(),
            database: default_database(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            rotation_pause_ms: default_rotation_pause_ms(),
            dedup: DedupStrategy::default(),
        }
    }
}

impl CrawlConfig {
    /// Validates values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if !(1..=200).contains(&self.page_size) {
            bail!(
                "Invalid config value for `page_size`: {}. Expected range: 1..=200",
                self.page_size
            );
        }
        if !(1..=3600).contains(&self.request_timeout_secs) {
            bail!(
                "Invalid config value for `request_timeout_secs`: {}. Expected range: 1..=3600",
                self.request_timeout_secs
            );
        }
        if self.rotation_pause_ms > 60_000 {
            bail!(
                "Invalid config value for `rotation_pause_ms`: {}. Expected range: 0..=60000",
                self.rotation_pause_ms
            );
        }
        if let Some(limit) = self.per_query_limit
            && limit == 0
        {
            bail!("Invalid config value for `per_query_limit`: 0. Expected at least 1");
        }
        if let Some((from, to)) = self.year_range
            && from > to
        {
            bail!("Invalid config value for `year_range`: [{from}, {to}]. `from` must not exceed `to`");
        }
        if let Some(empty) = self.keywords.iter().position(|k| k.trim().is_empty()) {
            bail!("Invalid config value for `keywords`: entry {empty} is blank");
        }
        for doc_type in &self.doc_types {
            validate_doc_type(doc_type)?;
        }
        Url::parse(&self.base_url)
            .with_context(|| format!("Invalid config value for `base_url`: {}", self.base_url))?;
        Ok(())
    }

    /// API keys, failing when none are configured.
    pub fn require_api_keys(&self) -> Result<Vec<String>> {
        if self.api_keys.is_empty() {
            bail!("No API keys configured. Set `api_keys` in the config file or pass --keys-file");
        }
        Ok(self.api_keys.clone())
    }

    /// Fails when a crawl has nothing to search for.
    pub fn require_crawl_terms(&self) -> Result<()> {
        if self.keywords.is_empty() {
            bail!("No keywords configured. Set `keywords` in the config file or pass --keyword");
        }
        if self.doc_types.is_empty() {
            bail!("No document types configured. Set `doc_types` in the config file or pass --doc-type");
        }
        Ok(())
    }

    /// HTTP settings for the fetcher.
    #[must_use]
    pub fn fetcher_settings(&self) -> FetcherSettings {
        FetcherSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            rotation_pause: Duration::from_millis(self.rotation_pause_ms),
        }
    }

    /// Upstream endpoints.
    #[must_use]
    pub fn endpoints(&self) -> ScopusEndpoints {
        ScopusEndpoints::new(self.base_url.as_str())
    }

    /// Crawl options derived from this config.
    #[must_use]
    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            endpoints: self.endpoints(),
            page_size: self.page_size,
            per_query_limit: self.per_query_limit,
            min_pages: self.min_pages,
            year_range: self.year_range,
            dedup: self.dedup,
        }
    }
}

fn validate_doc_type(doc_type: &str) -> Result<()> {
    if !DOC_TYPE_PATTERN.is_match(doc_type) {
        bail!(
            "Invalid document type `{doc_type}`. Expected a two-letter Scopus code such as `ar` or `cp`, or an empty string for any type"
        );
    }
    Ok(())
}

/// Key file layout: `{"API_Keys": ["..."]}`.
#[derive(Debug, Deserialize)]
struct KeysFile {
    #[serde(rename = "API_Keys", alias = "api_keys")]
    api_keys: Vec<String>,
}

/// Loads and validates a JSON config file.
pub fn load_config(path: &Path) -> Result<CrawlConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: CrawlConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

/// Loads API keys from a key file, ignoring blank entries.
pub fn load_keys_file(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read keys file {}", path.display()))?;
    let file: KeysFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse keys file {}", path.display()))?;
    let keys: Vec<String> = file
        .api_keys
        .into_iter()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect();
    if keys.is_empty() {
        bail!("Keys file {} contains no API keys", path.display());
    }
    Ok(keys)
}
