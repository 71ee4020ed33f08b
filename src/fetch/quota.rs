//! Quota state parsed from Scopus rate-limit response headers.

use std::time::{Duration, UNIX_EPOCH};

use reqwest::header::HeaderMap;

use super::constants::UNKNOWN_QUOTA;

/// Value of `x-els-status` when the key's weekly quota is used up.
pub const QUOTA_EXCEEDED_STATUS: &str = "QUOTA_EXCEEDED";

const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const LIMIT_HEADER: &str = "x-ratelimit-limit";
const RESET_HEADER: &str = "x-ratelimit-reset";
const STATUS_HEADER: &str = "x-els-status";

/// Quota information reported alongside a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaState {
    /// Calls left for the current key, `-1` when unknown.
    pub remaining: i64,
    /// Total calls allowed for the current key, `-1` when unknown.
    pub limit: i64,
    /// When the quota resets (Unix seconds), if reported.
    pub reset_at: Option<i64>,
    /// Vendor status flag, e.g. `QUOTA_EXCEEDED`.
    pub els_status: Option<String>,
}

impl QuotaState {
    /// Reads the quota headers, defaulting missing or garbage counts to `-1`.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: header_i64(headers, REMAINING_HEADER).unwrap_or(UNKNOWN_QUOTA),
            limit: header_i64(headers, LIMIT_HEADER).unwrap_or(UNKNOWN_QUOTA),
            reset_at: header_i64(headers, RESET_HEADER),
            els_status: headers
                .get(STATUS_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string()),
        }
    }

    /// Whether the response signals an exhausted quota.
    ///
    /// A remaining count of exactly zero counts even without the status flag.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0 || self.els_status.as_deref() == Some(QUOTA_EXCEEDED_STATUS)
    }

    /// Human-readable reset time for logs.
    #[must_use]
    pub fn reset_display(&self) -> String {
        self.reset_at
            .map_or_else(|| "unknown".to_string(), format_reset)
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Formats a Unix timestamp as an HTTP date, or `unknown` when negative.
#[must_use]
pub fn format_reset(epoch_secs: i64) -> String {
    u64::try_from(epoch_secs).map_or_else(
        |_| "unknown".to_string(),
        |secs| httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_secs(secs)),
    )
}
