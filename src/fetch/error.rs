//! Error types for the fetch module.
//!
//! Quota exhaustion on a single key is not an error here: it is handled by
//! rotation. Only a fully rotated pool escapes, as [`FetchError::Keys`].

use std::borrow::Cow;

use thiserror::Error;

use crate::keys::{KeyPoolError, ServiceClass};

/// Errors that can occur while fetching from the Scopus API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-200 response that is not a recoverable quota event.
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
        /// The request URL, percent-decoded.
        url: String,
    },

    /// Network-level error (DNS, connection refused, TLS, ...).
    #[error("network error fetching {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Request exceeded the client timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The 200 response body was not valid JSON.
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        /// The URL whose body failed to parse.
        url: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The URL or its query parameters could not be assembled.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending base URL.
        url: String,
    },

    /// HTTP client construction failed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Quota flipped on more attempts than there are keys.
    #[error("quota retries exhausted for service '{service}' after {attempts} attempts")]
    QuotaRetriesExhausted {
        /// The service being fetched.
        service: ServiceClass,
        /// Number of GETs issued.
        attempts: usize,
    },

    /// Every key for the service is exhausted.
    #[error(transparent)]
    Keys(#[from] KeyPoolError),
}

impl FetchError {
    /// Creates a status error; the URL is percent-decoded for readability.
    pub fn status(url: &str, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
            url: decode_url(url),
        }
    }

    /// Classifies a client error into a timeout or transport failure.
    pub fn transport(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: decode_url(url),
            }
        } else {
            Self::Transport {
                url: decode_url(url),
                source,
            }
        }
    }

    /// Creates a JSON decode error.
    pub fn decode(url: &str, source: serde_json::Error) -> Self {
        Self::Decode {
            url: decode_url(url),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Whether the error must stop the whole run rather than one query.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Keys(_))
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn decode_url(url: &str) -> String {
    urlencoding::decode(url).map_or_else(|_| url.to_string(), Cow::into_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_status_decodes_url() {
        let err = FetchError::status(
            "https://api.elsevier.com/content/search/scopus?query=ai%20AND%20DOCTYPE%28ar%29",
            400,
            "{\"error\":\"bad query\"}",
        );
        match &err {
            FetchError::Status { status, body, url } => {
                assert_eq!(*status, 400);
                assert!(body.contains("bad query"));
                assert_eq!(
                    url,
                    "https://api.elsevier.com/content/search/scopus?query=ai AND DOCTYPE(ar)"
                );
            }
            other => panic!("expected Status, got {other:?}"),
        }
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("HTTP 400"));
    }

    #[test]
    fn test_fetch_error_only_key_exhaustion_is_fatal() {
        let keys = FetchError::from(KeyPoolError::NoMoreKeys {
            service: ServiceClass::PaperSearch,
        });
        assert!(keys.is_fatal());
        assert!(keys.to_string().contains("paper_search"));

        assert!(!FetchError::status("http://x", 500, "").is_fatal());
        assert!(!FetchError::invalid_url("::").is_fatal());
        assert!(
            !FetchError::QuotaRetriesExhausted {
                service: ServiceClass::AuthorLookup,
                attempts: 3
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_fetch_error_decode_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = FetchError::decode("http://x/a%20b", source);
        assert!(err.to_string().starts_with("invalid JSON from http://x/a b"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
