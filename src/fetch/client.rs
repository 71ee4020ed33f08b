//! The key-rotating fetcher.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::constants::{
    API_KEY_HEADER, CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_ROTATION_PAUSE,
    RESOURCE_VERSION_HEADER,
};
use super::error::FetchError;
use super::quota::QuotaState;
use super::throttle::ServiceThrottle;
use crate::keys::{KeyPool, Rotation, ServiceClass};
use crate::user_agent;

/// Tunables for [`RateLimitedFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Sleep after this caller rotates a key.
    pub rotation_pause: Duration,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            rotation_pause: DEFAULT_ROTATION_PAUSE,
        }
    }
}

/// Issues Scopus GETs with the active key and rotates keys on quota exhaustion.
///
/// One client is shared by all services; the key header is attached per
/// request from the [`KeyPool`], so a rotation is visible to the very next
/// request of the same service.
#[derive(Debug, Clone)]
pub struct RateLimitedFetcher {
    client: Client,
    keys: Arc<KeyPool>,
    throttle: Arc<ServiceThrottle>,
    rotation_pause: Duration,
}

impl RateLimitedFetcher {
    /// Creates a fetcher over a shared key pool and throttle.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(
        keys: Arc<KeyPool>,
        throttle: Arc<ServiceThrottle>,
        settings: FetcherSettings,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(RESOURCE_VERSION_HEADER, HeaderValue::from_static("new"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(settings.request_timeout)
            .user_agent(user_agent::default_user_agent())
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            keys,
            throttle,
            rotation_pause: settings.rotation_pause,
        })
    }

    /// The key pool consulted on every request.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyPool> {
        &self.keys
    }

    /// Performs one logical GET and returns the parsed JSON body.
    ///
    /// Quota exhaustion (429 plus `x-ratelimit-remaining: 0` or
    /// `x-els-status: QUOTA_EXCEEDED`) rotates the key and retries, at most
    /// once per key in the pool plus the initial attempt.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Keys`] when every key is exhausted (fatal for a run)
    /// - [`FetchError::Status`] for any other non-200 response
    /// - [`FetchError::Transport`] / [`FetchError::Timeout`] for network failures
    /// - [`FetchError::Decode`] when a 200 body is not JSON
    #[instrument(skip(self, params), fields(service = %service))]
    pub async fn fetch(
        &self,
        service: ServiceClass,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, FetchError> {
        let request_url = Url::parse_with_params(url, params)
            .map_err(|_| FetchError::invalid_url(url))?;
        let max_attempts = self.keys.len(service) + 1;

        for attempt in 1..=max_attempts {
            let key = self.keys.current_key(service);
            self.throttle.acquire(service).await;

            debug!(attempt, key = %key, url = %request_url, "sending request");
            let response = self
                .client
                .get(request_url.clone())
                .header(API_KEY_HEADER, key.value())
                .send()
                .await
                .map_err(|e| FetchError::transport(request_url.as_str(), e))?;

            let quota = QuotaState::from_headers(response.headers());
            debug!(remaining = quota.remaining, limit = quota.limit, "quota");

            let status = response.status();
            if status == StatusCode::OK {
                self.keys.mark_success(service);
                let body = response
                    .text()
                    .await
                    .map_err(|e| FetchError::transport(request_url.as_str(), e))?;
                return serde_json::from_str(&body)
                    .map_err(|e| FetchError::decode(request_url.as_str(), e));
            }

            if status == StatusCode::TOO_MANY_REQUESTS && quota.is_exhausted() {
                warn!(
                    remaining = quota.remaining,
                    limit = quota.limit,
                    reset = %quota.reset_display(),
                    key = %key,
                    "Quota exhausted"
                );
                if let Some(reset_at) = quota.reset_at {
                    self.keys.record_reset(&key, reset_at);
                }

                match self.keys.rotate_from(&key) {
                    Ok(Rotation::Rotated(next)) => {
                        info!(key = %next, "Retrying with rotated key");
                        if !self.rotation_pause.is_zero() {
                            tokio::time::sleep(self.rotation_pause).await;
                        }
                    }
                    Ok(Rotation::AlreadyRotated(next)) => {
                        debug!(key = %next, "Retrying with key rotated elsewhere");
                    }
                    Err(e) => {
                        error!(error = %e, "API keys exhausted");
                        return Err(e.into());
                    }
                }
                continue;
            }

            let final_url = response.url().to_string();
            let body = body_or_empty(response.text().await);
            debug!(status = status.as_u16(), "unexpected response status");
            return Err(FetchError::status(&final_url, status.as_u16(), body));
        }

        Err(FetchError::QuotaRetriesExhausted {
            service,
            attempts: max_attempts,
        })
    }
}

/// Error bodies are diagnostics only; a failed read leaves them empty.
fn body_or_empty<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| {
        debug!(error = %e, "failed to read error response body");
        String::new()
    })
}
