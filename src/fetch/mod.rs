//! Rate-limited, key-rotating access to the Scopus REST API.
//!
//! This module provides the [`RateLimitedFetcher`], which issues one GET per
//! call with the service's current API key attached and recovers locally from
//! quota exhaustion by rotating keys through the shared
//! [`KeyPool`](crate::keys::KeyPool).
//!
//! # Response handling
//!
//! - `200` → JSON body is returned.
//! - `429` with a quota indicator (`x-ratelimit-remaining: 0` or
//!   `x-els-status: QUOTA_EXCEEDED`) → reset time recorded, key rotated,
//!   request retried (bounded by the pool size).
//! - Any other status → [`FetchError::Status`] with code, body and decoded URL.
//! - Transport failures are surfaced, never retried here.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use scopus_core::fetch::{FetcherSettings, RateLimitedFetcher, ScopusEndpoints, ServiceThrottle};
//! use scopus_core::keys::{KeyPool, ServiceClass};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keys = Arc::new(KeyPool::new(vec!["my-key".to_string()])?);
//! let fetcher = RateLimitedFetcher::new(
//!     keys,
//!     Arc::new(ServiceThrottle::new()),
//!     FetcherSettings::default(),
//! )?;
//! let endpoints = ScopusEndpoints::default();
//! let page = fetcher
//!     .fetch(
//!         ServiceClass::PaperSearch,
//!         &endpoints.search(),
//!         &[("query", "ai AND DOCTYPE(ar)"), ("cursor", "*")],
//!     )
//!     .await?;
//! println!("{page}");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod endpoints;
mod error;
mod quota;
pub mod throttle;

pub use client::{FetcherSettings, RateLimitedFetcher};
pub use constants::{
    API_KEY_HEADER, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_ROTATION_PAUSE, RESOURCE_VERSION_HEADER,
};
pub use endpoints::{DEFAULT_BASE_URL, ScopusEndpoints};
pub use error::FetchError;
pub use quota::{QUOTA_EXCEEDED_STATUS, QuotaState, format_reset};
pub use throttle::ServiceThrottle;
