//! Per-service request throttling.
//!
//! Scopus enforces a per-second request ceiling in addition to the weekly
//! quota. Paper search and abstract retrieval share one 8 req/s budget; author
//! retrieval has its own 2 req/s budget. The [`ServiceThrottle`] spaces
//! requests within a budget by a minimum interval, and the two budgets never
//! wait for each other.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use scopus_core::fetch::ServiceThrottle;
//! use scopus_core::keys::ServiceClass;
//!
//! # async fn example() {
//! let throttle = ServiceThrottle::new()
//!     .with_interval(ServiceClass::AuthorLookup, Duration::from_millis(500));
//!
//! // First request proceeds immediately, the second waits ~500ms.
//! throttle.acquire(ServiceClass::AuthorLookup).await;
//! throttle.acquire(ServiceClass::AuthorLookup).await;
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::keys::ServiceClass;

/// 8 requests per second for paper search and abstract retrieval.
const PAPER_INTERVAL: Duration = Duration::from_millis(125);

/// 2 requests per second for author retrieval.
const AUTHOR_INTERVAL: Duration = Duration::from_millis(500);

/// Request budget a service draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Budget {
    Paper,
    Author,
}

impl Budget {
    fn of(service: ServiceClass) -> Self {
        match service {
            ServiceClass::PaperSearch | ServiceClass::AbstractLookup => Self::Paper,
            ServiceClass::AuthorLookup => Self::Author,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Paper => 0,
            Self::Author => 1,
        }
    }
}

/// Minimum spacing between requests, per budget.
///
/// Designed to be wrapped in `Arc` and shared between tasks. The `DashMap`
/// entry is cloned out before awaiting, so no shard lock is held across the
/// sleep.
#[derive(Debug)]
pub struct ServiceThrottle {
    intervals: [Duration; 2],
    disabled: bool,
    last_request: DashMap<Budget, Arc<Mutex<Option<Instant>>>>,
}

impl Default for ServiceThrottle {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceThrottle {
    /// Creates a throttle with the documented Scopus per-second limits.
    #[must_use]
    pub fn new() -> Self {
        let mut intervals = [PAPER_INTERVAL; 2];
        intervals[Budget::Author.index()] = AUTHOR_INTERVAL;
        Self {
            intervals,
            disabled: false,
            last_request: DashMap::new(),
        }
    }

    /// Creates a throttle that never delays (tests, mocked upstreams).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            intervals: [Duration::ZERO; 2],
            disabled: true,
            last_request: DashMap::new(),
        }
    }

    /// Overrides the interval for the budget `service` draws from.
    ///
    /// Paper search and abstract retrieval share a budget, so setting either
    /// sets both.
    #[must_use]
    pub fn with_interval(mut self, service: ServiceClass, interval: Duration) -> Self {
        self.intervals[Budget::of(service).index()] = interval;
        self
    }

    /// Returns whether throttling is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Minimum spacing applied to `service`.
    #[must_use]
    pub fn interval(&self, service: ServiceClass) -> Duration {
        self.intervals[Budget::of(service).index()]
    }

    /// Waits until a request to `service` is allowed, then claims the slot.
    #[instrument(skip(self))]
    pub async fn acquire(&self, service: ServiceClass) {
        let interval = self.interval(service);
        if self.disabled || interval.is_zero() {
            return;
        }

        let state = Arc::clone(
            self.last_request
                .entry(Budget::of(service))
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .value(),
        );

        let mut last_request = state.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                let delay = interval.saturating_sub(elapsed);
                debug!(service = %service, delay_ms = delay.as_millis(), "throttling request");
                tokio::time::sleep(delay).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant as StdInstant;

    use super::*;

    #[test]
    fn test_throttle_default_intervals() {
        let throttle = ServiceThrottle::new();
        assert_eq!(throttle.interval(ServiceClass::PaperSearch), PAPER_INTERVAL);
        assert_eq!(throttle.interval(ServiceClass::AbstractLookup), PAPER_INTERVAL);
        assert_eq!(throttle.interval(ServiceClass::AuthorLookup), AUTHOR_INTERVAL);
        assert!(!throttle.is_disabled());
    }

    #[tokio::test]
    async fn test_throttle_disabled_never_waits() {
        let throttle = ServiceThrottle::disabled();
        let start = StdInstant::now();
        for _ in 0..10 {
            throttle.acquire(ServiceClass::AuthorLookup).await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_throttle_first_request_is_immediate() {
        let throttle =
            ServiceThrottle::new().with_interval(ServiceClass::PaperSearch, Duration::from_secs(5));
        let start = StdInstant::now();
        throttle.acquire(ServiceClass::PaperSearch).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_throttle_spaces_same_service() {
        let throttle = ServiceThrottle::new()
            .with_interval(ServiceClass::PaperSearch, Duration::from_millis(80));
        let start = StdInstant::now();
        throttle.acquire(ServiceClass::PaperSearch).await;
        throttle.acquire(ServiceClass::PaperSearch).await;
        assert!(
            start.elapsed() >= Duration::from_millis(75),
            "second request should wait, elapsed {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_throttle_abstract_lookup_shares_paper_budget() {
        let throttle = ServiceThrottle::new()
            .with_interval(ServiceClass::PaperSearch, Duration::from_millis(80));
        assert_eq!(
            throttle.interval(ServiceClass::AbstractLookup),
            Duration::from_millis(80)
        );

        let start = StdInstant::now();
        throttle.acquire(ServiceClass::PaperSearch).await;
        throttle.acquire(ServiceClass::AbstractLookup).await;
        assert!(
            start.elapsed() >= Duration::from_millis(75),
            "abstract lookup should wait for the paper search slot, elapsed {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_throttle_services_are_independent() {
        let throttle = ServiceThrottle::new()
            .with_interval(ServiceClass::PaperSearch, Duration::from_secs(5))
            .with_interval(ServiceClass::AuthorLookup, Duration::from_secs(5));
        let start = StdInstant::now();
        throttle.acquire(ServiceClass::PaperSearch).await;
        throttle.acquire(ServiceClass::AuthorLookup).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
