//! API key pool with per-service rotation.
//!
//! Scopus meters each API surface separately, so the [`KeyPool`] keeps an
//! independent active index, quota episode and reset time for every
//! [`ServiceClass`]. The same credential list backs all three services.
//!
//! # Rotation
//!
//! A *quota episode* starts with the first exhaustion event for a service and
//! ends with the next successful response ([`KeyPool::mark_success`]). Inside
//! one episode a pool of `N` keys allows `N` rotations, which walk the whole
//! cycle and land back on the key the episode started with. Rotation `N + 1`
//! fails with [`KeyPoolError::NoMoreKeys`].
//!
//! # Example
//!
//! ```
//! use scopus_core::keys::{KeyPool, ServiceClass};
//!
//! let pool = KeyPool::new(vec!["key-a".to_string(), "key-b".to_string()]).unwrap();
//! assert_eq!(pool.current_key(ServiceClass::PaperSearch).value(), "key-a");
//!
//! let next = pool.rotate(ServiceClass::PaperSearch).unwrap();
//! assert_eq!(next.value(), "key-b");
//!
//! // Other services keep their own index.
//! assert_eq!(pool.current_key(ServiceClass::AuthorLookup).value(), "key-a");
//! ```

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, info, instrument};

/// One of the independently rate-limited Scopus API surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceClass {
    /// `/content/search/scopus`
    PaperSearch,
    /// `/content/author/author_id/{id}`
    AuthorLookup,
    /// `/content/abstract/scopus_id/{id}`
    AbstractLookup,
}

impl ServiceClass {
    /// All service classes in a stable order.
    pub const ALL: [Self; 3] = [Self::PaperSearch, Self::AuthorLookup, Self::AbstractLookup];

    /// Returns the stable label used in logs and persisted rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PaperSearch => "paper_search",
            Self::AuthorLookup => "author",
            Self::AbstractLookup => "abstract",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::PaperSearch => 0,
            Self::AuthorLookup => 1,
            Self::AbstractLookup => 2,
        }
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the key pool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyPoolError {
    /// The pool was built from an empty credential list.
    #[error("no API keys configured")]
    Empty,

    /// Every key for the service was tried since the last successful response.
    #[error("all API keys exhausted for service '{service}'")]
    NoMoreKeys {
        /// The service whose keys ran out.
        service: ServiceClass,
    },
}

/// A single API credential as seen by one service.
///
/// `Debug` and `Display` mask the credential down to its last four characters.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    value: String,
    service: ServiceClass,
    exhausted: bool,
    reset_at: Option<i64>,
}

impl ApiKey {
    fn new(value: String, service: ServiceClass) -> Self {
        Self {
            value,
            service,
            exhausted: false,
            reset_at: None,
        }
    }

    /// The raw credential, for the request header only.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The service this key instance belongs to.
    #[must_use]
    pub fn service(&self) -> ServiceClass {
        self.service
    }

    /// Whether the key was rotated away from during the current quota episode.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Quota reset time reported for this key (Unix seconds), if any.
    #[must_use]
    pub fn reset_at(&self) -> Option<i64> {
        self.reset_at
    }

    /// Masked form of the credential, safe for logs.
    #[must_use]
    pub fn masked(&self) -> String {
        mask_credential(&self.value)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &self.masked())
            .field("service", &self.service)
            .field("exhausted", &self.exhausted)
            .field("reset_at", &self.reset_at)
            .finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

fn mask_credential(value: &str) -> String {
    let len = value.chars().count();
    if len <= 4 {
        return "****".to_string();
    }
    let tail: String = value.chars().skip(len - 4).collect();
    format!("****{tail}")
}

/// Result of a compare-and-swap rotation ([`KeyPool::rotate_from`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rotation {
    /// This caller advanced the index; holds the new active key.
    Rotated(ApiKey),
    /// Another caller already moved past the stale key; holds the active key.
    AlreadyRotated(ApiKey),
}

impl Rotation {
    /// The key to use for the next request.
    #[must_use]
    pub fn key(&self) -> &ApiKey {
        match self {
            Self::Rotated(key) | Self::AlreadyRotated(key) => key,
        }
    }

    /// Whether this caller performed the rotation.
    #[must_use]
    pub fn performed(&self) -> bool {
        matches!(self, Self::Rotated(_))
    }
}

#[derive(Debug)]
struct ServiceKeys {
    service: ServiceClass,
    keys: Vec<ApiKey>,
    active: usize,
    rotations_in_episode: usize,
    earliest_reset: Option<i64>,
    last_rotation: Option<SystemTime>,
}

impl ServiceKeys {
    fn new(service: ServiceClass, values: &[String]) -> Self {
        Self {
            service,
            keys: values
                .iter()
                .map(|value| ApiKey::new(value.clone(), service))
                .collect(),
            active: 0,
            rotations_in_episode: 0,
            earliest_reset: None,
            last_rotation: None,
        }
    }

    fn current(&self) -> ApiKey {
        self.keys[self.active].clone()
    }

    fn advance(&mut self) -> Result<ApiKey, KeyPoolError> {
        if self.rotations_in_episode >= self.keys.len() {
            return Err(KeyPoolError::NoMoreKeys {
                service: self.service,
            });
        }

        self.keys[self.active].exhausted = true;
        self.active = (self.active + 1) % self.keys.len();
        self.rotations_in_episode += 1;
        self.last_rotation = Some(SystemTime::now());

        let key = self.current();
        info!(
            service = %self.service,
            index = self.active,
            key = %key,
            rotations = self.rotations_in_episode,
            "Using new API key"
        );
        Ok(key)
    }
}

/// Ordered API credentials with an active index per service.
///
/// Each service's state sits behind its own mutex, which is never held across
/// an `.await`, so the pool is safe to share through `Arc` between tasks.
#[derive(Debug)]
pub struct KeyPool {
    services: [Mutex<ServiceKeys>; 3],
}

impl KeyPool {
    /// Builds a pool where every service starts on the first key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyPoolError::Empty`] if `keys` is empty.
    pub fn new(keys: Vec<String>) -> Result<Self, KeyPoolError> {
        if keys.is_empty() {
            return Err(KeyPoolError::Empty);
        }
        Ok(Self {
            services: ServiceClass::ALL.map(|service| Mutex::new(ServiceKeys::new(service, &keys))),
        })
    }

    fn state(&self, service: ServiceClass) -> MutexGuard<'_, ServiceKeys> {
        self.services[service.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of keys available to `service`.
    #[must_use]
    pub fn len(&self, service: ServiceClass) -> usize {
        self.state(service).keys.len()
    }

    /// Returns the active key for `service`.
    #[must_use]
    pub fn current_key(&self, service: ServiceClass) -> ApiKey {
        self.state(service).current()
    }

    /// Advances `service` to the next key, wrapping around.
    ///
    /// # Errors
    ///
    /// Returns [`KeyPoolError::NoMoreKeys`] once every key has been rotated
    /// through since the last successful response.
    #[instrument(skip(self))]
    pub fn rotate(&self, service: ServiceClass) -> Result<ApiKey, KeyPoolError> {
        self.state(service).advance()
    }

    /// Rotates away from `stale` only if it is still the active key.
    ///
    /// Concurrent callers that saw the same exhausted key therefore cause a
    /// single rotation; the others get the already-rotated key back.
    ///
    /// # Errors
    ///
    /// Returns [`KeyPoolError::NoMoreKeys`] when the rotation would exceed the
    /// key cycle for the current quota episode.
    #[instrument(skip_all, fields(service = %stale.service(), stale = %stale))]
    pub fn rotate_from(&self, stale: &ApiKey) -> Result<Rotation, KeyPoolError> {
        let mut state = self.state(stale.service());
        if state.keys[state.active].value != stale.value {
            let current = state.current();
            debug!(current = %current, "Key already rotated by another caller");
            return Ok(Rotation::AlreadyRotated(current));
        }
        state.advance().map(Rotation::Rotated)
    }

    /// Ends the quota episode for `service` after a successful response.
    pub fn mark_success(&self, service: ServiceClass) {
        let mut state = self.state(service);
        if state.rotations_in_episode > 0 {
            debug!(
                service = %service,
                rotations = state.rotations_in_episode,
                "Quota episode ended"
            );
        }
        state.rotations_in_episode = 0;
        for key in &mut state.keys {
            key.exhausted = false;
        }
    }

    /// Records the reset time reported for `key`, keeping the service minimum.
    pub fn record_reset(&self, key: &ApiKey, reset_at: i64) {
        let mut state = self.state(key.service());
        if let Some(entry) = state.keys.iter_mut().find(|k| k.value == key.value) {
            entry.reset_at = Some(reset_at);
        }
        state.earliest_reset = Some(
            state
                .earliest_reset
                .map_or(reset_at, |current| current.min(reset_at)),
        );
    }

    /// Earliest known quota reset for `service` (Unix seconds).
    #[must_use]
    pub fn earliest_reset(&self, service: ServiceClass) -> Option<i64> {
        self.state(service).earliest_reset
    }

    /// Time of the last rotation for `service`, for diagnostics.
    #[must_use]
    pub fn last_rotation(&self, service: ServiceClass) -> Option<SystemTime> {
        self.state(service).last_rotation
    }

    /// Earliest known reset for every service, in [`ServiceClass::ALL`] order.
    #[must_use]
    pub fn reset_summary(&self) -> Vec<(ServiceClass, Option<i64>)> {
        ServiceClass::ALL
            .iter()
            .map(|&service| (service, self.earliest_reset(service)))
            .collect()
    }
}
