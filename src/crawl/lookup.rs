//! Abstract and author retrieval by id.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::fetch::{FetchError, RateLimitedFetcher, ScopusEndpoints};
use crate::keys::{KeyPoolError, ServiceClass};

const ABSTRACT_ROOT: &str = "/abstracts-retrieval-response";
const AUTHOR_ROOT: &str = "/author-retrieval-response/0";

/// Errors from a single lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Every key for the lookup service is exhausted.
    #[error(transparent)]
    NoMoreKeys(KeyPoolError),

    /// The request failed.
    #[error(transparent)]
    Fetch(FetchError),

    /// The response did not contain the expected object.
    #[error("unexpected response format for {id}: missing {expected}")]
    UnexpectedFormat {
        /// The requested id.
        id: String,
        /// JSON pointer that was not found.
        expected: &'static str,
    },
}

impl From<FetchError> for LookupError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Keys(keys) => Self::NoMoreKeys(keys),
            other => Self::Fetch(other),
        }
    }
}

/// Ids dropped from a batch lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LookupCounter {
    /// Requests that failed.
    pub skipped: u64,
    /// Responses without the expected object.
    pub unexpected_format: u64,
}

/// Retrieves single abstracts and author profiles.
#[derive(Debug, Clone)]
pub struct LookupClient {
    fetcher: Arc<RateLimitedFetcher>,
    endpoints: ScopusEndpoints,
}

impl LookupClient {
    /// Creates a lookup client.
    #[must_use]
    pub fn new(fetcher: Arc<RateLimitedFetcher>, endpoints: ScopusEndpoints) -> Self {
        Self { fetcher, endpoints }
    }

    /// Full abstract record for a Scopus id.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on fetch failure or unexpected response shape.
    #[instrument(skip(self))]
    pub async fn abstract_data(&self, scopus_id: &str) -> Result<Value, LookupError> {
        let body = self
            .fetcher
            .fetch(
                ServiceClass::AbstractLookup,
                &self.endpoints.abstract_by_id(scopus_id),
                &[("view", "FULL")],
            )
            .await?;
        extract(body, scopus_id, ABSTRACT_ROOT)
    }

    /// Enhanced author profile for a Scopus author id.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on fetch failure or unexpected response shape.
    #[instrument(skip(self))]
    pub async fn author_data(&self, author_id: &str) -> Result<Value, LookupError> {
        let body = self
            .fetcher
            .fetch(
                ServiceClass::AuthorLookup,
                &self.endpoints.author_by_id(author_id),
                &[("view", "ENHANCED")],
            )
            .await?;
        extract(body, author_id, AUTHOR_ROOT)
    }

    /// Looks up many abstracts; failed ids are skipped and counted.
    ///
    /// # Errors
    ///
    /// Only [`LookupError::NoMoreKeys`] escapes.
    pub async fn abstracts(
        &self,
        ids: &[String],
    ) -> Result<(BTreeMap<String, Value>, LookupCounter), LookupError> {
        let mut found = BTreeMap::new();
        let mut counter = LookupCounter::default();
        for id in ids {
            let result = self.abstract_data(id).await;
            collect(id, result, &mut found, &mut counter)?;
        }
        info!(
            found = found.len(),
            skipped = counter.skipped,
            unexpected = counter.unexpected_format,
            "abstract lookup finished"
        );
        Ok((found, counter))
    }

    /// Looks up many authors; failed ids are skipped and counted.
    ///
    /// # Errors
    ///
    /// Only [`LookupError::NoMoreKeys`] escapes.
    pub async fn authors(
        &self,
        ids: &[String],
    ) -> Result<(BTreeMap<String, Value>, LookupCounter), LookupError> {
        let mut found = BTreeMap::new();
        let mut counter = LookupCounter::default();
        for id in ids {
            let result = self.author_data(id).await;
            collect(id, result, &mut found, &mut counter)?;
        }
        info!(
            found = found.len(),
            skipped = counter.skipped,
            unexpected = counter.unexpected_format,
            "author lookup finished"
        );
        Ok((found, counter))
    }
}

fn extract(mut body: Value, id: &str, pointer: &'static str) -> Result<Value, LookupError> {
    body.pointer_mut(pointer)
        .map(Value::take)
        .ok_or_else(|| LookupError::UnexpectedFormat {
            id: id.to_string(),
            expected: pointer,
        })
}

fn collect(
    id: &str,
    result: Result<Value, LookupError>,
    found: &mut BTreeMap<String, Value>,
    counter: &mut LookupCounter,
) -> Result<(), LookupError> {
    match result {
        Ok(value) => {
            found.insert(id.to_string(), value);
        }
        Err(LookupError::Fetch(e)) => {
            warn!(target: "skipped", id, error = %e, "lookup failed, skipping");
            counter.skipped += 1;
        }
        Err(e @ LookupError::UnexpectedFormat { .. }) => {
            warn!(target: "skipped", id, error = %e, "unexpected format, skipping");
            counter.unexpected_format += 1;
        }
        Err(e @ LookupError::NoMoreKeys(_)) => return Err(e),
    }
    Ok(())
}
