//! N-gram frequency counting.
//!
//! Abstracts are lower-cased and split on whitespace; n-grams are contiguous
//! windows over the token list. Optionally any n-gram containing an English
//! stop word is dropped.
//!
//! # Example
//!
//! ```
//! use scopus_core::analysis::NgramStats;
//!
//! let abstracts = ["Deep learning for climate", "deep learning at scale"];
//! let stats = NgramStats::build(abstracts.iter().copied(), 2, None).unwrap();
//! assert_eq!(stats.top(1), vec![("deep learning".to_string(), 2)]);
//! ```

use std::collections::{HashMap, HashSet};

use stop_words::{LANGUAGE, get};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from n-gram construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NgramError {
    /// A window size of zero was requested.
    #[error("n-gram length must be at least 1")]
    ZeroLength,
}

/// Lower-cases `text` and splits it on whitespace.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Contiguous windows of `n` tokens, in order.
///
/// # Errors
///
/// Returns [`NgramError::ZeroLength`] when `n == 0`.
pub fn ngrams<T: AsRef<str>>(tokens: &[T], n: usize) -> Result<Vec<Vec<&str>>, NgramError> {
    if n == 0 {
        return Err(NgramError::ZeroLength);
    }
    Ok(tokens
        .windows(n)
        .map(|window| window.iter().map(AsRef::as_ref).collect())
        .collect())
}

/// The English stop-word list, lower-cased.
#[derive(Debug, Clone)]
pub struct EnglishStopWords {
    words: HashSet<String>,
}

impl Default for EnglishStopWords {
    fn default() -> Self {
        Self::load()
    }
}

impl EnglishStopWords {
    /// Loads the list bundled with the `stop-words` crate.
    #[must_use]
    pub fn load() -> Self {
        let words = get(LANGUAGE::English)
            .iter()
            .map(|word| word.to_string().to_lowercase())
            .collect();
        Self { words }
    }

    /// Whether `word` (already lower-cased) is a stop word.
    #[must_use]
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    /// Number of words in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Frequencies of space-joined n-grams.
#[derive(Debug, Clone, Default)]
pub struct NgramStats {
    n: usize,
    counts: HashMap<String, u64>,
}

impl NgramStats {
    /// Counts `n`-grams over every text, skipping ones that contain a stop word
    /// when `stop_words` is given.
    ///
    /// # Errors
    ///
    /// Returns [`NgramError::ZeroLength`] when `n == 0`.
    #[instrument(skip(texts, stop_words))]
    pub fn build<'a, I>(
        texts: I,
        n: usize,
        stop_words: Option<&EnglishStopWords>,
    ) -> Result<Self, NgramError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if n == 0 {
            return Err(NgramError::ZeroLength);
        }

        let mut counts: HashMap<String, u64> = HashMap::new();
        let mut documents = 0_u64;
        for text in texts {
            documents += 1;
            let tokens = tokenize(text);
            for gram in ngrams(&tokens, n)? {
                if stop_words.is_some_and(|sw| gram.iter().any(|token| sw.contains(token))) {
                    continue;
                }
                *counts.entry(gram.join(" ")).or_default() += 1;
            }
        }

        debug!(documents, distinct = counts.len(), "n-gram counts built");
        Ok(Self { n, counts })
    }

    /// The window size.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Count for one n-gram.
    #[must_use]
    pub fn count(&self, gram: &str) -> u64 {
        self.counts.get(gram).copied().unwrap_or(0)
    }

    /// Total occurrences across all n-grams.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct n-grams.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// The `k` most frequent n-grams; ties are ordered lexicographically.
    #[must_use]
    pub fn top(&self, k: usize) -> Vec<(String, u64)> {
        let mut ranked: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|(gram, count)| (gram.clone(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }
}
