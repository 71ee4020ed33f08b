//! Text statistics over stored abstracts.

mod ngrams;

pub use ngrams::{EnglishStopWords, NgramError, NgramStats, ngrams, tokenize};
