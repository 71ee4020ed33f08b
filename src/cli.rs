//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Crawl Scopus search results into a local database.
///
/// Keywords and document types are crossed and searched in order; API keys
/// rotate automatically when their weekly quota runs out.
#[derive(Parser, Debug)]
#[command(name = "scopus-crawler")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// JSON file with `{"API_Keys": [...]}`; replaces keys from the config
    #[arg(long, global = true, value_name = "PATH")]
    pub keys_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search every keyword x document type pair and store the papers
    Crawl(CrawlArgs),

    /// Fetch full abstract records by Scopus id and print them as JSON
    Abstracts {
        /// Scopus ids
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,
    },

    /// Fetch enhanced author profiles by author id and print them as JSON
    Authors {
        /// Scopus author ids
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,
    },

    /// Print the most frequent n-grams over stored abstracts
    Ngrams(NgramArgs),
}

/// Overrides for the `crawl` subcommand.
#[derive(Args, Debug, Default)]
pub struct CrawlArgs {
    /// Keyword to search (repeatable; replaces config keywords)
    #[arg(short = 'k', long = "keyword", value_name = "KEYWORD")]
    pub keywords: Vec<String>,

    /// Two-letter document type code (repeatable; replaces config doc types)
    #[arg(short = 't', long = "doc-type", value_name = "CODE")]
    pub doc_types: Vec<String>,

    /// Maximum records per keyword/doc type pair
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Drop papers with fewer pages than this
    #[arg(long)]
    pub min_pages: Option<i64>,

    /// SQLite database path
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Do not show a progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

/// Options for the `ngrams` subcommand.
#[derive(Args, Debug)]
pub struct NgramArgs {
    /// SQLite database path
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// N-gram length
    #[arg(short = 'n', long = "size", default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub size: u8,

    /// Number of n-grams to print
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Keep n-grams that contain stop words
    #[arg(long)]
    pub keep_stopwords: bool,

    /// Include abstracts from every source type, not only journals and proceedings
    #[arg(long)]
    pub all_sources: bool,
}
