//! CLI entry point for the Scopus crawler.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use scopus_core::analysis::{EnglishStopWords, NgramStats};
use scopus_core::crawl::{CrawlError, Crawler, LookupClient, LookupError};
use scopus_core::fetch::{RateLimitedFetcher, ServiceThrottle, format_reset};
use scopus_core::keys::KeyPool;
use scopus_core::store::{DEFAULT_ABSTRACT_SOURCES, PaperStore};
use scopus_core::Database;
use tracing::{debug, error, info, warn};

mod cli;
mod config;
mod exit_handler;
mod progress;

use cli::{Cli, Command, CrawlArgs, NgramArgs};
use config::CrawlConfig;
use exit_handler::{ProcessExit, determine_exit_outcome};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    init_tracing(default_level);
    debug!(?cli, "CLI arguments parsed");

    match run(cli).await {
        Ok(exit) => exit.into(),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn run(cli: Cli) -> Result<ProcessExit> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => CrawlConfig::default(),
    };
    if let Some(keys_file) = &cli.keys_file {
        config.api_keys = config::load_keys_file(keys_file)?;
    }

    match cli.command {
        Command::Crawl(args) => run_crawl(config, args, cli.quiet).await,
        Command::Abstracts { ids } => run_lookup(&config, &ids, LookupKind::Abstracts).await,
        Command::Authors { ids } => run_lookup(&config, &ids, LookupKind::Authors).await,
        Command::Ngrams(args) => run_ngrams(config, args).await,
    }
}

fn build_fetcher(config: &CrawlConfig) -> Result<(Arc<KeyPool>, Arc<RateLimitedFetcher>)> {
    let keys = Arc::new(KeyPool::new(config.require_api_keys()?)?);
    let fetcher = RateLimitedFetcher::new(
        Arc::clone(&keys),
        Arc::new(ServiceThrottle::new()),
        config.fetcher_settings(),
    )?;
    Ok((keys, Arc::new(fetcher)))
}

/// Tells the operator when each service's quota comes back.
fn log_reset_dates(keys: &KeyPool) {
    for (service, reset) in keys.reset_summary() {
        let reset = reset.map_or_else(|| "unknown".to_string(), format_reset);
        error!(service = %service, reset = %reset, "Quota resets at");
    }
}

async fn run_crawl(mut config: CrawlConfig, args: CrawlArgs, quiet: bool) -> Result<ProcessExit> {
    if !args.keywords.is_empty() {
        config.keywords = args.keywords;
    }
    if !args.doc_types.is_empty() {
        config.doc_types = args.doc_types;
    }
    if args.limit.is_some() {
        config.per_query_limit = args.limit;
    }
    if args.min_pages.is_some() {
        config.min_pages = args.min_pages;
    }
    if let Some(db) = args.db {
        config.database = db;
    }
    config.validate()?;
    config.require_crawl_terms()?;

    let (keys, fetcher) = build_fetcher(&config)?;
    let db = Database::new(&config.database)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.display()))?;
    let store = PaperStore::new(db.clone());
    let stored_before = store.count().await?;

    info!(
        keywords = config.keywords.len(),
        doc_types = config.doc_types.len(),
        database = %config.database.display(),
        "Scopus crawl starting"
    );

    let use_spinner = !args.no_progress && !quiet && io::stderr().is_terminal();
    let (spinner, stop) = progress::spawn_progress_ui(use_spinner, store.clone(), stored_before);

    let crawler = Crawler::new(fetcher, Arc::new(store), config.crawl_options());
    let result = crawler.run(&config.keywords, &config.doc_types).await;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = spinner {
        let _ = handle.await;
    }

    let exit = match result {
        Ok(report) => {
            info!(
                queries = report.queries.len(),
                failed = report.failed(),
                processed = report.processed(),
                stored = report.stored(),
                short_papers_skipped = report.filter.skipped,
                no_page_info = report.filter.no_page_info,
                unexpected_page_range = report.filter.unexpected,
                "Crawl finished"
            );
            for outcome in report.queries.iter().filter(|q| q.is_failed()) {
                warn!(
                    query = %outcome.query,
                    failure = outcome.failure.as_deref().unwrap_or_default(),
                    "Query failed"
                );
            }
            determine_exit_outcome(report.completed(), report.failed())
        }
        Err(CrawlError::NoMoreKeys(e)) => {
            error!(error = %e, "All API keys exhausted, stopping crawl");
            log_reset_dates(&keys);
            ProcessExit::Failure
        }
        Err(e) => {
            db.close().await;
            return Err(e).context("Crawl aborted");
        }
    };

    db.close().await;
    Ok(exit)
}

#[derive(Debug, Clone, Copy)]
enum LookupKind {
    Abstracts,
    Authors,
}

async fn run_lookup(config: &CrawlConfig, ids: &[String], kind: LookupKind) -> Result<ProcessExit> {
    config.validate()?;
    let (keys, fetcher) = build_fetcher(config)?;
    let client = LookupClient::new(fetcher, config.endpoints());

    let result = match kind {
        LookupKind::Abstracts => client.abstracts(ids).await,
        LookupKind::Authors => client.authors(ids).await,
    };

    match result {
        Ok((found, counter)) => {
            println!("{}", serde_json::to_string_pretty(&found)?);
            let failed = usize::try_from(counter.skipped + counter.unexpected_format)
                .unwrap_or(usize::MAX);
            Ok(determine_exit_outcome(found.len(), failed))
        }
        Err(LookupError::NoMoreKeys(e)) => {
            error!(error = %e, "All API keys exhausted, stopping lookup");
            log_reset_dates(&keys);
            Ok(ProcessExit::Failure)
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_ngrams(mut config: CrawlConfig, args: NgramArgs) -> Result<ProcessExit> {
    if let Some(db) = args.db {
        config.database = db;
    }

    let db = Database::new(&config.database)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.display()))?;
    let store = PaperStore::new(db.clone());
    let sources: &[&str] = if args.all_sources {
        &[]
    } else {
        &DEFAULT_ABSTRACT_SOURCES
    };
    let abstracts = store.abstracts(sources).await?;
    db.close().await;

    let stop_words = (!args.keep_stopwords).then(EnglishStopWords::load);
    let stats = NgramStats::build(
        abstracts.iter().map(String::as_str),
        usize::from(args.size),
        stop_words.as_ref(),
    )?;
    info!(
        abstracts = abstracts.len(),
        distinct = stats.distinct(),
        total = stats.total(),
        "N-gram statistics"
    );

    for (gram, count) in stats.top(args.top) {
        println!("{count}\t{gram}");
    }
    Ok(ProcessExit::Success)
}
