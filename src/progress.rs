//! Progress UI (spinner) for crawl runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use scopus_core::store::PaperStore;

/// Spawns the spinner when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    store: PaperStore,
    stored_before: i64,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(store, stored_before, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    store: PaperStore,
    stored_before: i64,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            let stored = store.count().await.unwrap_or(stored_before);
            spinner.set_message(format!(
                "Crawling... {} new papers ({} total)",
                stored.saturating_sub(stored_before),
                stored
            ));
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        spinner.finish_and_clear();
    })
}
