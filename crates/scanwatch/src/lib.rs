//! scanwatch - debounced on-write virus scanning with desktop notifications
//!
//! Watches a set of filesystem paths and, once a created or modified file has
//! been quiescent for a configurable delay, runs an external content scanner
//! against it, logs the outcome, and reports it through a desktop dialog.
//!
//! # Architecture
//!
//! ```text
//! notify events → WatchTask → Debouncer ─(quiescence elapsed)→ ScanPipeline → {log, dialog}
//! ```
//!
//! - [`watch::WatchTask`]: drains the filesystem event stream
//! - [`debounce::Debouncer`]: one timer per path, reset on every event
//! - [`scan::ScanPipeline`]: validates the file, runs the scanner, reports
//! - [`dialog::ZenityNotifier`]: renders the outcome as a zenity dialog
//!
//! Scans of different paths run fully in parallel; the only shared state is
//! the debouncer's timer table.

pub mod config;
pub mod debounce;
pub mod dialog;
pub mod scan;
pub mod watch;

use std::{path::PathBuf, sync::Arc};

use tokio_util::sync::CancellationToken;

pub use config::{Config, ConfigError};
pub use watch::WatchError;

/// Wire up the full pipeline from config and watch `paths` until cancelled
///
/// Returns an error if watch registration fails or the watcher reports a
/// stream error; both are fatal to the process.
pub async fn run(paths: &[PathBuf], config: &Config, cancel: CancellationToken) -> Result<(), WatchError> {
  let scanner = Arc::new(scan::CommandScanner::new(
    config.scanner.command.clone(),
    config.scanner.args.clone(),
  ));
  let notifier = Arc::new(dialog::ZenityNotifier::new(config.dialog.command.clone()));
  let pipeline = Arc::new(scan::ScanPipeline::new(scanner, notifier));
  let debouncer = Arc::new(debounce::Debouncer::new(config.watch.quiescence(), pipeline));

  watch::WatchTask::new(paths, debouncer, cancel)?.run().await
}
