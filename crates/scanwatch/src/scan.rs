//! Scan pipeline
//!
//! Runs once per quiescent path: re-check that the path is still a real
//! regular file, hand it to the external scanner, log the outcome, and push
//! the result to the notifier.
//!
//! The watcher triggers on removed files, symlinks, directories and the like,
//! so the metadata check filters those out before the scanner ever runs. A
//! path that disappeared or changed shape between the event and the timer
//! firing is a normal race against a mutable filesystem, not an error; it is
//! logged at debug and skipped.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::{debounce::ScanDispatch, dialog::Notifier};

// ============================================================================
// Scanner
// ============================================================================

/// Result of one external scanner run
#[derive(Debug, Clone)]
pub struct ScanOutcome {
  /// Combined stdout and stderr of the scanner
  pub output: Vec<u8>,

  /// Failure message, `None` on success
  pub failure: Option<String>,
}

impl ScanOutcome {
  /// Status string for logging: "success" or the failure message
  pub fn status(&self) -> &str {
    self.failure.as_deref().unwrap_or("success")
  }
}

/// A single blocking external scan of one file
#[async_trait]
pub trait Scanner: Send + Sync {
  async fn invoke(&self, path: &Path) -> ScanOutcome;
}

/// Scanner backed by an external command (`clamdscan` by default)
///
/// The file path is appended as the final argument. A non-zero exit status or
/// a failure to spawn the command both count as scan failures; neither is
/// fatal to the process.
#[derive(Debug, Clone)]
pub struct CommandScanner {
  command: String,
  args: Vec<String>,
}

impl CommandScanner {
  pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      command: command.into(),
      args,
    }
  }
}

#[async_trait]
impl Scanner for CommandScanner {
  async fn invoke(&self, path: &Path) -> ScanOutcome {
    let result = tokio::process::Command::new(&self.command)
      .args(&self.args)
      .arg(path)
      .output()
      .await;

    match result {
      Ok(output) => {
        // Approximate CombinedOutput: stdout first, then stderr
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        let failure = (!output.status.success()).then(|| output.status.to_string());

        ScanOutcome {
          output: combined,
          failure,
        }
      }
      Err(e) => ScanOutcome {
        output: Vec::new(),
        failure: Some(format!("failed to run {}: {e}", self.command)),
      },
    }
  }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Validates, scans, logs, and notifies for one settled path at a time
pub struct ScanPipeline {
  scanner: Arc<dyn Scanner>,
  notifier: Arc<dyn Notifier>,
}

impl ScanPipeline {
  pub fn new(scanner: Arc<dyn Scanner>, notifier: Arc<dyn Notifier>) -> Self {
    Self { scanner, notifier }
  }

  /// Scan one file and report the result
  ///
  /// Never called twice concurrently for the same path under normal
  /// debouncing; runs freely in parallel with scans of other paths.
  pub async fn scan(&self, path: &Path) {
    let meta = match tokio::fs::symlink_metadata(path).await {
      Ok(meta) => meta,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(file = %path.display(), "not scanning, file was removed");
        return;
      }
      Err(e) => {
        debug!(file = %path.display(), error = %e, "not scanning, metadata query failed");
        return;
      }
    };

    if !meta.is_file() {
      debug!(file = %path.display(), mode = ?meta.file_type(), "not scanning, not a regular file");
      return;
    }

    let size = meta.len();
    debug!(file = %path.display(), size, "executing scan");

    let outcome = self.scanner.invoke(path).await;
    let output = String::from_utf8_lossy(&outcome.output);

    match outcome.failure {
      None => {
        info!(file = %path.display(), status = outcome.status(), output = %output, "scan finished");
      }
      Some(_) => {
        error!(file = %path.display(), status = outcome.status(), output = %output, "scan failed");
      }
    }

    self.notifier.notify(&outcome.output, outcome.failure.as_deref()).await;
  }
}

#[async_trait]
impl ScanDispatch for ScanPipeline {
  async fn dispatch(&self, path: &Path) {
    self.scan(path).await;
  }
}
