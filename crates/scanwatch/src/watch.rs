//! Filesystem event ingestion
//!
//! Bridges notify's sync callbacks into the async world and feeds change
//! events to the [`Debouncer`]:
//! 1. notify's callback forwards `Result<Event, Error>` into a bounded
//!    channel with `blocking_send`
//! 2. `run()` drains the channel, passing each changed path to the debouncer
//! 3. A watcher-reported error is fatal: after an error the watcher's
//!    internal state is unknown, so `run()` returns and the process exits
//!    non-zero
//!
//! Paths are watched non-recursively; watching a directory covers its direct
//! entries only.

use std::{path::PathBuf, sync::Arc};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::debounce::Debouncer;

/// Errors that can occur while watching
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
  #[error("failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),

  #[error("failed to watch {path}: {source}")]
  Watch {
    path: PathBuf,
    #[source]
    source: notify::Error,
  },

  #[error("watch stream error: {0}")]
  Stream(#[source] notify::Error),
}

/// Long-lived task that drains filesystem events into the debouncer
pub struct WatchTask {
  debouncer: Arc<Debouncer>,
  cancel: CancellationToken,
  // The notify watcher must be held to keep it alive
  _watcher: RecommendedWatcher,
  // Channel receiving events from notify's sync callback
  event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
}

impl WatchTask {
  /// Create a watch task registered on every path in `paths`
  ///
  /// Registration failures are fatal setup errors. The task does nothing
  /// until `run()` is called.
  pub fn new(paths: &[PathBuf], debouncer: Arc<Debouncer>, cancel: CancellationToken) -> Result<Self, WatchError> {
    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);

    let mut watcher = RecommendedWatcher::new(
      move |res| {
        // This runs on notify's thread - use blocking_send.
        // If the channel is full or closed, the event is dropped.
        let _ = event_tx.blocking_send(res);
      },
      Config::default(),
    )
    .map_err(WatchError::Init)?;

    for path in paths {
      watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(|e| WatchError::Watch {
          path: path.clone(),
          source: e,
        })?;
      debug!(path = %path.display(), "watching");
    }

    info!(paths = paths.len(), "file watcher initialized");

    Ok(Self {
      debouncer,
      cancel,
      _watcher: watcher,
      event_rx,
    })
  }

  /// Run until cancelled, the event stream closes, or the watcher errors
  pub async fn run(mut self) -> Result<(), WatchError> {
    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!("watch task shutting down (cancelled)");
          return Ok(());
        }

        event = self.event_rx.recv() => {
          match event {
            Some(Ok(event)) => self.handle_event(event).await,
            Some(Err(e)) => {
              error!(error = %e, "watch stream error, shutting down");
              return Err(WatchError::Stream(e));
            }
            None => {
              info!("watch task shutting down (channel closed)");
              return Ok(());
            }
          }
        }
      }
    }
  }

  /// Forward a change event's paths to the debouncer
  async fn handle_event(&self, event: Event) {
    // Access events don't change content and would retrigger scans forever
    // (the scanner itself reads the file)
    if matches!(event.kind, EventKind::Access(_)) {
      trace!(kind = ?event.kind, "ignoring access event");
      return;
    }

    for path in event.paths {
      trace!(file = %path.display(), kind = ?event.kind, "change event");
      self.debouncer.on_event(path).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::debounce::ScanDispatch;
  use async_trait::async_trait;
  use std::path::Path;
  use std::time::Duration;
  use tokio::time::{sleep, timeout};

  struct ChannelDispatch {
    tx: mpsc::UnboundedSender<PathBuf>,
  }

  #[async_trait]
  impl ScanDispatch for ChannelDispatch {
    async fn dispatch(&self, path: &Path) {
      let _ = self.tx.send(path.to_path_buf());
    }
  }

  fn test_debouncer() -> (Arc<Debouncer>, mpsc::UnboundedReceiver<PathBuf>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatch = Arc::new(ChannelDispatch { tx });
    (Arc::new(Debouncer::new(Duration::from_millis(50), dispatch)), rx)
  }

  #[tokio::test]
  async fn test_watch_task_dispatches_after_quiescence() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let (debouncer, mut rx) = test_debouncer();
    let cancel = CancellationToken::new();

    let task = WatchTask::new(&[dir.path().to_path_buf()], debouncer, cancel.clone()).expect("create watch task");
    let handle = tokio::spawn(task.run());

    // Give the watcher time to start up
    sleep(Duration::from_millis(100)).await;

    let file = dir.path().join("dropped.bin");
    std::fs::write(&file, b"payload").expect("write file");

    let dispatched = timeout(Duration::from_secs(5), rx.recv())
      .await
      .expect("timeout waiting for dispatch")
      .expect("receive dispatch");
    assert_eq!(dispatched, file);

    cancel.cancel();
    let result = timeout(Duration::from_secs(2), handle)
      .await
      .expect("watch task should stop")
      .expect("join watch task");
    assert!(result.is_ok());
  }

  #[tokio::test]
  async fn test_watching_missing_path_fails_setup() {
    let (debouncer, _rx) = test_debouncer();
    let cancel = CancellationToken::new();

    let missing = PathBuf::from("/nonexistent/scanwatch-test-path");
    match WatchTask::new(&[missing.clone()], debouncer, cancel) {
      Err(WatchError::Watch { path, .. }) => assert_eq!(path, missing),
      Err(other) => panic!("expected registration failure, got {other}"),
      Ok(_) => panic!("watching a missing path should fail setup"),
    }
  }
}
