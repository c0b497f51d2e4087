//! Per-path event debouncing
//!
//! Filesystem writes arrive in bursts: an editor save or a download in
//! progress can produce dozens of modify events in under a second. The
//! [`Debouncer`] collapses each burst into a single scan by waiting for the
//! path to go quiet before dispatching.
//!
//! # Design
//!
//! A single table maps each path to its pending timer. Every incoming event
//! cancels the path's existing timer (if any) and installs a fresh one, so a
//! scan fires exactly once per burst, one quiescence delay after the *last*
//! event. Each expiry handler runs as its own spawned task; scans of
//! different paths never wait on each other.
//!
//! Cancellation only stops timers that have not yet fired. Once an expiry
//! handler has started its scan, later events for the same path cannot
//! interrupt it; they schedule a new scan instead. A handler always removes
//! its own table entry when it finishes, even if a replacement timer was
//! installed for the same path while it was scanning. The replacement's entry
//! may be removed early by the stale handler, but the replacement timer
//! itself still fires.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Receiver for paths whose quiescence delay has elapsed
///
/// Implemented by the scan pipeline in production and by recording stubs in
/// tests. `dispatch` runs on the expiry handler's task and may block it for
/// the full duration of a scan.
#[async_trait]
pub trait ScanDispatch: Send + Sync + 'static {
  async fn dispatch(&self, path: &Path);
}

/// A not-yet-fired timer for one path
///
/// Cancelling the token stops the timer if it is still sleeping; a timer
/// that has already begun dispatching is unaffected.
struct PendingTimer {
  cancel: CancellationToken,
}

struct Inner {
  timers: Mutex<HashMap<PathBuf, PendingTimer>>,
  dispatch: Arc<dyn ScanDispatch>,
  delay: Duration,
}

/// Coalesces bursts of change events into single scan dispatches
pub struct Debouncer {
  inner: Arc<Inner>,
}

impl Debouncer {
  /// Create a debouncer that dispatches after `delay` of quiescence
  pub fn new(delay: Duration, dispatch: Arc<dyn ScanDispatch>) -> Self {
    Self {
      inner: Arc::new(Inner {
        timers: Mutex::new(HashMap::new()),
        dispatch,
        delay,
      }),
    }
  }

  /// Record a change event for `path`, resetting its quiescence timer
  ///
  /// The check-cancel-install sequence runs under the table lock, so
  /// concurrent events for the same path cannot leave two live timers. The
  /// lock is never held while sleeping or scanning.
  pub async fn on_event(&self, path: PathBuf) {
    let mut timers = self.inner.timers.lock().await;

    if let Some(existing) = timers.remove(&path) {
      trace!(file = %path.display(), "resetting pending timer");
      existing.cancel.cancel();
    } else {
      trace!(file = %path.display(), "starting quiescence timer");
    }

    let cancel = CancellationToken::new();
    timers.insert(path.clone(), PendingTimer { cancel: cancel.clone() });

    let inner = self.inner.clone();
    tokio::spawn(async move {
      tokio::select! {
        // An elapsed deadline must win over a cancellation observed at the
        // same poll, or a finished burst's scan would be silently dropped.
        biased;

        _ = tokio::time::sleep(inner.delay) => {}
        _ = cancel.cancelled() => {
          // Replaced by a newer event; the replacement owns the table entry.
          return;
        }
      }

      inner.dispatch.dispatch(&path).await;

      // Unconditional removal. If a newer timer was installed for this path
      // while the scan ran, its entry is removed here too; that timer still
      // fires on its own and finds nothing left to remove.
      inner.timers.lock().await.remove(&path);
    });
  }

  /// Number of paths with a timer currently pending
  pub async fn pending(&self) -> usize {
    self.inner.timers.lock().await.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex as StdMutex;
  use tokio::sync::mpsc;
  use tokio::time::{Duration, Instant, advance, timeout};

  const QUIESCENCE: Duration = Duration::from_secs(2);

  /// Records every dispatch with its (paused-clock) timestamp
  struct Recorder {
    calls: StdMutex<Vec<(PathBuf, Instant)>>,
    tx: mpsc::UnboundedSender<PathBuf>,
    /// Simulated scan duration
    scan_time: Duration,
  }

  impl Recorder {
    fn new(scan_time: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<PathBuf>) {
      let (tx, rx) = mpsc::unbounded_channel();
      (
        Arc::new(Self {
          calls: StdMutex::new(Vec::new()),
          tx,
          scan_time,
        }),
        rx,
      )
    }

    fn calls(&self) -> Vec<(PathBuf, Instant)> {
      self.calls.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl ScanDispatch for Recorder {
    async fn dispatch(&self, path: &Path) {
      self.calls.lock().unwrap().push((path.to_path_buf(), Instant::now()));
      if !self.scan_time.is_zero() {
        tokio::time::sleep(self.scan_time).await;
      }
      let _ = self.tx.send(path.to_path_buf());
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_burst_coalesces_to_one_scan() {
    let (recorder, mut rx) = Recorder::new(Duration::ZERO);
    let debouncer = Debouncer::new(QUIESCENCE, recorder.clone());
    let start = Instant::now();

    // Events at t=0, t=1, t=1.5
    debouncer.on_event(PathBuf::from("/tmp/a")).await;
    advance(Duration::from_secs(1)).await;
    debouncer.on_event(PathBuf::from("/tmp/a")).await;
    advance(Duration::from_millis(500)).await;
    debouncer.on_event(PathBuf::from("/tmp/a")).await;

    // Auto-advance drives the last timer to expiry
    let fired = timeout(Duration::from_secs(10), rx.recv()).await.expect("dispatch");
    assert_eq!(fired, Some(PathBuf::from("/tmp/a")));

    // Exactly one scan, fired 2s after the *last* event (t=3.5)
    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.duration_since(start), Duration::from_millis(3500));

    // No second scan shows up later
    advance(Duration::from_secs(10)).await;
    assert_eq!(recorder.calls().len(), 1);
    assert_eq!(debouncer.pending().await, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_replaced_timer_never_fires() {
    let (recorder, mut rx) = Recorder::new(Duration::ZERO);
    let debouncer = Debouncer::new(QUIESCENCE, recorder.clone());
    let start = Instant::now();

    debouncer.on_event(PathBuf::from("/tmp/k")).await;
    advance(Duration::from_millis(1900)).await;
    // Replacement lands just before the first timer would fire
    debouncer.on_event(PathBuf::from("/tmp/k")).await;

    let _ = timeout(Duration::from_secs(10), rx.recv()).await.expect("dispatch");

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    // Fired at 1.9s + 2s, not at 2s
    assert_eq!(calls[0].1.duration_since(start), Duration::from_millis(3900));
  }

  #[tokio::test(start_paused = true)]
  async fn test_keys_are_independent() {
    let (recorder, mut rx) = Recorder::new(Duration::ZERO);
    let debouncer = Debouncer::new(QUIESCENCE, recorder.clone());

    debouncer.on_event(PathBuf::from("/tmp/a")).await;
    advance(Duration::from_secs(1)).await;
    // Activity on /tmp/b must not reset /tmp/a's timer
    debouncer.on_event(PathBuf::from("/tmp/b")).await;

    let first = timeout(Duration::from_secs(10), rx.recv()).await.expect("dispatch");
    assert_eq!(first, Some(PathBuf::from("/tmp/a")));
    let second = timeout(Duration::from_secs(10), rx.recv()).await.expect("dispatch");
    assert_eq!(second, Some(PathBuf::from("/tmp/b")));

    assert_eq!(recorder.calls().len(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_distinct_keys_scan_in_parallel() {
    // 50 single-event bursts with a 1s scan each: total wall clock should be
    // one quiescence delay plus one scan, not 50 scans end to end.
    let (recorder, mut rx) = Recorder::new(Duration::from_secs(1));
    let debouncer = Debouncer::new(QUIESCENCE, recorder.clone());
    let start = Instant::now();

    for i in 0..50 {
      debouncer.on_event(PathBuf::from(format!("/tmp/file-{i}"))).await;
    }

    for _ in 0..50 {
      timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("dispatch")
        .expect("channel open");
    }

    assert_eq!(recorder.calls().len(), 50);
    assert_eq!(Instant::now().duration_since(start), Duration::from_secs(3));

    // Let the expiry handlers finish their table cleanup
    advance(Duration::from_millis(1)).await;
    assert_eq!(debouncer.pending().await, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_event_during_scan_schedules_new_scan() {
    // Once a timer's deadline has elapsed, a later event cannot take its scan
    // away: the elapsed timer dispatches even if the cancellation is observed
    // at the same poll, and the new event schedules another scan. The stale
    // handler's unconditional removal of the table entry is harmless: the
    // replacement timer still fires.
    let (recorder, mut rx) = Recorder::new(Duration::from_secs(1));
    let debouncer = Debouncer::new(QUIESCENCE, recorder.clone());

    debouncer.on_event(PathBuf::from("/tmp/busy")).await;
    // Let the spawned timer task register its sleep at t=0 before advancing
    tokio::task::yield_now().await;
    // t=2: timer fires, scan runs until t=3
    advance(Duration::from_millis(2500)).await;
    // t=2.5: new event while the first timer's expiry is already due
    debouncer.on_event(PathBuf::from("/tmp/busy")).await;

    let first = timeout(Duration::from_secs(10), rx.recv()).await.expect("first scan");
    assert_eq!(first, Some(PathBuf::from("/tmp/busy")));
    let second = timeout(Duration::from_secs(10), rx.recv()).await.expect("second scan");
    assert_eq!(second, Some(PathBuf::from("/tmp/busy")));

    assert_eq!(recorder.calls().len(), 2);

    advance(Duration::from_millis(1)).await;
    assert_eq!(debouncer.pending().await, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_pending_tracks_live_timers() {
    let (recorder, _rx) = Recorder::new(Duration::ZERO);
    let debouncer = Debouncer::new(QUIESCENCE, recorder.clone());

    assert_eq!(debouncer.pending().await, 0);
    debouncer.on_event(PathBuf::from("/tmp/a")).await;
    debouncer.on_event(PathBuf::from("/tmp/b")).await;
    // Replacement does not grow the table
    debouncer.on_event(PathBuf::from("/tmp/a")).await;
    assert_eq!(debouncer.pending().await, 2);
  }
}
