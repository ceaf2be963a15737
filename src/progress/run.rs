//! Lifecycle owner for one run's progress display.
//!
//! [`ProgressRun`] wraps a [`ProgressTracker`], publishes every change on a
//! `watch` channel, and owns the smoothing task that advances the stall
//! estimate between server messages. The task exists only while the stall
//! condition holds; it is cancelled when the condition ends, when the run
//! reaches a terminal state, and when the run is dropped.

use super::tracker::{ProgressSnapshot, ProgressTracker};
use crate::models::ProgressEvent;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Roughly one animation frame.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

struct Smoother {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ProgressRun {
    tracker: Arc<Mutex<ProgressTracker>>,
    tx: Arc<watch::Sender<ProgressSnapshot>>,
    smoother: Option<Smoother>,
}

impl ProgressRun {
    /// Create a run whose stall estimate spans `smoothing`.
    pub fn new(smoothing: Duration) -> (Self, watch::Receiver<ProgressSnapshot>) {
        let tracker = ProgressTracker::new(smoothing);
        let (tx, rx) = watch::channel(tracker.snapshot());
        let run = Self {
            tracker: Arc::new(Mutex::new(tracker)),
            tx: Arc::new(tx),
            smoother: None,
        };
        (run, rx)
    }

    /// Feed an authoritative update. Must be called within a Tokio runtime.
    #[instrument(level = "trace", skip_all, fields(phase = %event.phase, progress = event.progress))]
    pub fn on_progress(&mut self, event: &ProgressEvent) {
        let stalled = {
            let mut tracker = lock(&self.tracker);
            tracker.apply(event, Instant::now());
            self.tx.send_replace(tracker.snapshot());
            tracker.is_stalled()
        };

        match (stalled, self.smoother.is_some()) {
            (true, false) => self.start_smoother(),
            (false, true) => self.stop_smoother(),
            _ => {}
        }
    }

    pub fn complete(&mut self) {
        self.stop_smoother();
        let mut tracker = lock(&self.tracker);
        tracker.complete();
        self.tx.send_replace(tracker.snapshot());
    }

    pub fn fail(&mut self, detail: impl Into<String>) {
        self.stop_smoother();
        let mut tracker = lock(&self.tracker);
        tracker.fail(detail);
        self.tx.send_replace(tracker.snapshot());
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        lock(&self.tracker).snapshot()
    }

    /// Whether the smoothing task is currently running.
    pub fn is_smoothing(&self) -> bool {
        self.smoother.as_ref().is_some_and(|s| !s.handle.is_finished())
    }

    fn start_smoother(&mut self) {
        debug!("Starting stall smoothing");
        let token = CancellationToken::new();
        let tracker = Arc::clone(&self.tracker);
        let tx = Arc::clone(&self.tx);
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(FRAME_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        let mut guard = lock(&tracker);
                        guard.tick(Instant::now());
                        tx.send_if_modified(|current| {
                            let next = guard.snapshot();
                            let changed = *current != next;
                            *current = next;
                            changed
                        });
                    }
                }
            }
        });
        self.smoother = Some(Smoother { token, handle });
    }

    fn stop_smoother(&mut self) {
        if let Some(smoother) = self.smoother.take() {
            debug!("Stopping stall smoothing");
            smoother.token.cancel();
        }
    }
}

impl Drop for ProgressRun {
    fn drop(&mut self) {
        self.stop_smoother();
    }
}

fn lock(tracker: &Mutex<ProgressTracker>) -> MutexGuard<'_, ProgressTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}
