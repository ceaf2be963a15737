//! Presentation state machine for one analysis run.
//!
//! ```text
//! Idle → Discovery → Scraping → Analysis → Complete
//!   └────────┴──────────┴──────────┴─────→ Failed
//! ```
//!
//! The displayed value is the high-water mark of everything the tracker has
//! shown, so it never regresses even when the authoritative value resets at
//! a phase boundary or a stall estimate is restarted lower.

use super::merge::{is_stalled, merge_progress};
use crate::models::{Phase, ProgressEvent};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Idle,
    Active(Phase),
    Complete,
    Failed(String),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed(_))
    }
}

/// What a renderer needs to draw the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub state: RunState,
    pub displayed: f64,
    pub message: Option<String>,
    pub stalled: bool,
}

#[derive(Debug)]
pub struct ProgressTracker {
    state: RunState,
    authoritative: f64,
    displayed: f64,
    message: Option<String>,
    stall_started: Option<Instant>,
    smoothing: Duration,
}

impl ProgressTracker {
    pub fn new(smoothing: Duration) -> Self {
        Self {
            state: RunState::Idle,
            authoritative: 0.0,
            displayed: 0.0,
            message: None,
            stall_started: None,
            smoothing,
        }
    }

    /// Apply an authoritative update. Returns the displayed value.
    ///
    /// Ignored once the run is terminal, and ignored if it reports a phase
    /// earlier than the current one.
    pub fn apply(&mut self, event: &ProgressEvent, now: Instant) -> f64 {
        match &self.state {
            state if state.is_terminal() => {
                debug!(?state, "Ignoring progress after run ended");
                return self.displayed;
            }
            RunState::Active(current) if event.phase < *current => {
                debug!(current = %current, attempted = %event.phase, "Ignoring out-of-order phase");
                return self.displayed;
            }
            _ => {}
        }

        self.state = RunState::Active(event.phase);
        self.authoritative = event.progress.clamp(0.0, 100.0);
        if event.message.is_some() {
            self.message = event.message.clone();
        }
        // Each value inside the band restarts the estimate from that value
        self.stall_started = is_stalled(event.phase, self.authoritative).then_some(now);
        self.recompute(now)
    }

    /// Advance the stall estimate. Returns the displayed value.
    pub fn tick(&mut self, now: Instant) -> f64 {
        self.recompute(now)
    }

    pub fn complete(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = RunState::Complete;
        self.authoritative = 100.0;
        self.displayed = 100.0;
        self.stall_started = None;
    }

    /// Fail the run. The displayed value is left where it was.
    pub fn fail(&mut self, detail: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = RunState::Failed(detail.into());
        self.stall_started = None;
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn displayed(&self) -> f64 {
        self.displayed
    }

    pub fn is_stalled(&self) -> bool {
        self.stall_started.is_some()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            state: self.state.clone(),
            displayed: self.displayed,
            message: self.message.clone(),
            stalled: self.is_stalled(),
        }
    }

    fn recompute(&mut self, now: Instant) -> f64 {
        let RunState::Active(phase) = self.state else {
            return self.displayed;
        };
        let elapsed = self.stall_started.map(|start| now.saturating_duration_since(start));
        let merged = merge_progress(phase, self.authoritative, elapsed, self.smoothing);
        self.displayed = self.displayed.max(merged);
        self.displayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMOOTHING: Duration = Duration::from_secs(20);

    fn ev(phase: Phase, progress: f64) -> ProgressEvent {
        ProgressEvent::new(phase, progress)
    }

    #[test]
    fn test_follows_authoritative_outside_stall() {
        let now = Instant::now();
        let mut t = ProgressTracker::new(SMOOTHING);
        assert_eq!(t.state(), &RunState::Idle);
        assert_eq!(t.apply(&ev(Phase::Discovery, 5.0), now), 5.0);
        assert_eq!(t.apply(&ev(Phase::Scraping, 40.0), now), 40.0);
        assert_eq!(t.state(), &RunState::Active(Phase::Scraping));
    }

    #[test]
    fn test_phase_reset_does_not_regress_display() {
        let now = Instant::now();
        let mut t = ProgressTracker::new(SMOOTHING);
        t.apply(&ev(Phase::Scraping, 60.0), now);
        assert_eq!(t.apply(&ev(Phase::Analysis, 10.0), now), 60.0);
        assert_eq!(t.state(), &RunState::Active(Phase::Analysis));
    }

    #[test]
    fn test_earlier_phase_ignored() {
        let now = Instant::now();
        let mut t = ProgressTracker::new(SMOOTHING);
        t.apply(&ev(Phase::Scraping, 30.0), now);
        t.apply(&ev(Phase::Discovery, 80.0), now);
        assert_eq!(t.state(), &RunState::Active(Phase::Scraping));
        assert_eq!(t.displayed(), 30.0);
    }

    #[test]
    fn test_stall_smoothing_then_completion() {
        let start = Instant::now();
        let mut t = ProgressTracker::new(SMOOTHING);
        t.apply(&ev(Phase::Analysis, 90.0), start);
        assert!(t.is_stalled());
        assert_eq!(t.tick(start + Duration::from_secs(10)), 96.0);
        assert_eq!(t.tick(start + Duration::from_secs(40)), 98.0);

        // Leaving the band upward hands control back to the server
        t.apply(&ev(Phase::Analysis, 99.0), start + Duration::from_secs(41));
        assert!(!t.is_stalled());
        assert_eq!(t.displayed(), 99.0);

        t.complete();
        assert_eq!(t.state(), &RunState::Complete);
        assert_eq!(t.displayed(), 100.0);
    }

    #[test]
    fn test_authoritative_below_estimate_never_pulls_display_down() {
        let start = Instant::now();
        let mut t = ProgressTracker::new(SMOOTHING);
        t.apply(&ev(Phase::Analysis, 90.0), start);
        let high = t.tick(start + Duration::from_secs(15));
        assert!(high > 97.0);
        // Server reports 95: estimate restarts from 95 but display holds
        assert_eq!(t.apply(&ev(Phase::Analysis, 95.0), start + Duration::from_secs(16)), high);
        assert!(t.tick(start + Duration::from_secs(36)) >= high);
    }

    #[test]
    fn test_terminal_states_absorb_events() {
        let now = Instant::now();
        let mut t = ProgressTracker::new(SMOOTHING);
        t.apply(&ev(Phase::Scraping, 30.0), now);
        t.fail("scraper unavailable");
        assert_eq!(t.state(), &RunState::Failed("scraper unavailable".into()));
        assert_eq!(t.apply(&ev(Phase::Analysis, 70.0), now), 30.0);
        t.complete();
        assert!(matches!(t.state(), RunState::Failed(_)));
    }

    #[test]
    fn test_fail_from_idle() {
        let mut t = ProgressTracker::new(SMOOTHING);
        t.fail("stream aborted");
        assert!(t.state().is_terminal());
        assert_eq!(t.displayed(), 0.0);
    }

    #[test]
    fn test_display_monotonic_over_random_walk() {
        let start = Instant::now();
        let mut t = ProgressTracker::new(SMOOTHING);
        let script = [
            (Phase::Discovery, 5.0),
            (Phase::Discovery, 15.0),
            (Phase::Scraping, 15.0),
            (Phase::Scraping, 33.0),
            (Phase::Scraping, 60.0),
            (Phase::Analysis, 65.0),
            (Phase::Analysis, 92.0),
            (Phase::Analysis, 91.0),
            (Phase::Analysis, 95.0),
            (Phase::Analysis, 100.0),
        ];
        let mut last = 0.0;
        let mut now = start;
        for (phase, progress) in script {
            for _ in 0..50 {
                now += Duration::from_millis(137);
                let v = t.tick(now);
                assert!(v >= last);
                last = v;
            }
            let v = t.apply(&ev(phase, progress), now);
            assert!(v >= last, "{v} < {last} after {phase} {progress}");
            last = v;
        }
        assert_eq!(last, 100.0);
    }
}
