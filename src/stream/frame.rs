//! Producer side of the progress protocol.
//!
//! Frames are single lines of the form `data: <json>` followed by a blank
//! line, matching `text/event-stream` framing.

use crate::models::{Phase, ProgressEvent, StreamEvent};

pub const DATA_PREFIX: &str = "data: ";

/// Encode one event as a `data: ` frame, including the trailing blank line.
pub fn encode(event: &StreamEvent) -> Result<String, serde_json::Error> {
    Ok(format!("{DATA_PREFIX}{}\n\n", serde_json::to_string(event)?))
}

/// Enforces that a producer never reports an earlier phase after a later one.
#[derive(Debug, Default)]
pub struct PhaseGuard {
    current: Option<Phase>,
}

impl PhaseGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `event` if its phase does not precede the last accepted phase.
    pub fn admit(&mut self, event: &ProgressEvent) -> Result<(), PhaseRegression> {
        match self.current {
            Some(current) if event.phase < current => Err(PhaseRegression {
                current,
                attempted: event.phase,
            }),
            _ => {
                self.current = Some(event.phase);
                Ok(())
            }
        }
    }

    pub fn current(&self) -> Option<Phase> {
        self.current
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("progress for {attempted} after {current} has started")]
pub struct PhaseRegression {
    pub current: Phase,
    pub attempted: Phase,
}
