//! Selection between authoritative progress and the local stall estimate.
//!
//! While the analysis phase sits between 90 and 98 the service sends no
//! finer signal, so the display eases from the last authoritative value
//! toward 98 over a fixed duration. Everything here is a pure function of
//! its arguments.

use crate::models::Phase;
use std::time::Duration;

/// Lower bound (inclusive) of the stall band.
pub const STALL_START: f64 = 90.0;
/// Upper bound (exclusive) of the stall band and target of the estimate.
pub const STALL_TARGET: f64 = 98.0;

/// Quadratic ease-out over `t` in `[0, 1]`; inputs outside are clamped.
pub fn ease_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * (2.0 - t)
}

/// Whether the local estimate should drive the display.
pub fn is_stalled(phase: Phase, authoritative: f64) -> bool {
    phase == Phase::Analysis && (STALL_START..STALL_TARGET).contains(&authoritative)
}

/// Progress to display given the authoritative value and, when stalled,
/// the time since the stall began.
///
/// The result is never below `authoritative` and, while stalled, never
/// above [`STALL_TARGET`].
pub fn merge_progress(
    phase: Phase,
    authoritative: f64,
    stall_elapsed: Option<Duration>,
    duration: Duration,
) -> f64 {
    let authoritative = authoritative.clamp(0.0, 100.0);
    match stall_elapsed {
        Some(elapsed) if is_stalled(phase, authoritative) => {
            let t = if duration.is_zero() {
                1.0
            } else {
                elapsed.as_secs_f64() / duration.as_secs_f64()
            };
            authoritative + (STALL_TARGET - authoritative) * ease_out_quad(t)
        }
        _ => authoritative,
    }
}
