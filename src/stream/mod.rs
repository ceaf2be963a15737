//! The progress protocol.
//!
//! The analysis service pushes a sequence of `data: <json>` lines while a run
//! moves through discovery, scraping and analysis. Each JSON object carries an
//! `event` discriminator:
//!
//! | Event | Fields | Meaning |
//! |-------|--------|---------|
//! | `progress` | `phase`, `progress`, `message?`, `current?`, `total?` | Authoritative progress |
//! | `result` | `data` | The run succeeded |
//! | `error` | `detail` | The run failed |
//!
//! A stream that closes with neither `result` nor `error` is a failed run.
//!
//! - [`frame`]: encoding frames and checking phase order on the producer side
//! - [`decoder`]: chunk-tolerant, fail-soft decoding on the consumer side

pub mod decoder;
pub mod frame;

pub use decoder::{FrameDecoder, RunOutcome, decode_stream};
pub use frame::{PhaseGuard, encode};
