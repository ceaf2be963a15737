//! Output generation.
//!
//! - [`json`]: writes finished analyses to dated JSON files

pub mod json;
