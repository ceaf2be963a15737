//! # Parallax News
//!
//! Concurrent article extraction and live progress reporting for a
//! multi-perspective news analysis pipeline.
//!
//! ## Features
//!
//! - Fetches a batch of URLs concurrently with a per-URL deadline, a bounded
//!   worker count, and batch-wide cancellation
//! - Strips navigation, ads and scripts to keep each page's title and text
//! - Serves extraction over HTTP (`POST /scrape`)
//! - Decodes the analysis service's `data: <json>` progress stream, tolerant
//!   of arbitrary chunking and malformed frames
//! - Renders a single progress value that never moves backwards, easing
//!   through the long final analysis step
//!
//! ## Architecture
//!
//! The analysis pipeline runs through three phases:
//! 1. **Discovery**: the analysis service finds source URLs for a topic
//! 2. **Scraping**: sources are fetched and cleaned by [`extract::ExtractionPool`]
//! 3. **Analysis**: the service synthesizes narratives from the articles
//!
//! Progress for each phase arrives over [`stream`] and is presented through
//! [`progress::ProgressRun`].

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod outputs;
pub mod progress;
pub mod server;
pub mod stream;
pub mod utils;
