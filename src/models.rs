//! Data models shared by the extraction service and the progress stream.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`ScrapeRequest`] / [`ExtractionResult`]: the extraction service contract
//! - [`ExtractionStatus`]: per-URL outcome classification
//! - [`Phase`] / [`ProgressEvent`] / [`StreamEvent`]: the progress protocol
//! - [`AnalysisResult`]: the terminal payload produced by the analysis service
//!
//! Field names follow the JSON emitted by the analysis service, hence the
//! `#[serde(rename = ...)]` attributes on the bias and narrative maps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of a `POST /scrape` request.
///
/// Duplicate URLs are permitted and each occurrence is processed on its own.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapeRequest {
    /// URLs to fetch, in caller order.
    pub urls: Vec<String>,
}

/// Outcome classification for a single URL.
///
/// Serialized as `{"kind": "..."}`, with the status code carried alongside
/// for [`ExtractionStatus::HttpError`]:
///
/// ```json
/// {"kind": "http_error", "code": 404}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Page fetched and boilerplate removal produced a title and content.
    Success,
    /// The input could not be parsed as an http(s) URL. No request was made.
    InvalidUrl,
    /// Connection failure, timeout, or cancellation.
    TransportError,
    /// The server answered with a status of 400 or above.
    HttpError(u16),
    /// The body was empty or not a document the extractor understands.
    ParseError,
}

impl ExtractionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionStatus::Success)
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStatus::Success => write!(f, "success"),
            ExtractionStatus::InvalidUrl => write!(f, "invalid url"),
            ExtractionStatus::TransportError => write!(f, "transport error"),
            ExtractionStatus::HttpError(code) => write!(f, "http error {code}"),
            ExtractionStatus::ParseError => write!(f, "parse error"),
        }
    }
}

/// Result of extracting one URL.
///
/// Exactly one `ExtractionResult` is produced for every input URL, whatever
/// happened while fetching it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtractionResult {
    /// The URL exactly as supplied by the caller.
    pub url: String,
    /// Extracted article title (empty unless `status` is success).
    #[serde(default)]
    pub title: String,
    /// Extracted readable text (empty unless `status` is success).
    #[serde(default)]
    pub content: String,
    /// Outcome classification.
    pub status: ExtractionStatus,
    /// Human-readable failure detail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn success(url: impl Into<String>, title: String, content: String) -> Self {
        Self {
            url: url.into(),
            title,
            content,
            status: ExtractionStatus::Success,
            error: None,
        }
    }

    pub fn failure(
        url: impl Into<String>,
        status: ExtractionStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            content: String::new(),
            status,
            error: Some(detail.into()),
        }
    }
}

/// A named stage of the analysis pipeline.
///
/// Phases are totally ordered: `Discovery < Scraping < Analysis`. Each phase
/// reports on its own progress scale, so the authoritative progress value may
/// drop when a new phase begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Discovery,
    Scraping,
    Analysis,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Discovery => "discovery",
            Phase::Scraping => "scraping",
            Phase::Analysis => "analysis",
        };
        f.write_str(name)
    }
}

/// Authoritative progress reported by the analysis service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Overall progress in `[0, 100]`.
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Items completed within the phase (scraping reports articles read).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl ProgressEvent {
    pub fn new(phase: Phase, progress: f64) -> Self {
        Self {
            phase,
            progress,
            message: None,
            current: None,
            total: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_counts(mut self, current: usize, total: usize) -> Self {
        self.current = Some(current);
        self.total = Some(total);
        self
    }
}

/// One frame of the progress protocol, discriminated by its `event` field.
///
/// ```json
/// {"event": "progress", "phase": "scraping", "progress": 40, "current": 2, "total": 5}
/// {"event": "result", "data": {"topic": "..."}}
/// {"event": "error", "detail": "No relevant sources found for this topic"}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    Progress(ProgressEvent),
    Result { data: AnalysisResult },
    Error { detail: String },
}

/// Number of sources classified into each leaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BiasCounts {
    #[serde(rename = "Left", default)]
    pub left: usize,
    #[serde(rename = "Center", default)]
    pub center: usize,
    #[serde(rename = "Right", default)]
    pub right: usize,
}

impl BiasCounts {
    pub fn total(&self) -> usize {
        self.left + self.center + self.right
    }
}

/// Synthesized narrative per leaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Narratives {
    #[serde(rename = "Left", default)]
    pub left: String,
    #[serde(rename = "Right", default)]
    pub right: String,
}

/// A source article referenced by an analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    pub source: String,
}

/// Final payload of an analysis run.
///
/// Produced by the external analysis service; this crate only transports and
/// stores it. Every field defaults when absent so that older or partial
/// payloads still decode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub success: bool,
    pub topic: String,
    pub bias_counts: BiasCounts,
    pub narratives: Narratives,
    pub omission_report: String,
    pub sources_count: usize,
    pub sources: Vec<SourceRef>,
}
