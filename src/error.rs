//! Error types.
//!
//! Per-URL extraction failures are not errors: they are recorded as an
//! [`ExtractionStatus`](crate::models::ExtractionStatus) on the result so a
//! batch never aborts because one page misbehaved. The types here cover the
//! failures that do propagate to a caller.

use thiserror::Error;

/// Failure to set up the extraction pool.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Terminal failure of an analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The service sent an `error` frame, or answered the synchronous call with one.
    #[error("{0}")]
    Terminal(String),

    /// The stream closed without a `result` or `error` frame.
    #[error("analysis failed: stream closed before a result was received")]
    Incomplete,

    /// Connection failure while sending the request or reading the stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service refused the request before streaming began.
    #[error("analysis service returned {status}: {detail}")]
    Rejected { status: u16, detail: String },

    /// A non-streaming response body could not be decoded.
    #[error("failed to decode analysis response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AnalysisError::Decode(e.to_string())
        } else {
            AnalysisError::Transport(e.to_string())
        }
    }
}

/// Failure loading the YAML settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
