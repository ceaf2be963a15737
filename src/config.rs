//! Runtime settings.
//!
//! Settings come from three layers, lowest priority first:
//!
//! 1. Built-in defaults ([`Settings::default`])
//! 2. An optional YAML file passed with `--config`
//! 3. Command-line flags and their environment variables (see [`crate::cli`])
//!
//! # Example
//!
//! ```yaml
//! port: 8080
//! analysis_api_url: http://localhost:8000
//! per_url_timeout_secs: 15
//! max_concurrency: 32
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Browser-like user agent; several news sites reject obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Listening port of the extraction service.
    pub port: u16,
    /// Base URL of the analysis service.
    pub analysis_api_url: String,
    /// Base URL of a remote extraction service, used by `scrape --remote`.
    pub scraper_url: String,
    /// Deadline for fetching a single URL.
    pub per_url_timeout_secs: u64,
    /// Maximum number of URLs fetched at once.
    pub max_concurrency: usize,
    /// Largest response body read for one URL.
    pub max_body_bytes: u64,
    pub user_agent: String,
    /// Duration of the local progress estimate during the analysis stall.
    pub smoothing_secs: u64,
    /// Where `analyze` writes result files, if anywhere.
    pub output_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            analysis_api_url: "http://localhost:8000".to_string(),
            scraper_url: "http://localhost:8080".to_string(),
            per_url_timeout_secs: 15,
            max_concurrency: 32,
            max_body_bytes: 5 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            smoothing_secs: 20,
            output_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file. Missing keys keep their defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!("Loaded settings file");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn per_url_timeout(&self) -> Duration {
        Duration::from_secs(self.per_url_timeout_secs)
    }

    pub fn smoothing_duration(&self) -> Duration {
        Duration::from_secs(self.smoothing_secs)
    }
}
