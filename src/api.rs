//! HTTP clients for the services around the extraction core.
//!
//! - [`AnalysisClient`]: starts an analysis run and consumes its progress
//!   stream, or calls the synchronous fallback endpoint
//! - [`ScraperClient`]: calls a remote extraction service's `POST /scrape`
//!
//! # Endpoints
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `POST` | `/api/analyze/stream` | `data: <json>` lines, see [`crate::stream`] |
//! | `POST` | `/api/analyze` | Final analysis payload |
//! | `POST` | `/scrape` | JSON array of extraction results |

use crate::error::AnalysisError;
use crate::models::{AnalysisResult, ExtractionResult, ProgressEvent, ScrapeRequest};
use crate::stream::decode_stream;
use crate::utils::truncate_for_log;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// Request timeout for the remote scraper, a little over the per-URL deadline.
const SCRAPER_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    topic: &'a str,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AnalysisClient {
    http: Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Run an analysis, forwarding each progress frame to `on_progress`.
    ///
    /// Resolves with the `result` payload, or fails with the `error` detail,
    /// a transport error, or [`AnalysisError::Incomplete`] when the stream
    /// closes without either.
    #[instrument(level = "info", skip(self, on_progress))]
    pub async fn analyze_stream<F>(&self, topic: &str, on_progress: F) -> Result<AnalysisResult, AnalysisError>
    where
        F: FnMut(&ProgressEvent),
    {
        let t0 = Instant::now();
        let response = self
            .http
            .post(self.endpoint("/api/analyze/stream"))
            .json(&AnalyzeRequest { topic })
            .send()
            .await?;
        let response = reject_unless_success(response).await?;

        let res = decode_stream(response.bytes_stream(), on_progress).await;
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        match &res {
            Ok(result) => info!(elapsed_ms, sources = result.sources_count, "Analysis stream completed"),
            Err(e) => error!(elapsed_ms, error = %e, "Analysis stream failed"),
        }
        res
    }

    /// Synchronous fallback: one request, no progress.
    #[instrument(level = "info", skip(self))]
    pub async fn analyze(&self, topic: &str) -> Result<AnalysisResult, AnalysisError> {
        let t0 = Instant::now();
        let response = self
            .http
            .post(self.endpoint("/api/analyze"))
            .json(&AnalyzeRequest { topic })
            .send()
            .await?;
        let response = reject_unless_success(response).await?;
        let result = response.json::<AnalysisResult>().await?;
        info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Analysis completed");
        Ok(result)
    }
}

/// Turn a non-2xx response into [`AnalysisError::Rejected`].
async fn reject_unless_success(response: Response) -> Result<Response, AnalysisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { detail: serde_json::Value::String(s) }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => status.canonical_reason().unwrap_or("request failed").to_string(),
        Err(_) => truncate_for_log(&body, 300),
    };
    warn!(status = status.as_u16(), %detail, "Analysis service rejected request");
    Err(AnalysisError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

/// Client for a remote extraction service.
#[derive(Debug, Clone)]
pub struct ScraperClient {
    http: Client,
    endpoint: String,
}

impl ScraperClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(SCRAPER_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/scrape", base_url.trim_end_matches('/')),
        })
    }

    #[instrument(level = "info", skip_all, fields(count = urls.len()))]
    pub async fn fetch_articles(&self, urls: &[String]) -> Result<Vec<ExtractionResult>, reqwest::Error> {
        let t0 = Instant::now();
        let request = ScrapeRequest { urls: urls.to_vec() };
        let results = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<ExtractionResult>>()
            .await?;
        info!(
            count = results.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched articles from remote scraper"
        );
        Ok(results)
    }
}
