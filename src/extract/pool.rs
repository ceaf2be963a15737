//! Concurrent extraction of a batch of URLs.
//!
//! One task is spawned per URL. Tasks are admitted through a semaphore so at
//! most `max_concurrency` fetches run at once, and each reports exactly once
//! on a channel sized to the batch. [`ExtractionPool::extract_with`] returns
//! only after every task has reported.

use super::fetch::{FetchLimits, scrape_url};
use crate::config::Settings;
use crate::error::ExtractError;
use crate::models::{ExtractionResult, ExtractionStatus};
use itertools::Itertools;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Deadline for each URL, covering connect, response and body.
    pub per_url_timeout: Duration,
    /// Upper bound on concurrently running fetches.
    pub max_concurrency: usize,
    /// Bodies larger than this are parse errors.
    pub max_body_bytes: u64,
    pub user_agent: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings::from(&Settings::default())
    }
}

impl From<&Settings> for PoolSettings {
    fn from(s: &Settings) -> Self {
        Self {
            per_url_timeout: s.per_url_timeout(),
            max_concurrency: s.max_concurrency,
            max_body_bytes: s.max_body_bytes,
            user_agent: s.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionPool {
    client: Client,
    settings: PoolSettings,
}

impl ExtractionPool {
    pub fn new(settings: PoolSettings) -> Result<Self, ExtractError> {
        let client = Client::builder().user_agent(settings.user_agent.clone()).build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Extract every URL. Returns one result per input, in input order.
    pub async fn extract(&self, urls: Vec<String>) -> Vec<ExtractionResult> {
        self.extract_with(urls, &CancellationToken::new(), |_, _| {}).await
    }

    /// Extract every URL, reporting `(completed, total)` after each one finishes.
    ///
    /// Cancelling `cancel` resolves queued and in-flight URLs as transport
    /// errors; the returned vector still holds one result per input.
    #[instrument(level = "info", skip_all, fields(total = urls.len()))]
    pub async fn extract_with<F>(
        &self,
        urls: Vec<String>,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Vec<ExtractionResult>
    where
        F: FnMut(usize, usize),
    {
        let total = urls.len();
        if total == 0 {
            return Vec::new();
        }

        let t0 = Instant::now();
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<(usize, ExtractionResult)>(total);

        for (index, url) in urls.iter().cloned().enumerate() {
            let tx = tx.clone();
            let client = self.client.clone();
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            let limits = FetchLimits {
                deadline: self.settings.per_url_timeout,
                max_body_bytes: self.settings.max_body_bytes,
            };

            tokio::spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => cancelled(&url),
                    result = async {
                        match permits.acquire_owned().await {
                            Ok(_permit) => scrape_url(&client, &url, limits).await,
                            Err(_) => cancelled(&url),
                        }
                    } => result,
                };
                // Capacity equals the batch size, so this never waits
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<ExtractionResult>> = vec![None; total];
        let mut completed = 0;
        while let Some((index, result)) = rx.recv().await {
            debug!(url = %result.url, status = %result.status, "URL finished");
            slots[index] = Some(result);
            completed += 1;
            on_progress(completed, total);
        }

        // A slot is empty only if its task panicked before reporting
        let results = slots
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| {
                    warn!(%url, "Extraction task aborted without a result");
                    ExtractionResult::failure(url, ExtractionStatus::TransportError, "extraction task aborted")
                })
            })
            .collect::<Vec<_>>();

        let counts = results.iter().counts_by(|r| r.status.to_string());
        info!(
            total,
            succeeded = results.iter().filter(|r| r.status.is_success()).count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            ?counts,
            "Batch extraction complete"
        );
        results
    }
}

fn cancelled(url: &str) -> ExtractionResult {
    ExtractionResult::failure(url, ExtractionStatus::TransportError, "cancelled")
}
