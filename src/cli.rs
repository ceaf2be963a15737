//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most options can be provided via command-line flags or environment
//! variables, and fall back to the YAML file given with `--config`.

use crate::config::Settings;
use crate::error::ConfigError;
use clap::{Args, Parser, Subcommand};

/// Command-line arguments for parallax_news.
///
/// # Examples
///
/// ```sh
/// # Run the extraction service on port 8080
/// parallax_news serve --port 8080
///
/// # Extract a few pages locally and print the results
/// parallax_news scrape https://example.com/a https://example.com/b
///
/// # Run a streaming analysis and save the result
/// parallax_news analyze "trade tariffs" --output-dir ./analyses
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, env = "PARALLAX_CONFIG", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the extraction service (POST /scrape)
    Serve {
        /// Listening port
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        #[command(flatten)]
        pool: PoolArgs,
    },

    /// Extract articles from URLs and print them as JSON
    Scrape {
        /// URLs to extract
        urls: Vec<String>,

        /// Send the URLs to a running extraction service instead of fetching locally
        #[arg(long)]
        remote: bool,

        /// Base URL of the extraction service used with `--remote`
        #[arg(long, env = "SCRAPER_URL")]
        scraper_url: Option<String>,

        #[command(flatten)]
        pool: PoolArgs,
    },

    /// Analyze a topic through the analysis service, showing live progress
    Analyze {
        /// Topic to analyze
        topic: String,

        /// Base URL of the analysis service
        #[arg(long, env = "ANALYSIS_API_URL")]
        api_url: Option<String>,

        /// Use the synchronous endpoint instead of the progress stream
        #[arg(long)]
        no_stream: bool,

        /// Directory to write the result JSON into
        #[arg(short, long)]
        output_dir: Option<String>,
    },
}

/// Extraction pool overrides shared by `serve` and `scrape`.
#[derive(Args, Debug, Default)]
pub struct PoolArgs {
    /// Per-URL deadline in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Maximum number of URLs fetched at once
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

impl Cli {
    /// Settings from the config file (or defaults) with flag overrides applied.
    pub fn resolve_settings(&self) -> Result<Settings, ConfigError> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };

        match &self.command {
            Command::Serve { port, pool } => {
                if let Some(port) = port {
                    settings.port = *port;
                }
                pool.apply(&mut settings);
            }
            Command::Scrape { scraper_url, pool, .. } => {
                if let Some(url) = scraper_url {
                    settings.scraper_url = url.clone();
                }
                pool.apply(&mut settings);
            }
            Command::Analyze { api_url, output_dir, .. } => {
                if let Some(url) = api_url {
                    settings.analysis_api_url = url.clone();
                }
                if output_dir.is_some() {
                    settings.output_dir = output_dir.clone();
                }
            }
        }
        Ok(settings)
    }
}

impl PoolArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(secs) = self.timeout_secs {
            settings.per_url_timeout_secs = secs;
        }
        if let Some(n) = self.max_concurrency {
            settings.max_concurrency = n;
        }
    }
}
