//! `parallax_news` binary.
//!
//! ```sh
//! parallax_news serve
//! parallax_news scrape https://example.com/story
//! parallax_news analyze "trade tariffs"
//! ```

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use parallax_news::api::{AnalysisClient, ScraperClient};
use parallax_news::cli::{Cli, Command};
use parallax_news::config::Settings;
use parallax_news::extract::{ExtractionPool, PoolSettings};
use parallax_news::models::AnalysisResult;
use parallax_news::outputs::json;
use parallax_news::progress::{ProgressRun, ProgressSnapshot, RunState};
use parallax_news::server::{AppState, build_app};
use parallax_news::utils::ensure_writable_dir;
use std::error::Error;
use std::io::IsTerminal;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");
    let settings = args.resolve_settings()?;

    let outcome = match args.command {
        Command::Serve { .. } => serve(&settings).await,
        Command::Scrape { urls, remote, .. } => scrape(&settings, urls, remote).await,
        Command::Analyze { topic, no_stream, .. } => analyze(&settings, &topic, no_stream).await,
    };

    let elapsed = start_time.elapsed();
    info!(?elapsed, "Execution complete");
    outcome
}

#[instrument(level = "info", skip_all, fields(port = settings.port))]
async fn serve(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let pool = Arc::new(ExtractionPool::new(PoolSettings::from(settings))?);
    let shutdown = CancellationToken::new();
    let app = build_app(AppState {
        pool: Arc::clone(&pool),
        shutdown: shutdown.clone(),
    });

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let limits = pool.settings();
    info!(
        %addr,
        max_concurrency = limits.max_concurrency,
        per_url_timeout = ?limits.per_url_timeout,
        max_body_bytes = limits.max_body_bytes,
        "Extraction service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested; cancelling in-flight batches");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}

#[instrument(level = "info", skip_all, fields(count = urls.len(), remote = remote))]
async fn scrape(settings: &Settings, urls: Vec<String>, remote: bool) -> Result<(), Box<dyn Error>> {
    let results = if remote {
        ScraperClient::new(&settings.scraper_url)?.fetch_articles(&urls).await?
    } else {
        let pool = ExtractionPool::new(PoolSettings::from(settings))?;
        let cancel = CancellationToken::new();
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling batch");
                on_ctrl_c.cancel();
            }
        });
        pool.extract_with(urls, &cancel, |done, total| debug!(done, total, "Scrape progress"))
            .await
    };

    for r in results.iter().filter(|r| !r.status.is_success()) {
        warn!(url = %r.url, status = %r.status, error = r.error.as_deref().unwrap_or_default(), "Extraction failed");
    }
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

#[instrument(level = "info", skip(settings))]
async fn analyze(settings: &Settings, topic: &str, no_stream: bool) -> Result<(), Box<dyn Error>> {
    // Fail early rather than after a long analysis
    if let Some(dir) = &settings.output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable");
            return Err(e);
        }
    }

    let client = AnalysisClient::new(settings.analysis_api_url.clone());
    let result = if no_stream {
        info!("Using synchronous analysis endpoint");
        client.analyze(topic).await?
    } else {
        let (mut run, rx) = ProgressRun::new(settings.smoothing_duration());
        let renderer = render_progress(rx);
        let outcome = client.analyze_stream(topic, |event| run.on_progress(event)).await;
        match &outcome {
            Ok(_) => run.complete(),
            Err(e) => run.fail(e.to_string()),
        }
        drop(run);
        let _ = renderer.await;
        outcome?
    };

    print_summary(&result);

    if let Some(dir) = &settings.output_dir {
        let path = json::write_analysis(&result, dir).await?;
        info!(path = %path.display(), "Saved analysis");
    }
    Ok(())
}

/// Draw the run's displayed progress until it ends. Hidden when stderr is not a terminal.
fn render_progress(mut rx: watch::Receiver<ProgressSnapshot>) -> JoinHandle<()> {
    let bar = if std::io::stderr().is_terminal() {
        ProgressBar::new(100)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} {bar:40.cyan/dim} {pos:>3}% {wide_msg:.dim}")
            .expect("invalid template")
            .progress_chars("=> "),
    );

    tokio::spawn(async move {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            bar.set_position(snapshot.displayed.round() as u64);
            if let Some(message) = &snapshot.message {
                bar.set_message(message.clone());
            }
            match snapshot.state {
                RunState::Complete => {
                    bar.finish_with_message("Done");
                    break;
                }
                RunState::Failed(detail) => {
                    bar.abandon_with_message(detail);
                    break;
                }
                _ => {}
            }
            if rx.changed().await.is_err() {
                bar.abandon();
                break;
            }
        }
    })
}

fn print_summary(result: &AnalysisResult) {
    let counts = &result.bias_counts;
    println!("Topic: {}", result.topic);
    println!(
        "Sources: {} (Left {}, Center {}, Right {})",
        result.sources_count, counts.left, counts.center, counts.right
    );
    if counts.total() < result.sources_count {
        println!("{} of them unclassified", result.sources_count - counts.total());
    }
    if !result.narratives.left.is_empty() {
        println!("\nLeft narrative:\n{}", result.narratives.left);
    }
    if !result.narratives.right.is_empty() {
        println!("\nRight narrative:\n{}", result.narratives.right);
    }
    if !result.omission_report.is_empty() {
        println!("\nOmissions:\n{}", result.omission_report);
    }
}
