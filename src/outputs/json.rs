//! JSON output of finished analyses.
//!
//! # Output Structure
//!
//! Files are organized by local date and named after the topic:
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     ├── trade-tariffs.json
//!     └── housing-policy.json
//! ```
//!
//! A second run for the same topic on the same day overwrites the first.

use crate::models::AnalysisResult;
use crate::utils::slugify_title;
use chrono::{Local, NaiveDate};
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the file an analysis of `topic` on `date` is written to.
pub fn analysis_path(output_dir: &str, date: NaiveDate, topic: &str) -> PathBuf {
    let slug = slugify_title(topic);
    let name = if slug.is_empty() { "untitled".to_string() } else { slug };
    Path::new(output_dir)
        .join(date.to_string())
        .join(format!("{name}.json"))
}

/// Write `result` as pretty-printed JSON under today's date directory.
///
/// # Returns
///
/// The path written, or an error if directory creation or writing fails.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_analysis(result: &AnalysisResult, output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(result)?;
    let path = analysis_path(output_dir, Local::now().date_naive(), &result.topic);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote analysis JSON");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_path() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
        assert_eq!(
            analysis_path("/out", date, "Trade Tariffs!"),
            PathBuf::from("/out/2025-05-06/trade-tariffs.json")
        );
        assert_eq!(
            analysis_path("/out", date, "  "),
            PathBuf::from("/out/2025-05-06/untitled.json")
        );
    }

    #[tokio::test]
    async fn test_write_analysis_round_trips() {
        let dir = std::env::temp_dir().join(format!("parallax-json-{}", std::process::id()));
        let result = AnalysisResult {
            success: true,
            topic: "Housing policy".into(),
            sources_count: 3,
            ..AnalysisResult::default()
        };

        let path = write_analysis(&result, &dir.to_string_lossy()).await.unwrap();
        assert!(path.ends_with("housing-policy.json"));
        let written: AnalysisResult = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, result);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
