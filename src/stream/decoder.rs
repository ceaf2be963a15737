//! Incremental decoding of the progress stream.
//!
//! Bytes are buffered until a newline arrives, so the decoded event sequence
//! is the same however the transport chunks the stream, including chunks
//! that split a multi-byte UTF-8 character. Lines that do not start with
//! `data: ` are ignored, and candidate lines that fail to parse are skipped.

use super::frame::DATA_PREFIX;
use crate::error::AnalysisError;
use crate::models::{AnalysisResult, ProgressEvent, StreamEvent};
use crate::utils::truncate_for_log;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use tracing::{debug, instrument, warn};

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<u8>>();
            events.extend(parse_line(&line[..pos]));
        }
        events
    }

    /// Flush an unterminated final line once the stream has closed.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn parse_line(line: &[u8]) -> Option<StreamEvent> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX.as_bytes())?;
    match serde_json::from_slice::<StreamEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(
                error = %e,
                frame = %truncate_for_log(&String::from_utf8_lossy(payload), 200),
                "Skipping malformed frame"
            );
            None
        }
    }
}

/// Terminal state accumulated while reading one run's stream.
#[derive(Debug, Default)]
pub struct RunOutcome {
    result: Option<AnalysisResult>,
    error: Option<String>,
}

impl RunOutcome {
    /// Record `event`, forwarding progress to `on_progress`.
    pub fn record<F>(&mut self, event: StreamEvent, on_progress: &mut F)
    where
        F: FnMut(&ProgressEvent),
    {
        match event {
            StreamEvent::Progress(progress) => on_progress(&progress),
            StreamEvent::Result { data } => self.result = Some(data),
            StreamEvent::Error { detail } => self.error = Some(detail),
        }
    }

    /// An error frame wins over a result frame; neither is a failure.
    pub fn finish(self) -> Result<AnalysisResult, AnalysisError> {
        match (self.error, self.result) {
            (Some(detail), _) => Err(AnalysisError::Terminal(detail)),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(AnalysisError::Incomplete),
        }
    }

    fn is_terminal(&self) -> bool {
        self.error.is_some() || self.result.is_some()
    }
}

/// Read `stream` to the end, dispatching progress and resolving the run.
///
/// A transport error ends reading early. If a terminal frame was already
/// seen it still decides the outcome; otherwise the run fails with
/// [`AnalysisError::Transport`].
#[instrument(level = "debug", skip_all)]
pub async fn decode_stream<S, B, E, F>(stream: S, mut on_progress: F) -> Result<AnalysisResult, AnalysisError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&ProgressEvent),
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = FrameDecoder::new();
    let mut outcome = RunOutcome::default();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                for event in decoder.feed(bytes.as_ref()) {
                    outcome.record(event, &mut on_progress);
                }
            }
            Err(e) => {
                warn!(error = %e, "Progress stream aborted");
                if !outcome.is_terminal() {
                    return Err(AnalysisError::Transport(e.to_string()));
                }
                break;
            }
        }
    }

    if let Some(event) = decoder.finish() {
        outcome.record(event, &mut on_progress);
    }
    outcome.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;
    use crate::stream::frame::encode;
    use bytes::Bytes;
    use futures::stream;
    use pretty_assertions::assert_eq;

    const SCRAPING: &str = r#"data: {"event":"progress","phase":"scraping","progress":40,"current":2,"total":5}"#;
    const RESULT: &str = r#"data: {"event":"result","data":{"success":true,"topic":"tariffs","sources_count":5}}"#;

    fn sample_stream() -> String {
        let events = vec![
            StreamEvent::Progress(ProgressEvent::new(Phase::Discovery, 5.0).with_message("Finding sources...")),
            StreamEvent::Progress(ProgressEvent::new(Phase::Scraping, 40.0).with_counts(2, 5)),
            StreamEvent::Progress(ProgressEvent::new(Phase::Analysis, 65.0).with_message("Synthesizing narratives… ✓")),
            StreamEvent::Result {
                data: AnalysisResult {
                    topic: "élection".into(),
                    ..AnalysisResult::default()
                },
            },
        ];
        events.iter().map(|e| encode(e).unwrap()).collect()
    }

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }

    #[test]
    fn test_whole_lines() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(format!("{SCRAPING}\n\n{RESULT}\n\n").as_bytes());
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            StreamEvent::Progress(ProgressEvent::new(Phase::Scraping, 40.0).with_counts(2, 5))
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_partial_line_is_retained() {
        let mut decoder = FrameDecoder::new();
        let (head, tail) = SCRAPING.split_at(20);
        assert!(decoder.feed(head.as_bytes()).is_empty());
        assert_eq!(decoder.pending(), 20);
        let events = decoder.feed(format!("{tail}\n").as_bytes());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let raw = sample_stream().into_bytes();
        let expected = FrameDecoder::new().feed(&raw);
        assert_eq!(expected.len(), 4);

        // Every split point, including inside multi-byte characters
        for split in 0..=raw.len() {
            let mut decoder = FrameDecoder::new();
            let mut events = decoder.feed(&raw[..split]);
            events.extend(decoder.feed(&raw[split..]));
            assert_eq!(events, expected, "split at byte {split}");
        }

        // Byte at a time
        let mut decoder = FrameDecoder::new();
        let events = raw.iter().flat_map(|b| decoder.feed(std::slice::from_ref(b))).collect::<Vec<_>>();
        assert_eq!(events, expected);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let mut decoder = FrameDecoder::new();
        let input = format!("{SCRAPING}\ndata: {{\"event\":\"progress\",\"phase\":\n{RESULT}\n");
        let events = decoder.feed(input.as_bytes());
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::Progress(_)));
        assert!(matches!(events[1], StreamEvent::Result { .. }));
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut decoder = FrameDecoder::new();
        let input = format!(": keep-alive\nevent: progress\nid: 7\n{SCRAPING}\r\n\r\n");
        let events = decoder.feed(input.as_bytes());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(RESULT.as_bytes()).is_empty());
        assert!(matches!(decoder.finish(), Some(StreamEvent::Result { .. })));
        assert!(decoder.finish().is_none());
    }

    #[tokio::test]
    async fn test_progress_then_result() {
        let body = format!("{SCRAPING}\n\n{RESULT}\n\n").into_bytes();
        let (a, b) = body.split_at(17);
        let mut seen = Vec::new();

        let result = decode_stream(chunks(vec![a.to_vec(), b.to_vec()]), |p| seen.push(p.clone()))
            .await
            .unwrap();

        assert_eq!(seen, vec![ProgressEvent::new(Phase::Scraping, 40.0).with_counts(2, 5)]);
        assert_eq!(result.topic, "tariffs");
        assert_eq!(result.sources_count, 5);
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_close_without_terminal_frame_fails() {
        let body = format!("{SCRAPING}\n\n").into_bytes();
        let err = decode_stream(chunks(vec![body]), |_| {}).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Incomplete));
        assert!(err.to_string().contains("analysis failed"));
    }

    #[tokio::test]
    async fn test_error_frame_wins_over_result() {
        let body = format!("{RESULT}\ndata: {{\"event\":\"error\",\"detail\":\"No relevant sources found\"}}\n").into_bytes();
        let err = decode_stream(chunks(vec![body]), |_| {}).await.unwrap_err();
        assert_eq!(err.to_string(), "No relevant sources found");
    }

    #[tokio::test]
    async fn test_reading_continues_after_result() {
        let body = format!("{RESULT}\n{SCRAPING}\n").into_bytes();
        let mut progress_calls = 0;
        decode_stream(chunks(vec![body]), |_| progress_calls += 1).await.unwrap();
        assert_eq!(progress_calls, 1);
    }

    #[tokio::test]
    async fn test_transport_error_before_terminal_frame() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(format!("{SCRAPING}\n"))),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let err = decode_stream(stream::iter(parts), |_| {}).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Transport(_)));
    }

    #[tokio::test]
    async fn test_transport_error_after_result_keeps_result() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(format!("{RESULT}\n"))),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let result = decode_stream(stream::iter(parts), |_| {}).await.unwrap();
        assert_eq!(result.topic, "tariffs");
    }
}
