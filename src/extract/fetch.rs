//! Fetching and classifying a single URL.
//!
//! [`scrape_url`] never fails: every outcome, including timeouts, is folded
//! into an [`ExtractionResult`] so the pool can aggregate without special
//! cases.

use super::readability;
use crate::models::{ExtractionResult, ExtractionStatus};
use crate::utils::truncate_for_log;
use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

/// Content types handed to the extractor. Anything else is a parse error.
const TEXTUAL_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml", "text/plain", "application/xml", "text/xml"];

/// Per-URL bounds on time and memory.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    /// Covers connect, response and body.
    pub deadline: Duration,
    pub max_body_bytes: u64,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(15),
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Parse `raw` as an absolute http(s) URL.
pub fn parse_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err("missing host".to_string()),
        other => Err(format!("unsupported scheme {other:?}")),
    }
}

enum FetchFailure {
    Transport(String),
    Status(u16),
    Content(String),
}

/// Fetch `raw_url` within `limits` and extract its article text.
///
/// Classification, in order: invalid URL (no request made), transport
/// failure or timeout, HTTP status >= 400, unparsable or oversized body,
/// success.
#[instrument(level = "debug", skip_all, fields(url = %raw_url))]
pub async fn scrape_url(client: &Client, raw_url: &str, limits: FetchLimits) -> ExtractionResult {
    let url = match parse_http_url(raw_url) {
        Ok(url) => url,
        Err(e) => {
            debug!(error = %e, "Rejected invalid URL");
            return ExtractionResult::failure(raw_url, ExtractionStatus::InvalidUrl, format!("invalid URL: {e}"));
        }
    };

    let t0 = Instant::now();
    let deadline = limits.deadline;
    let body = match tokio::time::timeout(deadline, fetch_body(client, url, limits.max_body_bytes)).await {
        Err(_) => {
            warn!(?deadline, "Fetch exceeded deadline");
            return ExtractionResult::failure(
                raw_url,
                ExtractionStatus::TransportError,
                format!("timed out after {}s", deadline.as_secs_f64()),
            );
        }
        Ok(Err(FetchFailure::Transport(e))) => {
            warn!(error = %e, "Fetch failed");
            return ExtractionResult::failure(raw_url, ExtractionStatus::TransportError, e);
        }
        Ok(Err(FetchFailure::Status(code))) => {
            debug!(code, "Upstream returned error status");
            return ExtractionResult::failure(raw_url, ExtractionStatus::HttpError(code), format!("HTTP error: {code}"));
        }
        Ok(Err(FetchFailure::Content(e))) => {
            debug!(error = %e, "Unsupported response content");
            return ExtractionResult::failure(raw_url, ExtractionStatus::ParseError, e);
        }
        Ok(Ok(body)) => body,
    };

    // HTML parsing is CPU bound; keep it off the I/O workers
    let bytes = body.len();
    match tokio::task::spawn_blocking(move || readability::extract(&body)).await {
        Ok(Ok(article)) => {
            debug!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                bytes,
                content_chars = article.content.len(),
                title = %truncate_for_log(&article.title, 80),
                "Extracted article"
            );
            ExtractionResult::success(raw_url, article.title, article.content)
        }
        Ok(Err(e)) => ExtractionResult::failure(raw_url, ExtractionStatus::ParseError, format!("error parsing content: {e}")),
        Err(e) => {
            warn!(error = %e, "Extraction task failed");
            ExtractionResult::failure(raw_url, ExtractionStatus::ParseError, format!("error parsing content: {e}"))
        }
    }
}

async fn fetch_body(client: &Client, url: Url, max_body_bytes: u64) -> Result<String, FetchFailure> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchFailure::Transport(format!("error executing request: {e}")))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(FetchFailure::Status(status.as_u16()));
    }

    if let Some(len) = response.content_length() {
        if len > max_body_bytes {
            return Err(FetchFailure::Content(format!(
                "response too large: {len} bytes exceeds {max_body_bytes}"
            )));
        }
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Some(ct) = content_type.as_deref() {
        let mime = ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase();
        if !TEXTUAL_CONTENT_TYPES.contains(&mime.as_str()) {
            return Err(FetchFailure::Content(format!("unsupported content type {mime}")));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = std::pin::pin!(response.bytes_stream());
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchFailure::Transport(format!("error reading body: {e}")))?;
        if (bytes.len() + chunk.len()) as u64 > max_body_bytes {
            return Err(FetchFailure::Content(format!(
                "response too large: exceeds {max_body_bytes} bytes"
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(decode_body(&bytes, content_type.as_deref()))
}

/// Decode `bytes` using, in order, a byte-order mark, the Content-Type
/// charset, then UTF-8. Invalid sequences become U+FFFD.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| content_type.and_then(charset_label).and_then(|l| Encoding::for_label(l.as_bytes())))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Client {
        Client::builder().build().unwrap()
    }

    fn limits(deadline: Duration) -> FetchLimits {
        FetchLimits {
            deadline,
            ..FetchLimits::default()
        }
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://ok.example/a").is_ok());
        assert!(parse_http_url("not a url").is_err());
        assert!(parse_http_url("ftp://files.example/x").is_err());
        assert!(parse_http_url("").is_err());
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_request() {
        let server = MockServer::start().await;
        let result = scrape_url(&client(), "not a url", limits(Duration::from_secs(1))).await;
        assert_eq!(result.status, ExtractionStatus::InvalidUrl);
        assert_eq!(result.url, "not a url");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_extracts_article() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><head><title>Hello</title></head><body><p>World news.</p></body></html>",
                "text/html; charset=utf-8",
            ))
            .mount(&server)
            .await;

        let url = format!("{}/a", server.uri());
        let result = scrape_url(&client(), &url, limits(Duration::from_secs(5))).await;
        assert_eq!(result.status, ExtractionStatus::Success);
        assert_eq!(result.title, "Hello");
        assert_eq!(result.content, "World news.");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let result = scrape_url(&client(), &url, limits(Duration::from_secs(5))).await;
        assert_eq!(result.status, ExtractionStatus::HttpError(404));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<p>late</p>", "text/html")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let url = format!("{}/slow", server.uri());
        let result = scrape_url(&client(), &url, limits(Duration::from_millis(200))).await;
        assert_eq!(result.status, ExtractionStatus::TransportError);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = format!("http://127.0.0.1:{port}/");
        let result = scrape_url(&client(), &url, limits(Duration::from_secs(5))).await;
        assert_eq!(result.status, ExtractionStatus::TransportError);
    }

    #[tokio::test]
    async fn test_empty_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/html"))
            .mount(&server)
            .await;

        let url = format!("{}/empty", server.uri());
        let result = scrape_url(&client(), &url, limits(Duration::from_secs(5))).await;
        assert_eq!(result.status, ExtractionStatus::ParseError);
    }

    #[tokio::test]
    async fn test_binary_content_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/image"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89u8, 0x50, 0x4e, 0x47], "image/png"))
            .mount(&server)
            .await;

        let url = format!("{}/image", server.uri());
        let result = scrape_url(&client(), &url, limits(Duration::from_secs(5))).await;
        assert_eq!(result.status, ExtractionStatus::ParseError);
    }

    #[tokio::test]
    async fn test_oversized_body_is_parse_error() {
        let server = MockServer::start().await;
        let page = format!("<html><body><p>{}</p></body></html>", "x".repeat(4096));
        Mock::given(method("GET"))
            .and(path("/huge"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html"))
            .mount(&server)
            .await;

        let url = format!("{}/huge", server.uri());
        let limits = FetchLimits {
            deadline: Duration::from_secs(5),
            max_body_bytes: 1024,
        };
        let result = scrape_url(&client(), &url, limits).await;
        assert_eq!(result.status, ExtractionStatus::ParseError);
        assert!(result.error.unwrap().contains("too large"));
    }

    #[tokio::test]
    async fn test_declared_charset_is_decoded() {
        let server = MockServer::start().await;
        // "Café" in ISO-8859-1
        let body = b"<html><body><p>Caf\xe9 society</p></body></html>".to_vec();
        Mock::given(method("GET"))
            .and(path("/latin1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=ISO-8859-1"))
            .mount(&server)
            .await;

        let url = format!("{}/latin1", server.uri());
        let result = scrape_url(&client(), &url, limits(Duration::from_secs(5))).await;
        assert_eq!(result.status, ExtractionStatus::Success);
        assert_eq!(result.content, "Café society");
    }

    #[test]
    fn test_decode_body_fallbacks() {
        assert_eq!(decode_body("héllo".as_bytes(), None), "héllo");
        assert_eq!(decode_body(b"\xef\xbb\xbfbom", Some("text/html; charset=latin1")), "bom");
        assert_eq!(decode_body(b"caf\xe9", Some(r#"text/html; Charset="windows-1252""#)), "café");
        assert_eq!(charset_label("text/html"), None);
    }
}
