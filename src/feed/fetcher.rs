use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_feed, ParsedFeed};

const MAX_RETRIES: u32 = 2;
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const BACKOFF_BASE_MS: u64 = 500;

/// Errors that can occur while retrieving a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The whole fetch, retries included, exceeded the timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Fetch and parse one feed.
///
/// `timeout` bounds the entire operation including backoff sleeps, so a
/// flapping server cannot hold a sync slot longer than configured.
/// 5xx and 429 responses are retried with exponential backoff, 4xx fail
/// immediately.
pub async fn fetch(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<ParsedFeed, FetchError> {
    let bytes = tokio::time::timeout(timeout, fetch_bytes(client, url))
        .await
        .map_err(|_| FetchError::Timeout(timeout.as_secs()))??;

    let now = chrono::Utc::now().timestamp();
    let parsed = parse_feed(&bytes, now).map_err(|e| FetchError::Parse(e.to_string()))?;

    if parsed.skipped > 0 {
        tracing::warn!(url = %url, skipped = parsed.skipped, "Items without a link skipped");
    }
    Ok(parsed)
}

async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let mut retry_count = 0;

    loop {
        let response = client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if retry_count >= MAX_RETRIES {
                return Err(if status.is_server_error() {
                    FetchError::HttpStatus(status.as_u16())
                } else {
                    FetchError::RateLimited(MAX_RETRIES)
                });
            }

            let delay = backoff(retry_count);
            tracing::warn!(
                url = %url,
                status = %status,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Retryable response, backing off"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        match read_limited_bytes(response, MAX_FEED_SIZE).await {
            Ok(bytes) => return Ok(bytes),
            Err(FetchError::IncompleteResponse { expected, received }) if retry_count < MAX_RETRIES => {
                tracing::debug!(url = %url, expected, received, "Retrying incomplete download");
                tokio::time::sleep(backoff(retry_count)).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff(retry: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(retry)) // 500ms, 1s
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
