use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default response body limit.
pub const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving raw feed bytes.
///
/// Kept separate from parse errors: a fetch that fails never reaches the
/// parser, and an empty body is a failure rather than an empty feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Successful status but nothing in the body
    #[error("Empty response body")]
    EmptyBody,
}

/// Retrieves raw feed bytes for a URL.
///
/// One attempt per call. Retry policy, if any, belongs to the caller.
pub trait Connector {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// [`Connector`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    timeout: Duration,
    max_size: usize,
}

impl HttpConnector {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            max_size: MAX_FEED_SIZE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

impl Connector for HttpConnector {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        // One deadline for the whole exchange: a server trickling headers and
        // then the body must not get the timeout twice
        let deadline = tokio::time::Instant::now() + self.timeout;

        let response = tokio::time::timeout_at(deadline, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = %status, "Feed request rejected");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = tokio::time::timeout_at(deadline, read_limited_bytes(response, self.max_size))
            .await
            .map_err(|_| FetchError::Timeout)??;

        if bytes.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        tracing::debug!(url = %url, bytes = bytes.len(), "Feed fetched");
        Ok(bytes)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: Received fewer bytes than Content-Length (connection dropped
    // mid-body). Surfaced as its own error; retrying is the caller's call.
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
