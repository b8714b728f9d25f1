//! HTTP client abstraction for testability

use std::io::Read;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// An open response whose body has not been read yet.
pub struct HttpResponse {
    /// Size announced by the server, if any.
    pub content_length: Option<u64>,
    /// Response body, read incrementally.
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// Returns once the status line and headers are in; the body is streamed
    /// by the caller. Non-success statuses are errors.
    fn get(&self, url: &str) -> FetchResult<HttpResponse>;
}

/// Real HTTP client implementation using reqwest.
///
/// Responses are handed over undecoded: gzip-compressed indices stay
/// compressed so their checksums can be verified against the archive.
#[derive(Debug)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the default timeout.
    pub fn new() -> FetchResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new ReqwestClient with custom timeout.
    ///
    /// The timeout bounds establishing the connection only. Once the server
    /// has answered, the body may take as long as it needs, so large images
    /// on slow mirrors are not cut off part way through.
    pub fn with_timeout(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Configured connect timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> FetchResult<HttpResponse> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        // Check HTTP status
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(HttpResponse {
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}
