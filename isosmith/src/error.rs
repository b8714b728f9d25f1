//! Error types for remote fetching and verification.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Content rejected by a [`Verifier`](crate::remote::Verifier).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The stream yielded no bytes at all.
    #[error("No content")]
    NoContent,

    /// The stream's digest differs from the expected one.
    #[error("digest mismatch: expected {expected} but was {actual}")]
    DigestMismatch { expected: String, actual: String },
}

/// Errors that can occur while fetching, caching or reading a remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Content failed verification.
    #[error("{0}")]
    Verification(#[from] VerificationError),

    /// The request could not be completed (DNS, connection reset, ...).
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// The transport gave up waiting.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// A checksum verifier was requested without an expected digest.
    #[error("no expected checksum given")]
    MissingChecksum,

    /// An archive index has no entry for the requested path.
    #[error("no checksum for {path} in {index}")]
    ChecksumNotFound { index: String, path: String },

    /// A package manifest lacks a field needed to locate its archive.
    #[error("package {package} has no {field} field")]
    MissingField { package: String, field: &'static str },

    /// A resource location could not be parsed.
    #[error("invalid URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Failed to read a local file.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a local file.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Compressed content could not be decoded.
    #[error("failed to decompress {url}: {source}")]
    Decompression { url: String, source: io::Error },

    /// I/O error on an in-flight stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Whether another attempt might succeed.
    ///
    /// Verification failures and network-level failures are transient; a
    /// missing checksum or an unparsable URI will fail the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Verification(_)
                | Self::Network { .. }
                | Self::HttpStatus { .. }
                | Self::Timeout { .. }
        )
    }

    /// Classify an I/O error raised while a response body was being read.
    pub(crate) fn transfer(url: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout {
                url: url.to_string(),
            },
            _ => Self::Network {
                url: url.to_string(),
                reason: err.to_string(),
            },
        }
    }
}
