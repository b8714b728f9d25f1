//! Remote resources: cache first, verify always, fetch and retry on failure.
//!
//! Opening a resource's stream runs this protocol:
//!
//! ```text
//! open cache entry
//!   │
//!   ├─► verify entry ── ok ──► hand entry to caller (no network)
//!   │        │
//!   │      fails
//!   │        ▼
//!   │   GET uri ─► spool body ─► verify spool ── ok ──► populate entry ─► hand entry to caller
//!   │        │                        │
//!   │   network error           verification error
//!   │        └──────────┬─────────────┘
//!   │                   ▼
//!   └──── attempts left? ── no ──► propagate the last error
//! ```
//!
//! Unverified bytes are only ever written to an anonymous spool file, never
//! to the cache entry, so a caller cannot observe partial or corrupt content.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::{debug, info, warn};

use super::cache::{CacheEntry, PopulatableStream};
use super::fetcher::Fetcher;
use super::gunzip::Gunzipped;
use super::stream::{self, CHUNK_SIZE};
use super::verifier::Verifier;
use crate::error::{FetchError, FetchResult};

/// A URI paired with the verifier its content must pass.
#[derive(Clone)]
pub struct RemoteResource {
    fetcher: Fetcher,
    uri: Url,
    verifier: Verifier,
}

impl fmt::Debug for RemoteResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResource")
            .field("uri", &self.uri.as_str())
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl RemoteResource {
    pub(crate) fn new(fetcher: Fetcher, uri: Url, verifier: Verifier) -> Self {
        Self {
            fetcher,
            uri,
            verifier,
        }
    }

    /// Location of the resource.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Verifier guarding the resource's content.
    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Local file that caches this resource.
    pub fn cache_path(&self) -> PathBuf {
        self.fetcher.cache().entry_path(&self.uri)
    }

    /// Copy the verified content to `destination`, creating parent directories.
    pub fn copy_to(&self, destination: impl AsRef<Path>) -> FetchResult<()> {
        let destination = destination.as_ref();
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut entry = self.open_stream()?;
        let mut file = File::create(destination).map_err(|e| FetchError::WriteFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;

        stream::copy(&mut entry, &mut file).map_err(|e| FetchError::WriteFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;

        debug!(url = %self.uri, dest = %destination.display(), "copied resource");
        Ok(())
    }

    /// Lines of the verified content, without line terminators.
    ///
    /// The stream is opened (and fetched, if needed) here; iterating is lazy.
    /// Calling this again starts over from the first line.
    pub fn each_line(&self) -> FetchResult<Lines> {
        let entry = self.open_stream()?;
        let path = entry.path().to_path_buf();
        Ok(Lines::new(
            BufReader::new(entry),
            LineSource::Plain { path },
        ))
    }

    /// Read the whole verified content as UTF-8 text.
    pub fn read_to_string(&self) -> FetchResult<String> {
        let mut entry = self.open_stream()?;
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| FetchError::ReadFailed {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
        Ok(text)
    }

    /// View of this resource that decompresses gzip content line by line.
    pub fn gunzipped(&self) -> Gunzipped {
        Gunzipped::new(self.clone())
    }

    /// Open the cache entry once its content has passed verification.
    ///
    /// The entry is positioned at the start.
    pub(crate) fn open_stream(&self) -> FetchResult<CacheEntry> {
        let mut entry = self.fetcher.cache().open(&self.uri)?;
        let mut remaining = self.fetcher.attempts();

        loop {
            match self.verifier.verify(&mut entry) {
                Ok(()) => {
                    debug!(url = %self.uri, "cache hit");
                    return Ok(entry);
                }
                Err(e) => {
                    debug!(url = %self.uri, reason = %e, "cache entry unusable");
                    entry.rewind()?;
                }
            }

            match self.fetch_into(&mut entry) {
                Ok(()) => return Ok(entry),
                Err(e) if e.is_transient() => {
                    remaining -= 1;
                    if remaining == 0 {
                        warn!(url = %self.uri, error = %e, "giving up");
                        return Err(e);
                    }
                    warn!(
                        url = %self.uri,
                        error = %e,
                        remaining,
                        "Trying again... ({} more)",
                        remaining
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Download, verify and store the resource in `entry`.
    fn fetch_into(&self, entry: &mut CacheEntry) -> FetchResult<()> {
        let url = self.uri.as_str();
        info!(url, "fetching");

        let progress = self.fetcher.progress();
        progress.start(url);
        let spooled = self.download(url);
        progress.finish();
        let mut spool = spooled?;

        self.verifier.verify(&mut spool)?;

        entry
            .populate(&mut spool)
            .map_err(|e| FetchError::WriteFailed {
                path: entry.path().to_path_buf(),
                source: e,
            })?;

        info!(url, path = %entry.path().display(), "cached");
        Ok(())
    }

    /// Stream the response body into an anonymous temporary file.
    fn download(&self, url: &str) -> FetchResult<File> {
        let progress = self.fetcher.progress();
        let response = self.fetcher.client().get(url)?;

        if let Some(total) = response.content_length {
            progress.total_size(total);
        }

        let mut spool = tempfile::tempfile()?;
        let mut body = response.body;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut received = 0u64;

        loop {
            let bytes_read = match body.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FetchError::transfer(url, e)),
            };

            spool.write_all(&buffer[..bytes_read])?;
            received += bytes_read as u64;
            progress.received(received);
        }

        spool.flush()?;
        spool.rewind()?;
        Ok(spool)
    }
}

/// Where a [`Lines`] iterator reads from, for error reporting.
#[derive(Debug)]
pub(crate) enum LineSource {
    /// Raw cache entry.
    Plain { path: PathBuf },
    /// Gzip stream decoded on the fly.
    Gzip { url: String },
}

/// Lazy iterator over the lines of a verified resource.
///
/// Yields an error, once, if the underlying read or decode fails; iteration
/// stops after that.
pub struct Lines {
    reader: Box<dyn BufRead + Send>,
    source: LineSource,
    failed: bool,
}

impl fmt::Debug for Lines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lines")
            .field("source", &self.source)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl Lines {
    pub(crate) fn new(reader: impl BufRead + Send + 'static, source: LineSource) -> Self {
        Self {
            reader: Box::new(reader),
            source,
            failed: false,
        }
    }

    fn error(&self, err: io::Error) -> FetchError {
        match &self.source {
            LineSource::Plain { path } => FetchError::ReadFailed {
                path: path.clone(),
                source: err,
            },
            LineSource::Gzip { url } => FetchError::Decompression {
                url: url.clone(),
                source: err,
            },
        }
    }
}

impl Iterator for Lines {
    type Item = FetchResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(Ok(line))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(self.error(e)))
            }
        }
    }
}
