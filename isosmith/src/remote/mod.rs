//! Verified, cached fetching of remote archive content.
//!
//! This module provides everything needed to pull files from a Debian-style
//! mirror without ever handing unverified bytes to a caller:
//! - Chunked stream copying with truncate/rewind discipline (`stream`)
//! - Presence and checksum verification (`verifier`)
//! - A persistent, URI-keyed disk cache (`cache`)
//! - A pluggable HTTP transport (`http`) and progress reporting (`progress`)
//! - The cache/verify/fetch/retry engine (`resource`, `fetcher`)
//! - Transparent gzip decoding of compressed indices (`gunzip`)
//! - Checksum lookup in `Release` and `MD5SUMS` indices (`index`)
//!
//! # Architecture
//!
//! ```text
//! Fetcher ──────────────┬── PersistentCache ── CacheEntry (PopulatableStream)
//!   │                   ├── HttpClient (trait)
//!   │                   │       └── ReqwestClient
//!   │                   └── ProgressReporter (trait)
//!   │
//!   ├── release_file / component_file / installer_file / package_file
//!   │
//!   └──► RemoteResource ── Verifier
//!             │
//!             └── Gunzipped
//! ```
//!
//! # Example
//!
//! ```ignore
//! use isosmith::config::FetchConfig;
//! use isosmith::remote::{ArchiveCoordinate, Fetcher};
//!
//! let fetcher = Fetcher::new(&FetchConfig::default())?;
//! let main = ArchiveCoordinate::new("http://archive.ubuntu.com/ubuntu", "jaunty", "main", "i386");
//!
//! for line in fetcher.component_file(&main, &["Packages.gz"])?.gunzipped().each_line()? {
//!     println!("{}", line?);
//! }
//! ```

mod cache;
mod fetcher;
mod gunzip;
mod http;
mod index;
mod progress;
mod resource;
mod stream;
mod verifier;

pub use cache::{CacheEntry, PersistentCache, PopulatableStream};
pub use fetcher::Fetcher;
pub use gunzip::Gunzipped;
pub use http::{HttpClient, HttpResponse, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use index::{
    component_uri, find_md5sums_checksum, find_release_checksum, installer_uri, release_uri,
    ArchiveCoordinate,
};
pub use progress::{ProgressReporter, SilentProgress, TerminalProgress};
pub use resource::{Lines, RemoteResource};
pub use stream::{copy, CopyTarget, DigestKind, DigestSink, CHUNK_SIZE};
pub use verifier::Verifier;

#[cfg(test)]
pub use http::tests::{MockHttpClient, MockReply};
