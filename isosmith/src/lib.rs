//! Isosmith - custom Debian/Ubuntu installer images from archive mirrors
//!
//! This library provides the fetch layer of an installer-image builder: it
//! resolves trusted checksums from archive indices, downloads and caches
//! files from a mirror, verifies every byte before handing it out, and parses
//! package stanzas into structured metadata.
//!
//! # Modules
//!
//! - [`remote`]: verified, cached, retried fetching of mirror content
//! - [`package`]: `Packages` stanza parsing and `.deb` download
//! - [`config`]: build and fetch settings, working directory
//! - [`logging`]: tracing subscriber setup
//! - [`error`]: fetch error types
//!
//! # Example
//!
//! ```ignore
//! use isosmith::config::Config;
//! use isosmith::package::Package;
//! use isosmith::remote::Fetcher;
//!
//! let config = Config::load("isosmith.ini")?;
//! let fetcher = Fetcher::new(&config.fetch)?;
//!
//! for coordinate in config.build.archive_coordinates()? {
//!     let index = fetcher.component_file(&coordinate, &["Packages.gz"])?;
//!     let mut stanza = String::new();
//!     for line in index.gunzipped().each_line()? {
//!         let line = line?;
//!         if line.is_empty() {
//!             let package = Package::parse(coordinate.mirror(), coordinate.codename(),
//!                                          coordinate.component(), stanza.as_str());
//!             // ... select packages ...
//!             stanza.clear();
//!         } else {
//!             stanza.push_str(&line);
//!             stanza.push('\n');
//!         }
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod package;
pub mod remote;

pub use error::{FetchError, FetchResult, VerificationError};
