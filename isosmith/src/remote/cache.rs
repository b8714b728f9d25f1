//! Disk-backed, URI-keyed byte store that persists across runs.
//!
//! Entries live at `<root>/<host><path>`, so two processes fetching the same
//! URI address the same file. Nothing here deletes an entry; stale or corrupt
//! content is overwritten the next time a fetch verifies fresh bytes.
//!
//! There is no inter-process locking. Two concurrent runs populating the same
//! entry can interleave their writes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use reqwest::Url;

use super::stream;
use crate::error::{FetchError, FetchResult};

/// A readable stream whose content can be replaced wholesale.
pub trait PopulatableStream: Read + Seek {
    /// Overwrite this stream's content with everything in `source`.
    ///
    /// Both streams are left at their start.
    fn populate<R>(&mut self, source: &mut R) -> io::Result<()>
    where
        R: Read + Seek + ?Sized;
}

/// Persistent cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct PersistentCache {
    root: PathBuf,
}

impl PersistentCache {
    /// Create a cache rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path backing the entry for `uri`.
    ///
    /// The host and path are appended to the root without escaping. A URI
    /// without a host (`file:///...`) maps straight under the root.
    pub fn entry_path(&self, uri: &Url) -> PathBuf {
        let mut path = self.root.clone();
        if let Some(host) = uri.host_str() {
            path.push(host);
        }
        let relative = uri.path().trim_start_matches('/');
        if !relative.is_empty() {
            path.push(relative);
        }
        path
    }

    /// Open the entry for `uri` read-write, creating it empty if absent.
    ///
    /// The file handle is released when the returned entry is dropped.
    pub fn open(&self, uri: &Url) -> FetchResult<CacheEntry> {
        let path = self.entry_path(uri);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| FetchError::ReadFailed {
                path: path.clone(),
                source: e,
            })?;

        Ok(CacheEntry { path, file })
    }
}

/// An open cache entry.
#[derive(Debug)]
pub struct CacheEntry {
    path: PathBuf,
    file: File,
}

impl CacheEntry {
    /// Local path of this entry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the entry in bytes.
    pub fn len(&self) -> FetchResult<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| FetchError::ReadFailed {
                path: self.path.clone(),
                source: e,
            })
    }

    /// Whether the entry holds no bytes yet.
    pub fn is_empty(&self) -> FetchResult<bool> {
        self.len().map(|len| len == 0)
    }

    /// Reposition at the start of the entry.
    pub fn rewind(&mut self) -> FetchResult<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| FetchError::ReadFailed {
                path: self.path.clone(),
                source: e,
            })
    }
}

impl Read for CacheEntry {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for CacheEntry {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl PopulatableStream for CacheEntry {
    fn populate<R>(&mut self, source: &mut R) -> io::Result<()>
    where
        R: Read + Seek + ?Sized,
    {
        stream::copy(source, &mut self.file)
    }
}
