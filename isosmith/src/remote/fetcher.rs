//! Shared fetch context: cache, transport, progress reporting and retry budget.

use std::fmt;
use std::sync::Arc;

use reqwest::Url;

use super::cache::PersistentCache;
use super::http::{HttpClient, ReqwestClient};
use super::progress::{ProgressReporter, TerminalProgress};
use super::resource::RemoteResource;
use super::verifier::Verifier;
use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult};

/// Everything a [`RemoteResource`] needs to open its stream.
///
/// Cloning is cheap; clones share the transport and progress reporter.
#[derive(Clone)]
pub struct Fetcher {
    cache: PersistentCache,
    client: Arc<dyn HttpClient>,
    progress: Arc<dyn ProgressReporter>,
    attempts: u32,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("cache", &self.cache)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Create a fetcher that downloads with reqwest and reports progress on
    /// the terminal.
    pub fn new(config: &FetchConfig) -> FetchResult<Self> {
        let client = ReqwestClient::with_timeout(config.timeout)?;
        Ok(Self::with_client(config, client))
    }

    /// Create a fetcher around a custom transport.
    pub fn with_client(config: &FetchConfig, client: impl HttpClient + 'static) -> Self {
        Self {
            cache: PersistentCache::new(config.cache_dir.clone()),
            client: Arc::new(client),
            progress: Arc::new(TerminalProgress::new()),
            attempts: config.attempts.max(1),
        }
    }

    /// Replace the progress reporter.
    pub fn with_progress(mut self, progress: impl ProgressReporter + 'static) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// Replace the progress reporter with a shared one.
    pub fn with_shared_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Persistent cache used by every resource from this fetcher.
    pub fn cache(&self) -> &PersistentCache {
        &self.cache
    }

    /// Network attempts allowed per stream open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn client(&self) -> &dyn HttpClient {
        self.client.as_ref()
    }

    pub(crate) fn progress(&self) -> &dyn ProgressReporter {
        self.progress.as_ref()
    }

    /// Build a resource for `uri` guarded by `verifier`.
    pub fn resource(&self, uri: &str, verifier: Verifier) -> FetchResult<RemoteResource> {
        let uri = Url::parse(uri).map_err(|e| FetchError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        Ok(RemoteResource::new(self.clone(), uri, verifier))
    }
}
