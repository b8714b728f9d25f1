//! Checksum lookup in archive indices.
//!
//! A codename's `Release` file lists the MD5 of every index under it, and each
//! installer image directory carries an `MD5SUMS` file. Both are fetched with
//! only a presence check; the digests they contain then guard everything
//! fetched afterwards.
//!
//! The chain's root is not authenticated: the `Release` file's GPG signature
//! is never checked, so a tampered mirror can serve a matching `Release` and
//! payload pair.

use std::fmt;

use regex::Regex;
use tracing::debug;

use super::fetcher::Fetcher;
use super::resource::RemoteResource;
use super::verifier::Verifier;
use crate::error::{FetchError, FetchResult};

/// A location in a Debian-style repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveCoordinate {
    mirror: String,
    codename: String,
    component: String,
    architecture: String,
}

impl ArchiveCoordinate {
    /// Create a coordinate. A trailing slash on `mirror` is dropped.
    pub fn new(
        mirror: impl Into<String>,
        codename: impl Into<String>,
        component: impl Into<String>,
        architecture: impl Into<String>,
    ) -> Self {
        Self {
            mirror: normalize_mirror(mirror.into()),
            codename: codename.into(),
            component: component.into(),
            architecture: architecture.into(),
        }
    }

    /// Base URL of the archive.
    pub fn mirror(&self) -> &str {
        &self.mirror
    }

    /// Release codename.
    pub fn codename(&self) -> &str {
        &self.codename
    }

    /// Archive component.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Binary architecture.
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Path of `rest` relative to the codename's `dists` directory, as
    /// listed in the `Release` file.
    pub fn release_path(&self, rest: &[&str]) -> String {
        let mut parts = vec![
            self.component.clone(),
            format!("binary-{}", self.architecture),
        ];
        parts.extend(rest.iter().map(|s| s.to_string()));
        parts.join("/")
    }
}

impl fmt::Display for ArchiveCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}]",
            self.mirror, self.codename, self.component, self.architecture
        )
    }
}

fn normalize_mirror(mirror: String) -> String {
    mirror.trim_end_matches('/').to_string()
}

fn join(base: String, rest: &[&str]) -> String {
    let mut parts = vec![base];
    parts.extend(rest.iter().map(|s| s.to_string()));
    parts.join("/")
}

/// URI of a file under a component's binary directory.
pub fn component_uri(coordinate: &ArchiveCoordinate, rest: &[&str]) -> String {
    join(
        format!(
            "{}/dists/{}/{}/binary-{}",
            coordinate.mirror, coordinate.codename, coordinate.component, coordinate.architecture
        ),
        rest,
    )
}

/// URI of a file under the installer images directory.
pub fn installer_uri(mirror: &str, codename: &str, architecture: &str, rest: &[&str]) -> String {
    join(
        format!(
            "{}/dists/{}/main/installer-{}/current/images",
            mirror.trim_end_matches('/'),
            codename,
            architecture
        ),
        rest,
    )
}

/// URI of the `Release` file for `codename`.
pub fn release_uri(mirror: &str, codename: &str) -> String {
    format!("{}/dists/{}/Release", mirror.trim_end_matches('/'), codename)
}

/// Matches ` <32 hex> <size> <path>` lines naming exactly `path`.
fn release_pattern(path: &str) -> Option<Regex> {
    let pattern = format!(r"^ ([0-9a-fA-F]{{32}})\s+\d+\s+{}\s*$", regex::escape(path));
    Regex::new(&pattern).ok()
}

fn release_line_checksum(pattern: &Regex, line: &str) -> Option<String> {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn md5sums_line_checksum(suffix: &str, line: &str) -> Option<String> {
    if line.contains(suffix) {
        line.split_whitespace().next().map(str::to_string)
    } else {
        None
    }
}

/// Find the MD5 of `path` in `Release` file lines.
///
/// The path must match exactly, so `Packages` does not pick up the
/// `Packages.gz` entry. Longer digests in the SHA sections never match.
pub fn find_release_checksum<I, S>(lines: I, path: &str) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let pattern = release_pattern(path)?;
    lines
        .into_iter()
        .find_map(|line| release_line_checksum(&pattern, line.as_ref()))
}

/// Find the MD5 of the first `MD5SUMS` line that mentions `suffix`.
pub fn find_md5sums_checksum<I, S>(lines: I, suffix: &str) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .find_map(|line| md5sums_line_checksum(suffix, line.as_ref()))
}

/// First checksum `matcher` extracts from the index's lines.
fn resolve_checksum<M>(index: &RemoteResource, path: &str, matcher: M) -> FetchResult<String>
where
    M: Fn(&str) -> Option<String>,
{
    for line in index.each_line()? {
        if let Some(md5sum) = matcher(&line?) {
            return Ok(md5sum);
        }
    }

    Err(FetchError::ChecksumNotFound {
        index: index.uri().to_string(),
        path: path.to_string(),
    })
}

impl Fetcher {
    /// The `Release` file for `codename`, trusted if it is non-empty.
    pub fn release_file(&self, mirror: &str, codename: &str) -> FetchResult<RemoteResource> {
        self.resource(&release_uri(mirror, codename), Verifier::content())
    }

    /// A file under `dists/<codename>/<component>/binary-<arch>/`, verified
    /// against the MD5 the `Release` file lists for it.
    ///
    /// # Errors
    ///
    /// Fails with [`FetchError::ChecksumNotFound`] if the `Release` file has
    /// no line for the path; that is not retried.
    pub fn component_file(
        &self,
        coordinate: &ArchiveCoordinate,
        rest: &[&str],
    ) -> FetchResult<RemoteResource> {
        let path = coordinate.release_path(rest);
        let release = self.release_file(&coordinate.mirror, &coordinate.codename)?;
        let pattern = release_pattern(&path).ok_or_else(|| FetchError::ChecksumNotFound {
            index: release.uri().to_string(),
            path: path.clone(),
        })?;
        let md5sum = resolve_checksum(&release, &path, |line| {
            release_line_checksum(&pattern, line)
        })?;

        debug!(path = %path, md5sum = %md5sum, "resolved component file checksum");
        self.resource(&component_uri(coordinate, rest), Verifier::md5(md5sum)?)
    }

    /// A file under the installer images directory, verified against the
    /// MD5 listed in that directory's `MD5SUMS`.
    pub fn installer_file(
        &self,
        mirror: &str,
        codename: &str,
        architecture: &str,
        rest: &[&str],
    ) -> FetchResult<RemoteResource> {
        let suffix = rest.join("/");
        let md5sums = self.resource(
            &installer_uri(mirror, codename, architecture, &["MD5SUMS"]),
            Verifier::content(),
        )?;
        let md5sum = resolve_checksum(&md5sums, &suffix, |line| {
            md5sums_line_checksum(&suffix, line)
        })?;

        debug!(path = %suffix, md5sum = %md5sum, "resolved installer file checksum");
        self.resource(
            &installer_uri(mirror, codename, architecture, rest),
            Verifier::md5(md5sum)?,
        )
    }

    /// A package archive at `<mirror>/<filename>`, verified against `md5sum`.
    pub fn package_file(
        &self,
        mirror: &str,
        filename: &str,
        md5sum: &str,
    ) -> FetchResult<RemoteResource> {
        let uri = format!(
            "{}/{}",
            mirror.trim_end_matches('/'),
            filename.trim_start_matches('/')
        );
        self.resource(&uri, Verifier::md5(md5sum)?)
    }
}
