//! The [`Package`] entity built from one control stanza.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::manifest::{header, parse_list, Field};
use crate::error::{FetchError, FetchResult};
use crate::remote::{Fetcher, RemoteResource};

/// One binary package as described by a `Packages` index stanza.
///
/// Only the fields needed to locate, verify and group the package are
/// parsed. The stanza text itself is kept so it can be written back out for
/// package-manager tooling that needs the fields not modelled here.
///
/// # Example
///
/// ```
/// use isosmith::package::Package;
///
/// let package = Package::parse(
///     "http://archive.ubuntu.com/ubuntu",
///     "jaunty",
///     "main",
///     "Package: foo\nDepends: bar (>= 1.0), baz | qux\nTask: minimal\n",
/// );
///
/// assert_eq!(package.name(), Some("foo"));
/// assert!(package.dependencies().contains("qux"));
/// assert!(package.tasks().contains("minimal"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    name: Option<String>,
    mirror: String,
    codename: String,
    component: String,
    filename: Option<String>,
    md5sum: Option<String>,
    dependencies: BTreeSet<String>,
    recommends: BTreeSet<String>,
    tasks: BTreeSet<String>,
    manifest: String,
}

impl Package {
    /// Parse a stanza fetched from `mirror`'s `codename`/`component` index.
    ///
    /// For `Package`, `Filename` and `MD5sum` the last occurrence wins;
    /// `Depends`, `Recommends` and `Task` accumulate across repeats.
    pub fn parse(
        mirror: impl Into<String>,
        codename: impl Into<String>,
        component: impl Into<String>,
        manifest: impl Into<String>,
    ) -> Self {
        let mut package = Self {
            name: None,
            mirror: mirror.into(),
            codename: codename.into(),
            component: component.into(),
            filename: None,
            md5sum: None,
            dependencies: BTreeSet::new(),
            recommends: BTreeSet::new(),
            tasks: BTreeSet::new(),
            manifest: manifest.into(),
        };

        for line in package.manifest.lines() {
            let Some((field, value)) = header(line) else {
                continue;
            };
            match field {
                Field::Package => package.name = Some(value.trim().to_string()),
                Field::Filename => package.filename = Some(value.trim().to_string()),
                Field::Md5sum => package.md5sum = Some(value.trim().to_string()),
                Field::Depends => extend(&mut package.dependencies, value),
                Field::Recommends => extend(&mut package.recommends, value),
                Field::Task => extend(&mut package.tasks, value),
            }
        }

        package
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mirror(&self) -> &str {
        &self.mirror
    }

    pub fn codename(&self) -> &str {
        &self.codename
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Path of the `.deb` relative to the mirror root.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Expected MD5 of the `.deb`.
    pub fn md5sum(&self) -> Option<&str> {
        self.md5sum.as_deref()
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    pub fn recommends(&self) -> &BTreeSet<String> {
        &self.recommends
    }

    pub fn tasks(&self) -> &BTreeSet<String> {
        &self.tasks
    }

    /// The stanza exactly as it was parsed.
    pub fn manifest(&self) -> &str {
        &self.manifest
    }

    /// Write the trimmed stanza followed by one blank separator line.
    ///
    /// Writing several packages back to back produces a valid `Packages`
    /// index regardless of surrounding whitespace in the parsed stanzas.
    pub fn copy_manifest_to<W: Write + ?Sized>(&self, sink: &mut W) -> io::Result<()> {
        writeln!(sink, "{}", self.manifest.trim())?;
        writeln!(sink)
    }

    /// The checksum-verified resource for this package's `.deb`.
    ///
    /// # Errors
    ///
    /// [`FetchError::MissingField`] if the stanza has no `Filename`, and
    /// [`FetchError::MissingChecksum`] if it has no `MD5sum`.
    pub fn remote(&self, fetcher: &Fetcher) -> FetchResult<RemoteResource> {
        let filename = self.filename.as_deref().ok_or_else(|| FetchError::MissingField {
            package: self.name.clone().unwrap_or_default(),
            field: "Filename",
        })?;
        fetcher.package_file(
            &self.mirror,
            filename,
            self.md5sum.as_deref().unwrap_or_default(),
        )
    }

    /// Download the `.deb` to `directory/<filename>`, keeping the mirror's
    /// pool layout, and return the written path.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidUri`] if `Filename` would place the file outside
    /// `directory`. Nothing is fetched in that case.
    pub fn copy_to(&self, fetcher: &Fetcher, directory: impl AsRef<Path>) -> FetchResult<PathBuf> {
        let resource = self.remote(fetcher)?;
        let relative = contained_path(self.filename.as_deref().unwrap_or_default())?;
        let destination = directory.as_ref().join(relative);

        resource.copy_to(&destination)?;
        debug!(
            package = self.name.as_deref().unwrap_or_default(),
            path = %destination.display(),
            "copied package"
        );
        Ok(destination)
    }
}

/// `filename` relative to a destination directory, refusing anything that
/// could climb out of it.
fn contained_path(filename: &str) -> FetchResult<&Path> {
    let relative = Path::new(filename.trim_start_matches('/'));
    let escapes = relative.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || relative.as_os_str().is_empty() {
        return Err(FetchError::InvalidUri {
            uri: filename.to_string(),
            reason: "package filename must stay inside the destination directory".to_string(),
        });
    }
    Ok(relative)
}

fn extend(set: &mut BTreeSet<String>, value: &str) {
    set.extend(parse_list(value).map(str::to_string));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::remote::{MockHttpClient, SilentProgress};
    use md5::{Digest, Md5};
    use tempfile::TempDir;

    const MIRROR: &str = "http://mirror.example/ubuntu";

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn md5_hex(data: &[u8]) -> String {
        Md5::digest(data)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    #[test]
    fn test_parse_basic_stanza() {
        let package = Package::parse(
            MIRROR,
            "jaunty",
            "main",
            "Package: foo\nDepends: bar (>= 1.0), baz | qux\nTask: minimal\n",
        );

        assert_eq!(package.name(), Some("foo"));
        assert_eq!(package.dependencies(), &names(&["bar", "baz", "qux"]));
        assert_eq!(package.tasks(), &names(&["minimal"]));
        assert!(package.recommends().is_empty());
        assert_eq!(package.filename(), None);
        assert_eq!(package.codename(), "jaunty");
        assert_eq!(package.component(), "main");
    }

    #[test]
    fn test_parse_full_stanza() {
        let manifest = "\
Package: openssh-server
Priority: optional
Section: net
Installed-Size: 736
Architecture: i386
Version: 1:5.1p1-5ubuntu1
Depends: libc6 (>= 2.8~20080505), libcomerr2 (>= 1.01), openssh-client (= 1:5.1p1-5ubuntu1)
Recommends: xauth, openssh-blacklist
Filename: pool/main/o/openssh/openssh-server_5.1p1-5ubuntu1_i386.deb
Size: 286582
MD5sum: 2f0a1c0e64e5dd9dac4a1d6b1ea2b7a8
Description: secure shell (SSH) server
Task: server, openssh-server
";
        let package = Package::parse(MIRROR, "jaunty", "main", manifest);

        assert_eq!(package.name(), Some("openssh-server"));
        assert_eq!(
            package.filename(),
            Some("pool/main/o/openssh/openssh-server_5.1p1-5ubuntu1_i386.deb")
        );
        assert_eq!(package.md5sum(), Some("2f0a1c0e64e5dd9dac4a1d6b1ea2b7a8"));
        assert_eq!(
            package.dependencies(),
            &names(&["libc6", "libcomerr2", "openssh-client"])
        );
        assert_eq!(package.recommends(), &names(&["openssh-blacklist", "xauth"]));
        assert_eq!(package.tasks(), &names(&["openssh-server", "server"]));
        assert_eq!(package.manifest(), manifest);
    }

    #[test]
    fn test_repeated_headers() {
        let package = Package::parse(
            MIRROR,
            "jaunty",
            "main",
            "Package: first\nTask: a\nPackage: second\nTask: b, a\nMD5sum: 1\nMD5sum:  2 \n",
        );

        assert_eq!(package.name(), Some("second"));
        assert_eq!(package.tasks(), &names(&["a", "b"]));
        assert_eq!(package.md5sum(), Some("2"));
    }

    #[test]
    fn test_copy_manifest_normalizes_surrounding_whitespace() {
        let a = Package::parse(MIRROR, "jaunty", "main", "\n\nPackage: a\nVersion: 1\n\n\n");
        let b = Package::parse(MIRROR, "jaunty", "main", "Package: b");

        let mut out = Vec::new();
        a.copy_manifest_to(&mut out).unwrap();
        b.copy_manifest_to(&mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Package: a\nVersion: 1\n\nPackage: b\n\n"
        );
    }

    #[test]
    fn test_copy_to_downloads_verified_deb() {
        let temp = TempDir::new().unwrap();
        let deb = b"!<arch>\ndebian-binary   ".to_vec();
        let filename = "pool/main/f/foo/foo_1.0_i386.deb";
        let manifest = format!(
            "Package: foo\nFilename: {filename}\nMD5sum: {}\n",
            md5_hex(&deb)
        );
        let package = Package::parse(MIRROR, "jaunty", "main", manifest);

        let client = MockHttpClient::new().serve(&format!("{MIRROR}/{filename}"), deb.clone());
        let config = FetchConfig::default().with_cache_dir(temp.path().join("cache"));
        let fetcher = Fetcher::with_client(&config, client).with_progress(SilentProgress);

        let written = package.copy_to(&fetcher, temp.path().join("out")).unwrap();

        assert_eq!(written, temp.path().join("out").join(filename));
        assert_eq!(std::fs::read(written).unwrap(), deb);
    }

    #[test]
    fn test_remote_requires_filename_and_checksum() {
        let temp = TempDir::new().unwrap();
        let config = FetchConfig::default().with_cache_dir(temp.path());
        let fetcher = Fetcher::with_client(&config, MockHttpClient::new());

        let no_filename = Package::parse(MIRROR, "jaunty", "main", "Package: foo\nMD5sum: abc\n");
        assert!(matches!(
            no_filename.remote(&fetcher),
            Err(FetchError::MissingField { field: "Filename", .. })
        ));

        let no_checksum =
            Package::parse(MIRROR, "jaunty", "main", "Package: foo\nFilename: pool/foo.deb\n");
        assert!(matches!(
            no_checksum.remote(&fetcher),
            Err(FetchError::MissingChecksum)
        ));
    }

    #[test]
    fn test_copy_to_rejects_escaping_filename() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("a/out");
        let deb = b"payload".to_vec();

        for filename in ["pool/../../escaped.deb", "../escaped.deb", "pool/./../../../escaped.deb"] {
            let manifest = format!(
                "Package: evil\nFilename: {filename}\nMD5sum: {}\n",
                md5_hex(&deb)
            );
            let package = Package::parse(MIRROR, "jaunty", "main", manifest);
            let client = MockHttpClient::new().serve(&format!("{MIRROR}/{filename}"), deb.clone());
            let config = FetchConfig::default().with_cache_dir(temp.path().join("cache"));
            let fetcher = Fetcher::with_client(&config, client).with_progress(SilentProgress);

            let err = package.copy_to(&fetcher, &out).unwrap_err();

            assert!(
                matches!(err, FetchError::InvalidUri { ref uri, .. } if uri == filename),
                "unexpected error for {filename}: {err:?}"
            );
            assert!(!err.is_transient());
        }

        assert!(!temp.path().join("escaped.deb").exists());
        assert!(!temp.path().join("a/escaped.deb").exists());
    }

    #[test]
    fn test_contained_path_keeps_pool_layout() {
        assert_eq!(
            contained_path("/pool/main/f/foo.deb").unwrap(),
            Path::new("pool/main/f/foo.deb")
        );
        assert_eq!(contained_path("./pool/foo.deb").unwrap(), Path::new("./pool/foo.deb"));
        assert!(contained_path("").is_err());
        assert!(contained_path("pool/..").is_err());
    }
}
