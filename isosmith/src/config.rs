//! Configuration for fetching and image building.
//!
//! Settings are read from an INI file:
//!
//! ```ini
//! [build]
//! architecture = amd64
//! label = Ubuntu
//! version = 9.04
//! tasks = minimal, standard
//! include_packages = openssh-server ubuntu-minimal
//! repository = http://us.archive.ubuntu.com/ubuntu jaunty main restricted
//! repository = http://us.archive.ubuntu.com/ubuntu jaunty-updates main
//! post_install = echo done
//!
//! [fetch]
//! cache_dir = /var/cache/isosmith
//! attempts = 4
//! timeout_secs = 300
//! ```
//!
//! Keys in `[build]` that are not recognized are kept in
//! [`BuildConfig::extra`] rather than rejected.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::{Ini, Properties};
use tempfile::TempDir;
use thiserror::Error;

use crate::remote::{ArchiveCoordinate, DEFAULT_TIMEOUT_SECS};

/// Default number of network attempts per resource.
pub const DEFAULT_ATTEMPTS: u32 = 4;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or parsed.
    #[error("failed to load config file {}: {source}", path.display())]
    Load { path: PathBuf, source: ini::Error },

    /// Configuration text could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    /// A key holds a value of the wrong shape.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The working directory could not be created.
    #[error("failed to create working directory {}: {source}", path.display())]
    WorkingDirectory { path: PathBuf, source: io::Error },
}

/// Settings for remote fetching.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Root of the persistent download cache.
    pub cache_dir: PathBuf,

    /// Network attempts per resource before giving up.
    pub attempts: u32,

    /// Connect timeout per request. Body reads have no deadline, so a
    /// stalled transfer blocks until the server closes the connection.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            attempts: DEFAULT_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl FetchConfig {
    /// Set the cache directory.
    pub fn with_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = path.into();
        self
    }

    /// Set the attempt budget. Values below one are treated as one.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the HTTP connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn apply(&mut self, section: &Properties) -> ConfigResult<()> {
        if let Some(dir) = section.get("cache_dir") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(value) = section.get("attempts") {
            self.attempts = parse_number("attempts", value)?;
        }
        if let Some(value) = section.get("timeout_secs") {
            self.timeout = Duration::from_secs(parse_number("timeout_secs", value)?);
        }
        Ok(())
    }
}

/// Per-user cache root: `<cache dir>/isosmith`, else `~/.isosmith`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("isosmith"))
        .or_else(|| dirs::home_dir().map(|home| home.join(".isosmith")))
        .unwrap_or_else(|| std::env::temp_dir().join("isosmith"))
}

/// What goes into the image and how it is labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Target architecture (e.g. `i386`, `amd64`).
    pub architecture: String,

    /// Repository lines: `<mirror> <codename> <component>...`.
    ///
    /// The first line also supplies the installer.
    pub repositories: Vec<String>,

    /// Tasks whose packages are included.
    pub tasks: Vec<String>,

    /// Packages copied onto the image.
    pub include_packages: Vec<String>,

    /// Packages installed by the installer.
    pub install_packages: Vec<String>,

    /// Distribution label used in image names.
    pub label: String,

    /// Distribution version.
    pub version: String,

    /// Custom tag distinguishing this image.
    pub tag: String,

    /// Where the finished image is written.
    pub output_directory: PathBuf,

    /// Directory the image is assembled in. `None` uses a temporary one.
    pub working_directory: Option<PathBuf>,

    /// Commands run at the end of installation.
    pub post_install_commands: Vec<String>,

    /// Whether the installer runs unattended.
    pub auto_install: bool,

    /// Arbitrary content copied onto the image.
    pub bundle_directory: PathBuf,

    /// Preseed template overriding the default.
    pub custom_preseed_file: PathBuf,

    /// Unrecognized `[build]` keys.
    pub extra: BTreeMap<String, String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            architecture: "i386".to_string(),
            repositories: vec![
                "http://us.archive.ubuntu.com/ubuntu jaunty main restricted".to_string(),
            ],
            tasks: vec!["minimal".to_string(), "standard".to_string()],
            include_packages: vec![
                "linux-server".to_string(),
                "language-support-en".to_string(),
                "grub".to_string(),
            ],
            install_packages: Vec::new(),
            label: "Ubuntu".to_string(),
            version: "9.04".to_string(),
            tag: "captain".to_string(),
            output_directory: PathBuf::from("."),
            working_directory: None,
            post_install_commands: Vec::new(),
            auto_install: true,
            bundle_directory: PathBuf::from("isosmith/bundle"),
            custom_preseed_file: PathBuf::from("isosmith/preseed.custom.erb"),
            extra: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    /// Append packages to [`include_packages`](Self::include_packages),
    /// skipping ones already listed.
    pub fn add_include_packages<I, S>(&mut self, packages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.include_packages, packages);
    }

    /// Append tasks, skipping ones already listed.
    pub fn add_tasks<I, S>(&mut self, tasks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.tasks, tasks);
    }

    /// Mirror and codename of the first repository, used for the installer.
    pub fn installer_mirror_and_codename(&self) -> Option<(&str, &str)> {
        let mut words = self.repositories.first()?.split_whitespace();
        Some((words.next()?, words.next()?))
    }

    /// Volume name of the image, e.g. `Ubuntu 9.04 Captain`.
    pub fn iso_image_name(&self) -> String {
        format!("{} {} {}", self.label, self.version, capitalize(&self.tag))
    }

    /// Output path of the image, e.g. `./ubuntu-9.04-captain-i386.iso`.
    pub fn iso_image_path(&self) -> PathBuf {
        let basename = format!(
            "{}-{}-{}-{}.iso",
            self.label, self.version, self.tag, self.architecture
        )
        .to_lowercase();
        self.output_directory.join(basename)
    }

    /// One coordinate per component of every repository line.
    pub fn archive_coordinates(&self) -> ConfigResult<Vec<ArchiveCoordinate>> {
        let mut coordinates = Vec::new();
        for line in &self.repositories {
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.len() < 3 {
                return Err(ConfigError::InvalidValue {
                    key: "repository".to_string(),
                    value: line.clone(),
                    reason: "expected <mirror> <codename> <component>...".to_string(),
                });
            }
            for component in &words[2..] {
                coordinates.push(ArchiveCoordinate::new(
                    words[0],
                    words[1],
                    *component,
                    self.architecture.as_str(),
                ));
            }
        }
        Ok(coordinates)
    }

    /// Acquire the directory the image is assembled in.
    ///
    /// A temporary directory is removed when the returned value is dropped,
    /// on success and error paths alike.
    pub fn acquire_working_directory(&self) -> ConfigResult<WorkingDirectory> {
        match &self.working_directory {
            Some(path) => WorkingDirectory::persistent(path),
            None => WorkingDirectory::temporary(),
        }
    }

    fn apply(&mut self, section: &Properties) -> ConfigResult<()> {
        let repositories: Vec<String> = section.get_all("repository").map(str::to_string).collect();
        if !repositories.is_empty() {
            self.repositories = repositories;
        }

        let commands: Vec<String> = section.get_all("post_install").map(str::to_string).collect();
        if !commands.is_empty() {
            self.post_install_commands = commands;
        }

        for (key, value) in section.iter() {
            match key {
                "repository" | "post_install" => {}
                "architecture" => self.architecture = value.to_string(),
                "label" => self.label = value.to_string(),
                "version" => self.version = value.to_string(),
                "tag" => self.tag = value.to_string(),
                "output_directory" => self.output_directory = PathBuf::from(value),
                "working_directory" => self.working_directory = Some(PathBuf::from(value)),
                "bundle_directory" => self.bundle_directory = PathBuf::from(value),
                "custom_preseed_file" => self.custom_preseed_file = PathBuf::from(value),
                "auto_install" => self.auto_install = parse_bool(key, value)?,
                "tasks" => self.add_tasks(split_list(value)),
                "include_packages" => self.add_include_packages(split_list(value)),
                "install_packages" => extend_unique(&mut self.install_packages, split_list(value)),
                _ => {
                    self.extra.insert(key.to_string(), value.to_string());
                }
            }
        }

        Ok(())
    }
}

/// Complete configuration file contents.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// `[build]` section.
    pub build: BuildConfig,
    /// `[fetch]` section.
    pub fetch: FetchConfig,
}

impl Config {
    /// Load configuration from an INI file, starting from defaults.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text, starting from defaults.
    pub fn from_ini_str(text: &str) -> ConfigResult<Self> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> ConfigResult<Self> {
        let mut config = Self::default();
        if let Some(section) = ini.section(Some("build")) {
            config.build.apply(section)?;
        }
        if let Some(section) = ini.section(Some("fetch")) {
            config.fetch.apply(section)?;
        }
        config.build.archive_coordinates()?;
        Ok(config)
    }
}

/// Directory an image is assembled in, held for the length of a build.
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
    temp: Option<TempDir>,
}

impl WorkingDirectory {
    /// A fresh temporary directory, deleted on drop.
    pub fn temporary() -> ConfigResult<Self> {
        let temp = tempfile::Builder::new()
            .prefix("isosmith")
            .tempdir()
            .map_err(|e| ConfigError::WorkingDirectory {
                path: std::env::temp_dir(),
                source: e,
            })?;
        Ok(Self {
            path: temp.path().to_path_buf(),
            temp: Some(temp),
        })
    }

    /// A caller-chosen directory, created if needed and never deleted.
    pub fn persistent(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|e| ConfigError::WorkingDirectory {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { path, temp: None })
    }

    /// Location of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory is removed on drop.
    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

fn extend_unique<I, S>(list: &mut Vec<String>, items: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for item in items {
        let item = item.into();
        if !list.contains(&item) {
            list.push(item);
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut capitalized: String = first.to_uppercase().collect();
            capitalized.push_str(&chars.as_str().to_lowercase());
            capitalized
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_fetch_config() {
        let config = FetchConfig::default();
        assert_eq!(config.attempts, 4);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!(config.cache_dir.ends_with("isosmith") || config.cache_dir.ends_with(".isosmith"));
    }

    #[test]
    fn test_fetch_builder_pattern() {
        let config = FetchConfig::default()
            .with_cache_dir("/srv/cache")
            .with_attempts(7)
            .with_timeout(Duration::from_secs(10));

        assert_eq!(config.cache_dir, PathBuf::from("/srv/cache"));
        assert_eq!(config.attempts, 7);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_default_build_config() {
        let config = BuildConfig::default();
        assert_eq!(config.architecture, "i386");
        assert_eq!(config.tasks, vec!["minimal", "standard"]);
        assert_eq!(
            config.include_packages,
            vec!["linux-server", "language-support-en", "grub"]
        );
        assert_eq!(
            config.repositories,
            vec!["http://us.archive.ubuntu.com/ubuntu jaunty main restricted"]
        );
        assert!(config.auto_install);
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_additive_lists_deduplicate() {
        let mut config = BuildConfig::default();
        config.add_tasks(["standard", "server", "server"]);
        config.add_include_packages(vec!["openssh-server".to_string(), "grub".to_string()]);

        assert_eq!(config.tasks, vec!["minimal", "standard", "server"]);
        assert_eq!(
            config.include_packages,
            vec!["linux-server", "language-support-en", "grub", "openssh-server"]
        );
    }

    #[test]
    fn test_derived_names() {
        let config = BuildConfig {
            output_directory: PathBuf::from("out"),
            ..Default::default()
        };

        assert_eq!(config.iso_image_name(), "Ubuntu 9.04 Captain");
        assert_eq!(
            config.iso_image_path(),
            PathBuf::from("out/ubuntu-9.04-captain-i386.iso")
        );
        assert_eq!(
            config.installer_mirror_and_codename(),
            Some(("http://us.archive.ubuntu.com/ubuntu", "jaunty"))
        );
    }

    #[test]
    fn test_archive_coordinates_per_component() {
        let config = BuildConfig {
            repositories: vec![
                "http://mirror.example/ubuntu jaunty main restricted".to_string(),
                "http://mirror.example/ubuntu jaunty-updates main".to_string(),
            ],
            ..Default::default()
        };

        let coordinates = config.archive_coordinates().unwrap();
        let described: Vec<(&str, &str)> = coordinates
            .iter()
            .map(|c| (c.codename(), c.component()))
            .collect();

        assert_eq!(
            described,
            vec![
                ("jaunty", "main"),
                ("jaunty", "restricted"),
                ("jaunty-updates", "main")
            ]
        );
        assert!(coordinates.iter().all(|c| c.architecture() == "i386"));
    }

    #[test]
    fn test_from_ini_str() {
        let text = "\
[build]
architecture = amd64
tag = custom
tasks = server, minimal
auto_install = no
repository = http://mirror.example/ubuntu jaunty main restricted
repository = http://mirror.example/ubuntu jaunty-security main
post_install = echo one
post_install = echo two
flavour = lts

[fetch]
cache_dir = /srv/cache
attempts = 2
timeout_secs = 45
";
        let config = Config::from_ini_str(text).unwrap();

        assert_eq!(config.build.architecture, "amd64");
        assert_eq!(config.build.tag, "custom");
        assert_eq!(config.build.tasks, vec!["minimal", "standard", "server"]);
        assert!(!config.build.auto_install);
        assert_eq!(config.build.repositories.len(), 2);
        assert_eq!(config.build.post_install_commands, vec!["echo one", "echo two"]);
        assert_eq!(config.build.extra.get("flavour").map(String::as_str), Some("lts"));

        assert_eq!(config.fetch.cache_dir, PathBuf::from("/srv/cache"));
        assert_eq!(config.fetch.attempts, 2);
        assert_eq!(config.fetch.timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_ini_str("[fetch]\nattempts = many\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "attempts"));

        let err = Config::from_ini_str("[build]\nauto_install = maybe\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = Config::from_ini_str("[build]\nrepository = http://mirror.example\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "repository"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("isosmith.ini");
        std::fs::write(&path, "[build]\nlabel = Kubuntu\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.build.label, "Kubuntu");

        let err = Config::load(temp.path().join("missing.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }

    #[test]
    fn test_temporary_working_directory_removed_on_drop() {
        let working = WorkingDirectory::temporary().unwrap();
        let path = working.path().to_path_buf();
        assert!(path.is_dir());
        assert!(working.is_temporary());

        drop(working);
        assert!(!path.exists());
    }

    #[test]
    fn test_temporary_working_directory_removed_on_error_path() {
        fn failing_build(working: &WorkingDirectory) -> Result<(), String> {
            std::fs::write(working.path().join("partial.iso"), b"...").unwrap();
            Err("burn failed".to_string())
        }

        let path = {
            let working = BuildConfig::default().acquire_working_directory().unwrap();
            assert!(failing_build(&working).is_err());
            working.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_persistent_working_directory_survives_drop() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig {
            working_directory: Some(temp.path().join("image")),
            ..Default::default()
        };

        let working = config.acquire_working_directory().unwrap();
        let path = working.path().to_path_buf();
        assert!(!working.is_temporary());
        drop(working);

        assert!(path.is_dir());
    }
}
