//! Persisted settings for logkeeper.
//!
//! Settings are layered with [`figment`]: built-in defaults, then the TOML
//! settings file, then `LOGKEEPER_`-prefixed environment variables. The
//! lifecycle engine never reads this crate directly; callers pass the values
//! they need into each operation.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "LOGKEEPER_";
const SETTINGS_FILE: &str = "logkeeper.toml";
const TRASH_DIRECTORY: &str = "trash";

pub const DEFAULT_CLEAN_THRESHOLD_DAYS: i64 = 7;
pub const DEFAULT_COMPRESS_THRESHOLD_DAYS: i64 = 5;
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// User-facing retention settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the rotated log files. Empty means "not configured".
    pub log_directory: PathBuf,
    /// Files older than this many days are deleted by the clean policy.
    pub clean_threshold_days: i64,
    /// Run the clean policy when the status view opens.
    pub auto_clean: bool,
    /// Raw logs older than this many days are archived by the compress policy.
    pub compress_threshold_days: i64,
    /// Run the compress policy when the status view opens.
    pub auto_compress: bool,
    /// Remove files outright instead of moving them to the trash directory.
    pub delete_permanently: bool,
    /// Maximum number of files processed at once; `0` removes the limit.
    pub max_workers: usize,
    /// Where trashed files are moved to. Defaults to the user data directory.
    pub trash_directory: Option<PathBuf>,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::new(),
            clean_threshold_days: DEFAULT_CLEAN_THRESHOLD_DAYS,
            auto_clean: false,
            compress_threshold_days: DEFAULT_COMPRESS_THRESHOLD_DAYS,
            auto_compress: false,
            delete_permanently: false,
            max_workers: DEFAULT_MAX_WORKERS,
            trash_directory: None,
        }
    }
}

impl Settings {
    /// Location of the settings file in the platform's configuration directory.
    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join(SETTINGS_FILE))
    }

    /// Layered configuration sources, lowest priority first.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load settings from `path`. A missing file is not an error; defaults
    /// (and environment overrides) are used instead.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings: Settings = Self::figment(path).extract().or_raise(|| ErrorKind::Invalid)?;
        tracing::debug!(path = %path.display(), ?settings, "Loaded settings");
        Ok(settings)
    }

    /// Write settings to `path` as TOML, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).or_raise(|| ErrorKind::Serialize)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Write(path.to_path_buf()))?;
        }
        std::fs::write(path, contents).or_raise(|| ErrorKind::Write(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// The configured log directory, or the directory containing the running
    /// executable when none is configured (the working directory when even
    /// that cannot be determined).
    ///
    /// # Errors
    ///
    /// Returns [`MissingLogDirectory`](ErrorKind::MissingLogDirectory) if a
    /// directory is configured but doesn't exist. Nothing falls back in that
    /// case, so the clean policy never runs somewhere the user didn't pick.
    pub fn log_directory_or_default(&self) -> Result<PathBuf> {
        if self.log_directory.as_os_str().is_empty() {
            let fallback = std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."));
            tracing::info!(fallback = %fallback.display(), "No log directory configured; using executable directory");
            return Ok(fallback);
        }
        if !self.log_directory.is_dir() {
            exn::bail!(ErrorKind::MissingLogDirectory(self.log_directory.clone()));
        }
        Ok(self.log_directory.clone())
    }

    /// The configured trash directory, or `trash` inside the user data directory.
    pub fn trash_directory_or_default(&self) -> Result<PathBuf> {
        match &self.trash_directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().join(TRASH_DIRECTORY)),
        }
    }

    /// Worker limit, with `0` meaning unbounded.
    pub fn max_workers(&self) -> Option<usize> {
        (self.max_workers > 0).then_some(self.max_workers)
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    match ProjectDirs::from("", "", "logkeeper") {
        Some(dirs) => Ok(dirs),
        None => exn::bail!(ErrorKind::NoProjectDirectory),
    }
}
