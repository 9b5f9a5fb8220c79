//! Filesystem layout helpers for translation-center.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::error::CoreError;

/// Environment variable that overrides the default root directory.
const ROOT_ENV_KEY: &str = "TRANSLATION_CENTER_ROOT";
const DEFAULT_ROOT_DIRNAME: &str = ".translation-center";

/// Descriptor for the on-disk directory structure.
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
    config_dir: PathBuf,
    stores_dir: PathBuf,
    logs_dir: PathBuf,
    state_dir: PathBuf,
}

impl Layout {
    /// Construct a new layout without touching the filesystem.
    pub fn new(root: PathBuf) -> Self {
        let config_dir = root.join("config");
        let stores_dir = root.join("stores");
        let logs_dir = root.join("logs");
        let state_dir = root.join("state");

        Self { root, config_dir, stores_dir, logs_dir, state_dir }
    }

    /// Ensure that all directories exist on disk.
    pub fn ensure(&self) -> Result<(), CoreError> {
        for dir in [self.root(), self.config_dir(), self.stores_dir(), self.logs_dir(), self.state_dir()]
        {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|source| CoreError::CreateDirectory {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Directory holding the persisted store records.
    pub fn stores_dir(&self) -> &Path {
        &self.stores_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Directory that stores runtime state (pid file).
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir().join("config.toml")
    }

    pub fn daemon_pid_path(&self) -> PathBuf {
        self.state_dir().join("daemon.pid")
    }
}

/// Determine the default root directory.
pub fn default_root() -> Result<PathBuf, CoreError> {
    if let Ok(value) = env::var(ROOT_ENV_KEY) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }

    let home = user_home_dir().ok_or(CoreError::HomeDirectoryUnknown)?;
    Ok(home.join(DEFAULT_ROOT_DIRNAME))
}

pub(crate) fn user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    None
}
