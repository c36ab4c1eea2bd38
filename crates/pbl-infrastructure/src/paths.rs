//! Unified path management for pbl configuration and storage files.
//!
//! All paths are resolved from one place so that the CLI, the stores and
//! the tests agree on the layout.

use std::path::PathBuf;

use pbl_core::error::PblError;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for PblError {
    fn from(err: PathError) -> Self {
        PblError::config(err.to_string())
    }
}

const APP_DIR: &str = "pbl";

/// Unified path management for pbl.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/pbl/               # Config directory
/// └── pbl.toml                 # Sync settings
///
/// ~/.local/share/pbl/          # Data directory
/// ├── storage/                 # Local durable key-value storage
/// │   ├── pbl_session_config.json
/// │   ├── pbl_learners.json
/// │   └── pbl_visitor_id.json
/// ├── devices/<name>/          # Per-device storage when several learners share a machine
/// └── logs/
///     └── pbl.log.YYYY-MM-DD
/// ```
///
/// With a root override (tests, `--data-dir`), config and data both live
/// directly under that root.
#[derive(Debug, Clone, Default)]
pub struct PblPaths {
    root: Option<PathBuf>,
}

impl PblPaths {
    /// Creates a path resolver, optionally rooted at `root` instead of the
    /// platform directories.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Returns the pbl configuration directory.
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    /// Returns the pbl data directory.
    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    /// Returns the path to `pbl.toml`.
    pub fn settings_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("pbl.toml"))
    }

    /// Returns the shared local storage directory.
    ///
    /// Every instance on this machine that opens this directory sees the
    /// same session config and roster.
    pub fn storage_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("storage"))
    }

    /// Returns the storage directory of one named device.
    ///
    /// Only the visitor id lives here; it lets several learner consoles on
    /// one machine behave like separate devices.
    pub fn device_dir(&self, device: &str) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("devices").join(device))
    }

    /// Returns the path to the logs directory.
    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("logs"))
    }
}
