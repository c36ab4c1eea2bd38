//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the sync settings from
//! the configuration file (~/.config/pbl/pbl.toml).

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use pbl_core::config::SyncSettings;
use pbl_core::error::Result;
use tracing::warn;

use crate::paths::PblPaths;
use crate::storage::AtomicFile;

/// Configuration service that loads and caches [`SyncSettings`].
///
/// A missing file is created with defaults on first access. A file that
/// cannot be parsed is left untouched and the defaults are used.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    /// Cached settings loaded from file.
    settings: Arc<RwLock<Option<SyncSettings>>>,
}

impl ConfigService {
    /// Creates a service reading `pbl.toml` from the resolved config dir.
    pub fn new(paths: &PblPaths) -> Result<Self> {
        Ok(Self::with_path(paths.settings_file()?))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            settings: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the settings, loading from file if not cached.
    pub fn get_settings(&self) -> SyncSettings {
        if let Ok(cached) = self.settings.read() {
            if let Some(settings) = cached.as_ref() {
                return settings.clone();
            }
        }

        let loaded = self.load_or_create().unwrap_or_else(|e| {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to load settings, using defaults"
            );
            SyncSettings::default()
        });

        if let Ok(mut cache) = self.settings.write() {
            *cache = Some(loaded.clone());
        }
        loaded
    }

    /// Writes `settings` to disk and refreshes the cache.
    pub fn save(&self, settings: &SyncSettings) -> Result<()> {
        AtomicFile::<SyncSettings>::toml(self.path.clone()).save(settings)?;
        if let Ok(mut cache) = self.settings.write() {
            *cache = Some(settings.clone());
        }
        Ok(())
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        if let Ok(mut cache) = self.settings.write() {
            *cache = None;
        }
    }

    fn load_or_create(&self) -> Result<SyncSettings> {
        let file = AtomicFile::<SyncSettings>::toml(self.path.clone());
        match file.load()? {
            Some(settings) => Ok(settings),
            None => {
                let defaults = SyncSettings::default();
                file.save(&defaults)?;
                Ok(defaults)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbl_core::config::BackendKind;
    use tempfile::TempDir;

    #[test]
    fn test_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let paths = PblPaths::new(Some(temp_dir.path().to_path_buf()));
        let service = ConfigService::new(&paths).unwrap();

        let settings = service.get_settings();
        assert_eq!(settings, SyncSettings::default());
        assert!(temp_dir.path().join("pbl.toml").exists());
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pbl.toml");
        std::fs::write(&path, "backend = \"remote\"\npoll_interval_ms = 250\n").unwrap();

        let settings = ConfigService::with_path(path).get_settings();
        assert_eq!(settings.backend, BackendKind::Remote);
        assert_eq!(settings.poll_interval_ms, 250);
        assert_eq!(settings.active_threshold_secs, 300);
    }

    #[test]
    fn test_malformed_file_falls_back_and_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pbl.toml");
        std::fs::write(&path, "backend = [").unwrap();

        let settings = ConfigService::with_path(path.clone()).get_settings();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "backend = [");
    }

    #[test]
    fn test_save_then_reload() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("pbl.toml"));
        let mut settings = service.get_settings();
        settings.backend = BackendKind::Memory;
        settings.log_level = "debug".to_string();
        service.save(&settings).unwrap();

        service.invalidate_cache();
        assert_eq!(service.get_settings(), settings);
    }
}
