//! Builds settings, paths and store backends from command-line flags.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use pbl_application::SessionController;
use pbl_core::config::{BackendKind, SyncSettings};
use pbl_core::document::DocumentStore;
use pbl_core::identity::{DeviceStorage, get_or_create_visitor_id};
use pbl_core::{PresenceStore, SessionStore};
use pbl_infrastructure::{
    ActivatingSessionStore, ConfigService, InMemoryPresenceStore, InMemorySessionStore,
    LocalStorage, MemoryDeviceStorage, PblPaths, PolledPresenceStore,
    PolledSessionStore, RemotePresenceStore, RemoteSessionStore,
};
use tracing::info;

/// Resolved paths and effective settings of one invocation.
pub struct AppContext {
    pub paths: PblPaths,
    pub config: ConfigService,
    pub settings: SyncSettings,
}

impl AppContext {
    /// Loads `pbl.toml` and applies the command-line overrides on top.
    ///
    /// `--data-dir` moves both the config file and the data. A `data_dir`
    /// from the file only moves the data.
    pub fn load(data_dir: Option<PathBuf>, backend: Option<BackendKind>) -> Result<Self> {
        let config_paths = PblPaths::new(data_dir.clone());
        let config = ConfigService::new(&config_paths).context("Failed to resolve config path")?;
        let mut settings = config.get_settings();

        if let Some(backend) = backend {
            settings.backend = backend;
        }
        let paths = match data_dir {
            Some(root) => PblPaths::new(Some(root)),
            None => PblPaths::new(settings.data_dir.clone()),
        };

        Ok(Self {
            paths,
            config,
            settings,
        })
    }

    /// Composes the stores for the configured backend.
    pub fn stores(&self) -> Result<Stores> {
        let stores = match self.settings.backend {
            BackendKind::Memory => Stores::memory(),
            BackendKind::Local => {
                let dir = self.paths.storage_dir()?;
                Stores::local(LocalStorage::open(dir), self.settings.poll_interval())
            }
            // The only document store is in-process, so separate consoles
            // would each get an empty private one.
            BackendKind::Remote => bail!(
                "the remote backend has no hosted document store yet; \
                 use `pbl demo` to see it in one process, \
                 or `--backend local` to share a session between terminals"
            ),
        };
        info!(backend = %self.settings.backend, "Stores composed");
        Ok(stores)
    }

    /// Returns the visitor id of `device`, creating it on first use.
    pub fn visitor_id(&self, device: &str) -> Result<String> {
        let storage: Box<dyn DeviceStorage> = match self.settings.backend {
            BackendKind::Memory => Box::new(MemoryDeviceStorage::new()),
            BackendKind::Local | BackendKind::Remote => {
                Box::new(LocalStorage::open(self.paths.device_dir(device)?))
            }
        };
        Ok(get_or_create_visitor_id(storage.as_ref()))
    }

    /// Starts a controller for `device` over freshly composed stores.
    pub async fn controller(&self, device: &str) -> Result<SessionController> {
        let visitor_id = self.visitor_id(device)?;
        let controller = self.stores()?.controller(visitor_id).await;
        Ok(controller.with_active_threshold(self.settings.active_threshold()))
    }
}

/// A session store and a presence store over the same backend.
///
/// The session store is always wrapped so that opening a session clears the
/// roster, whichever backend sits underneath.
#[derive(Clone)]
pub struct Stores {
    pub session: Arc<dyn SessionStore>,
    pub presence: Arc<dyn PresenceStore>,
}

impl Stores {
    pub fn memory() -> Self {
        let presence: Arc<dyn PresenceStore> = Arc::new(InMemoryPresenceStore::new());
        Self::activating(InMemorySessionStore::new(), presence)
    }

    pub fn local(storage: LocalStorage, poll_interval: Duration) -> Self {
        let presence: Arc<dyn PresenceStore> = Arc::new(PolledPresenceStore::with_poll_interval(
            storage.clone(),
            poll_interval,
        ));
        Self::activating(
            PolledSessionStore::with_poll_interval(storage, poll_interval),
            presence,
        )
    }

    pub fn remote(documents: Arc<dyn DocumentStore>) -> Self {
        let presence: Arc<dyn PresenceStore> =
            Arc::new(RemotePresenceStore::new(documents.clone()));
        Self::activating(RemoteSessionStore::new(documents), presence)
    }

    fn activating<S: SessionStore + 'static>(session: S, presence: Arc<dyn PresenceStore>) -> Self {
        Self {
            session: Arc::new(ActivatingSessionStore::new(session, presence.clone())),
            presence,
        }
    }

    pub async fn controller(&self, visitor_id: String) -> SessionController {
        SessionController::start(self.session.clone(), self.presence.clone(), visitor_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flag_overrides_file_backend() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("pbl.toml"), "backend = \"remote\"\n").unwrap();

        let from_file = AppContext::load(Some(temp_dir.path().to_path_buf()), None).unwrap();
        assert_eq!(from_file.settings.backend, BackendKind::Remote);

        let overridden =
            AppContext::load(Some(temp_dir.path().to_path_buf()), Some(BackendKind::Memory))
                .unwrap();
        assert_eq!(overridden.settings.backend, BackendKind::Memory);
    }

    #[test]
    fn test_devices_get_separate_visitor_ids() {
        let temp_dir = TempDir::new().unwrap();
        let app = AppContext::load(Some(temp_dir.path().to_path_buf()), Some(BackendKind::Local))
            .unwrap();

        let first = app.visitor_id("tab-1").unwrap();
        assert_eq!(app.visitor_id("tab-1").unwrap(), first);
        assert_ne!(app.visitor_id("tab-2").unwrap(), first);
    }

    #[test]
    fn test_remote_backend_is_refused_for_consoles() {
        let temp_dir = TempDir::new().unwrap();
        let app = AppContext::load(Some(temp_dir.path().to_path_buf()), Some(BackendKind::Remote))
            .unwrap();

        let err = app.stores().err().unwrap();
        assert!(err.to_string().contains("pbl demo"));
    }

    #[tokio::test]
    async fn test_local_stores_share_one_directory() {
        let temp_dir = TempDir::new().unwrap();
        let app = AppContext::load(Some(temp_dir.path().to_path_buf()), Some(BackendKind::Local))
            .unwrap();

        let admin = app.stores().unwrap();
        let config = pbl_core::SessionConfig::active("Acme", 2).unwrap();
        admin.session.write(config.clone()).await.unwrap();

        let other = app.stores().unwrap();
        assert_eq!(other.session.read().await, config);
    }
}
