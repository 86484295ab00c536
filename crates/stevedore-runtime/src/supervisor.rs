//! The supervisor that ties the registry, the OCI runtime and the store
//! together.
//!
//! Lifecycle operations live next to this file (`attach`, `exec`,
//! `remove`); this module owns construction, registration, lookup and
//! persistence.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use stevedore_common::config::SupervisorConfig;
use stevedore_common::constants;
use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::{ContainerId, ContainerState};
use stevedore_storage::{ContainerStore, LocalStore};

use crate::container::{Container, ContainerConfig, ContainerInfo};
use crate::oci::{OciRuntime, RuncRuntime};
use crate::registry::ContainerRegistry;
use crate::state;

/// Supervises the containers of one host.
///
/// Constructed once and passed by reference to every caller; there is no
/// process-wide instance.
pub struct Supervisor {
    pub(crate) config: SupervisorConfig,
    pub(crate) registry: ContainerRegistry,
    pub(crate) runtime: Arc<dyn OciRuntime>,
    pub(crate) store: Arc<dyn ContainerStore>,
    persist_lock: Mutex<()>,
}

impl Supervisor {
    /// Creates a supervisor over explicit runtime and store backends.
    #[must_use]
    pub fn new(
        config: SupervisorConfig,
        runtime: Arc<dyn OciRuntime>,
        store: Arc<dyn ContainerStore>,
    ) -> Self {
        Self {
            config,
            registry: ContainerRegistry::new(),
            runtime,
            store,
            persist_lock: Mutex::new(()),
        }
    }

    /// Creates a supervisor with the configured runtime binary and the
    /// on-disk store, then reloads the persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the store cannot
    /// be opened, or the state file cannot be read.
    pub fn open(config: SupervisorConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Arc::new(RuncRuntime::from_config(&config));
        let store = Arc::new(LocalStore::open(&config.storage_root)?);
        tracing::info!(
            runtime = %config.runtime_path.display(),
            storage = %config.storage_root.display(),
            "supervisor starting"
        );
        let supervisor = Self::new(config, runtime, store);
        let _ = supervisor.load()?;
        Ok(supervisor)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Returns the container registry.
    #[must_use]
    pub const fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    /// Re-registers the containers recorded in the state file and returns
    /// how many were restored. Records whose bundle or storage is gone are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file exists but cannot be read.
    pub fn load(&self) -> Result<usize> {
        let Some(path) = &self.config.state_file else {
            return Ok(0);
        };
        let snapshot = state::load_state(path)?;

        let mut restored = 0;
        for record in snapshot.containers {
            let id = record.id.clone();
            if !record.config.bundle_path.is_dir() {
                tracing::warn!(
                    id = %id,
                    bundle = %record.config.bundle_path.display(),
                    "skipping container whose bundle vanished"
                );
                continue;
            }
            if let Err(e) = self.store.container_directory(&id) {
                tracing::warn!(id = %id, error = %e, "skipping container whose storage vanished");
                continue;
            }
            let added = Container::from_record(record)
                .and_then(|ctr| self.registry.add(Arc::new(ctr)));
            match added {
                Ok(()) => restored += 1,
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "skipping unrestorable container");
                }
            }
        }
        tracing::info!(path = %path.display(), restored, "state loaded");
        Ok(restored)
    }

    /// Registers a container whose bundle has already been materialized
    /// and creates its storage unless the store already has it.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for a missing bundle or bad stop signal,
    /// `NameTaken` if the name is held, `InvalidId` for an unusable id, or
    /// the store's error; on any error nothing stays registered.
    pub fn register(&self, config: ContainerConfig) -> Result<Arc<Container>> {
        if !config.bundle_path.is_dir() {
            return Err(StevedoreError::Config {
                message: format!("bundle {} does not exist", config.bundle_path.display()),
            });
        }

        let id = config.id.clone().unwrap_or_else(ContainerId::generate);
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("{}{}", constants::GENERATED_NAME_PREFIX, id.short()));
        let ctr = Arc::new(Container::new(id, name, config)?);
        self.registry.add(Arc::clone(&ctr))?;

        if self.store.container_directory(ctr.id()).is_err() {
            if let Err(e) = self.store.create_container(ctr.id(), &ctr.name()) {
                let _ = self.registry.remove(ctr.id());
                return Err(e);
            }
        }
        tracing::info!(id = %ctr.id(), name = %ctr.name(), "container registered");

        self.persist_or_warn();
        Ok(ctr)
    }

    /// Resolves a name, id or unique id prefix.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `AmbiguousPrefix`.
    pub fn lookup(&self, id_or_name: &str) -> Result<Arc<Container>> {
        self.registry.resolve(id_or_name)
    }

    /// Returns a snapshot of every registered container.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Container>> {
        self.registry.list()
    }

    /// Refreshes and returns a container's state from the runtime.
    ///
    /// # Errors
    ///
    /// Returns a resolution error or the runtime's error.
    pub fn status(&self, id_or_name: &str) -> Result<ContainerState> {
        let ctr = self.lookup(id_or_name)?;
        self.runtime.update_status(&ctr)
    }

    /// Returns an inspection snapshot, refreshed from the runtime when it
    /// answers.
    ///
    /// # Errors
    ///
    /// Returns a resolution error.
    pub fn inspect(&self, id_or_name: &str) -> Result<ContainerInfo> {
        let ctr = self.lookup(id_or_name)?;
        if let Err(e) = self.runtime.update_status(&ctr) {
            tracing::warn!(id = %ctr.id(), error = %e, "showing last known status");
        }
        let mut info = ctr.info();
        info.storage_directory = self.store.container_directory(ctr.id()).ok();
        Ok(info)
    }

    /// Renames a container.
    ///
    /// # Errors
    ///
    /// Returns a resolution error or `NameTaken`.
    pub fn rename(&self, id_or_name: &str, new_name: &str) -> Result<()> {
        let ctr = self.lookup(id_or_name)?;
        let old = self.registry.rename(ctr.id(), new_name)?;
        if old != new_name {
            tracing::info!(id = %ctr.id(), from = %old, to = %new_name, "container renamed");
            self.persist_or_warn();
        }
        Ok(())
    }

    /// Mounts the container's storage and returns the mount point.
    ///
    /// # Errors
    ///
    /// Returns a resolution or store error.
    pub fn mount(&self, id_or_name: &str) -> Result<PathBuf> {
        let ctr = self.lookup(id_or_name)?;
        self.store.mount(ctr.id())
    }

    /// Unmounts the container's storage.
    ///
    /// # Errors
    ///
    /// Returns a resolution or store error.
    pub fn unmount(&self, id_or_name: &str) -> Result<()> {
        let ctr = self.lookup(id_or_name)?;
        self.store.unmount(ctr.id())
    }

    /// Writes the registry snapshot to the state file, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.config.state_file else {
            return Ok(());
        };
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let records = self.registry.list().iter().map(|c| c.record()).collect();
        state::save_state(path, records)
    }

    /// The registry is authoritative once an operation has committed, so a
    /// failed snapshot is only logged.
    pub(crate) fn persist_or_warn(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "failed to persist supervisor state");
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("runtime", &self.runtime.name())
            .field("containers", &self.registry.len())
            .finish_non_exhaustive()
    }
}
