//! The supervised container handle.
//!
//! Identity and descriptive data are fixed at registration. The name and
//! the runtime status sit behind their own small locks so a handle copied
//! out of the registry can be read and refreshed without the registry lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use stevedore_common::constants;
use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::{ContainerId, ContainerState, PodRef};

/// Everything the caller hands over when a bundle is registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Fixed id; generated when absent.
    pub id: Option<ContainerId>,
    /// Requested name; generated from the id when absent.
    pub name: Option<String>,
    /// Materialized OCI bundle directory.
    pub bundle_path: PathBuf,
    /// Where the monitor writes the container log.
    pub log_path: Option<PathBuf>,
    /// User labels.
    pub labels: BTreeMap<String, String>,
    /// OCI annotations published in the bundle spec.
    pub annotations: BTreeMap<String, String>,
    /// Opaque caller metadata.
    pub metadata: BTreeMap<String, String>,
    /// Whether the container was created with a pseudo-terminal.
    pub terminal: bool,
    /// Pod membership.
    pub pod: Option<PodRef>,
    /// Signal sent on stop, e.g. `SIGQUIT` or `15`.
    pub stop_signal: Option<String>,
}

/// Runtime status as last read back from the OCI runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    /// Lifecycle state.
    pub state: ContainerState,
    /// Init process pid while the container is alive.
    pub pid: Option<i32>,
    /// Exit code from the monitor's exit file.
    pub exit_code: Option<i32>,
    /// Whether the monitor recorded an OOM kill.
    pub oom_killed: bool,
    /// First time the container was seen running.
    pub started_at: Option<DateTime<Utc>>,
    /// When the container was seen stopped.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a container for inspection and listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Container id.
    pub id: ContainerId,
    /// Current name.
    pub name: String,
    /// Bundle directory.
    pub bundle_path: PathBuf,
    /// Log file.
    pub log_path: Option<PathBuf>,
    /// User labels.
    pub labels: BTreeMap<String, String>,
    /// OCI annotations.
    pub annotations: BTreeMap<String, String>,
    /// Opaque caller metadata.
    pub metadata: BTreeMap<String, String>,
    /// Whether a pseudo-terminal is attached.
    pub terminal: bool,
    /// Pod membership.
    pub pod: Option<PodRef>,
    /// Stop signal name.
    pub stop_signal: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last known runtime status.
    #[serde(flatten)]
    pub status: ContainerStatus,
    /// Per-container storage directory, when the store knows it.
    pub storage_directory: Option<PathBuf>,
}

/// Persisted form of a container, written to the state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Container id.
    pub id: ContainerId,
    /// Reserved name.
    pub name: String,
    /// Registration parameters.
    pub config: ContainerConfig,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last known status.
    pub status: ContainerStatus,
}

/// A container known to the supervisor.
#[derive(Debug)]
pub struct Container {
    id: ContainerId,
    name: RwLock<String>,
    config: ContainerConfig,
    stop_signal: Signal,
    created_at: DateTime<Utc>,
    status: Mutex<ContainerStatus>,
}

impl Container {
    /// Builds a handle for a freshly registered container.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the stop signal is not a valid signal.
    pub fn new(id: ContainerId, name: String, config: ContainerConfig) -> Result<Self> {
        let stop_signal = parse_stop_signal(config.stop_signal.as_deref())?;
        Ok(Self {
            id,
            name: RwLock::new(name),
            config: ContainerConfig {
                id: None,
                name: None,
                ..config
            },
            stop_signal,
            created_at: Utc::now(),
            status: Mutex::new(ContainerStatus::default()),
        })
    }

    /// Rebuilds a handle from its persisted record.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the recorded stop signal is invalid.
    pub fn from_record(record: ContainerRecord) -> Result<Self> {
        let mut ctr = Self::new(record.id, record.name, record.config)?;
        ctr.created_at = record.created_at;
        *ctr.status.get_mut().unwrap_or_else(PoisonError::into_inner) = record.status;
        Ok(ctr)
    }

    /// Returns the container id.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Returns the current name.
    #[must_use]
    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name;
    }

    /// Returns the bundle directory.
    #[must_use]
    pub fn bundle_path(&self) -> &Path {
        &self.config.bundle_path
    }

    /// Returns the monitor control file inside the bundle.
    #[must_use]
    pub fn control_path(&self) -> PathBuf {
        self.config.bundle_path.join(constants::CONTROL_FILE_NAME)
    }

    /// Returns whether the container has a pseudo-terminal.
    #[must_use]
    pub const fn terminal(&self) -> bool {
        self.config.terminal
    }

    /// Returns the pod this container belongs to.
    #[must_use]
    pub const fn pod(&self) -> Option<&PodRef> {
        self.config.pod.as_ref()
    }

    /// Returns the signal sent to stop the container.
    #[must_use]
    pub const fn stop_signal(&self) -> Signal {
        self.stop_signal
    }

    /// Returns the labels.
    #[must_use]
    pub const fn labels(&self) -> &BTreeMap<String, String> {
        &self.config.labels
    }

    /// Returns the registration time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns a copy of the last known status.
    #[must_use]
    pub fn status(&self) -> ContainerStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the last known lifecycle state.
    #[must_use]
    pub fn state(&self) -> ContainerState {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Applies a status refresh read back from the runtime.
    pub fn record_status(&self, update: impl FnOnce(&mut ContainerStatus)) -> ContainerState {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut status);
        status.state
    }

    /// Returns an inspection snapshot.
    #[must_use]
    pub fn info(&self) -> ContainerInfo {
        ContainerInfo {
            id: self.id.clone(),
            name: self.name(),
            bundle_path: self.config.bundle_path.clone(),
            log_path: self.config.log_path.clone(),
            labels: self.config.labels.clone(),
            annotations: self.config.annotations.clone(),
            metadata: self.config.metadata.clone(),
            terminal: self.config.terminal,
            pod: self.config.pod.clone(),
            stop_signal: self.stop_signal.as_str().to_string(),
            created_at: self.created_at,
            status: self.status(),
            storage_directory: None,
        }
    }

    /// Returns the persisted form of this container.
    #[must_use]
    pub fn record(&self) -> ContainerRecord {
        ContainerRecord {
            id: self.id.clone(),
            name: self.name(),
            config: self.config.clone(),
            created_at: self.created_at,
            status: self.status(),
        }
    }
}

/// Parses a stop signal given by name (`SIGTERM`, `term`) or number (`15`).
///
/// # Errors
///
/// Returns a `Config` error for anything that is not a known signal.
pub fn parse_stop_signal(raw: Option<&str>) -> Result<Signal> {
    let raw = raw.map_or(constants::DEFAULT_STOP_SIGNAL, str::trim);
    let signal = match raw.parse::<i32>() {
        Ok(number) => Signal::try_from(number).ok(),
        Err(_) => {
            let upper = raw.to_ascii_uppercase();
            let name = if upper.starts_with("SIG") {
                upper
            } else {
                format!("SIG{upper}")
            };
            Signal::from_str(&name).ok()
        }
    };
    signal.ok_or_else(|| StevedoreError::Config {
        message: format!("invalid stop signal {raw:?}"),
    })
}
