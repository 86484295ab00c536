//! Global configuration model for the Stevedore supervisor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, StevedoreError};

/// Root configuration for the container supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Low-level OCI runtime binary.
    pub runtime_path: PathBuf,
    /// Optional `--root` passed to every runtime invocation.
    pub runtime_root: Option<PathBuf>,
    /// Directory holding `<id>/attach` monitor sockets.
    pub attach_socket_dir: PathBuf,
    /// Directory where the monitor writes `<id>` exit status files.
    pub exits_dir: PathBuf,
    /// Root of the on-disk container store.
    pub storage_root: PathBuf,
    /// Persisted registry snapshot; `None` keeps state in memory only.
    pub state_file: Option<PathBuf>,
    /// Grace period of the forced stop performed by remove.
    pub stop_timeout_secs: u64,
    /// Default detach key sequence.
    pub detach_keys: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            runtime_path: which::which(constants::DEFAULT_RUNTIME)
                .unwrap_or_else(|_| PathBuf::from(constants::DEFAULT_RUNTIME_PATH)),
            runtime_root: None,
            attach_socket_dir: constants::default_attach_socket_dir(),
            exits_dir: constants::default_exits_dir(),
            storage_root: constants::default_storage_root(),
            state_file: Some(constants::default_state_file()),
            stop_timeout_secs: constants::DEFAULT_STOP_TIMEOUT_SECS,
            detach_keys: constants::DEFAULT_DETACH_KEYS.to_string(),
        }
    }
}

impl SupervisorConfig {
    /// Loads the configuration from a JSON file, or returns the defaults if
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(StevedoreError::io(path, e)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the supervisor cannot work with.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.runtime_path.as_os_str().is_empty() {
            return Err(StevedoreError::Config {
                message: "runtime_path must not be empty".into(),
            });
        }
        if self.stop_timeout_secs == 0 {
            return Err(StevedoreError::Config {
                message: "stop_timeout_secs must be greater than zero".into(),
            });
        }
        let _ = crate::keys::parse_detach_keys(&self.detach_keys)?;
        Ok(())
    }

    /// Returns the stop grace period as a duration.
    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Returns the attach socket path for a container.
    #[must_use]
    pub fn attach_socket_path(&self, id: &str) -> PathBuf {
        self.attach_socket_dir
            .join(id)
            .join(constants::ATTACH_SOCKET_NAME)
    }

    /// Returns the exit status file path for a container.
    #[must_use]
    pub fn exit_file_path(&self, id: &str) -> PathBuf {
        self.exits_dir.join(id)
    }

    /// Returns a configuration rooted entirely under `dir`, with no state
    /// file. Used by tests and throwaway sessions.
    #[must_use]
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            runtime_path: PathBuf::from(constants::DEFAULT_RUNTIME_PATH),
            runtime_root: None,
            attach_socket_dir: dir.join("attach"),
            exits_dir: dir.join("exits"),
            storage_root: dir.join("storage"),
            state_file: None,
            stop_timeout_secs: constants::DEFAULT_STOP_TIMEOUT_SECS,
            detach_keys: constants::DEFAULT_DETACH_KEYS.to_string(),
        }
    }
}
