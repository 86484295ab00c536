//! Persistent state management.
//!
//! Keeps a JSON snapshot of the registry so a restarted supervisor can
//! pick up the containers it was tracking.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stevedore_common::error::{Result, StevedoreError};

use crate::container::ContainerRecord;

/// Current on-disk format version.
pub const STATE_VERSION: u32 = 1;

/// On-disk layout of the state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// Format version.
    pub version: u32,
    /// Every registered container.
    pub containers: Vec<ContainerRecord>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            containers: Vec::new(),
        }
    }
}

/// Loads the state file, or an empty state if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or was written
/// by a newer version.
pub fn load_state(path: &Path) -> Result<StateFile> {
    tracing::debug!(path = %path.display(), "loading state file");
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StateFile::default()),
        Err(e) => return Err(StevedoreError::io(path, e)),
    };
    let state: StateFile = serde_json::from_str(&content)?;
    if state.version > STATE_VERSION {
        return Err(StevedoreError::Config {
            message: format!(
                "state file {} has version {}, newest supported is {STATE_VERSION}",
                path.display(),
                state.version
            ),
        });
    }
    Ok(state)
}

/// Writes the state file atomically through a temporary sibling.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_state(path: &Path, containers: Vec<ContainerRecord>) -> Result<()> {
    tracing::debug!(path = %path.display(), count = containers.len(), "saving state file");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StevedoreError::io(parent, e))?;
    }
    let data = serde_json::to_vec_pretty(&StateFile {
        version: STATE_VERSION,
        containers,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data).map_err(|e| StevedoreError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StevedoreError::io(path, e))
}
