//! Unified error taxonomy for the Stevedore workspace.
//!
//! Runtime and store failures are wrapped with the operation and container
//! id so they can be logged usefully; the supervisor never retries them.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ContainerState;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StevedoreError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or request argument is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// No container, name, or id prefix matched.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// An id prefix matched more than one container.
    #[error("id prefix {prefix:?} is ambiguous")]
    AmbiguousPrefix {
        /// The offending prefix.
        prefix: String,
    },

    /// The name is already reserved by another container.
    #[error("name {name:?} is already reserved for container {holder}")]
    NameTaken {
        /// Requested name.
        name: String,
        /// Container currently holding the name.
        holder: String,
    },

    /// The name is not held by anyone.
    #[error("name {name:?} is not reserved")]
    NameNotReserved {
        /// Name that was expected to be reserved.
        name: String,
    },

    /// The id cannot be stored in the id index.
    #[error("invalid container id {id:?}: {reason}")]
    InvalidId {
        /// The rejected id.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The container is not in a state that allows attaching.
    #[error("container {id} is {state}, cannot attach")]
    NotAttachable {
        /// Container id.
        id: String,
        /// State reported by the runtime.
        state: ContainerState,
    },

    /// The container was created without a pseudo-terminal.
    #[error("container {id} was not created with a terminal")]
    NoTty {
        /// Container id.
        id: String,
    },

    /// The operation requires a running container.
    #[error("container {id} is not running (state: {state})")]
    NotRunning {
        /// Container id.
        id: String,
        /// State reported by the runtime.
        state: ContainerState,
    },

    /// The container is paused and must be unpaused first.
    #[error("container {id} is paused, unpause it first")]
    ContainerPaused {
        /// Container id.
        id: String,
    },

    /// Removal of a live container requires force.
    #[error("container {id} is {state}, stop it first or force removal")]
    ContainerRunning {
        /// Container id.
        id: String,
        /// State reported by the runtime.
        state: ContainerState,
    },

    /// The container holds namespaces still shared by other pod members.
    #[error("container {id} is the infra container of pod {pod} still used by {members} container(s)")]
    PodInUse {
        /// Container id.
        id: String,
        /// Pod id.
        pod: String,
        /// Number of other registered members.
        members: usize,
    },

    /// The low-level OCI runtime failed.
    #[error("runtime {op} failed for container {id}: {message}")]
    Runtime {
        /// Runtime operation (`state`, `delete`, `exec`, `kill`).
        op: &'static str,
        /// Container id.
        id: String,
        /// Failure detail, usually the runtime's stderr.
        message: String,
    },

    /// The content store failed.
    #[error("storage {op} failed for container {id}: {message}")]
    Storage {
        /// Store operation.
        op: &'static str,
        /// Container id.
        id: String,
        /// Failure detail.
        message: String,
    },

    /// The user typed the detach sequence. Not a failure.
    #[error("detached from container")]
    DetachedByUser,

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl StevedoreError {
    /// Returns whether this is the detach sentinel rather than a failure.
    #[must_use]
    pub const fn is_detach(&self) -> bool {
        matches!(self, Self::DetachedByUser)
    }

    /// Returns whether this reports a missing container, name, or prefix.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Builds a [`StevedoreError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds a `NotFound` error for a container reference.
    pub fn container_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "container",
            id: id.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StevedoreError>;
