//! Store collaborator interface.

use std::path::PathBuf;

use stevedore_common::error::Result;
use stevedore_common::types::ContainerId;

/// Content-addressed container storage as seen by the supervisor.
///
/// The supervisor does not assume exclusive access: implementations must
/// report an already deleted container as success from
/// [`delete_container_storage`](Self::delete_container_storage).
pub trait ContainerStore: Send + Sync {
    /// Creates the layer for a newly registered container and returns its
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the container already exists or the
    /// layer cannot be created.
    fn create_container(&self, id: &ContainerId, name: &str) -> Result<PathBuf>;

    /// Resolves a container name or id known to the store to its full id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the store has no such container.
    fn lookup(&self, name_or_id: &str) -> Result<ContainerId>;

    /// Mounts the container's root filesystem and returns the mount point.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the layer is missing or cannot be mounted.
    fn mount(&self, id: &ContainerId) -> Result<PathBuf>;

    /// Releases one mount of the container's root filesystem.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the layer is missing.
    fn unmount(&self, id: &ContainerId) -> Result<()>;

    /// Deletes the container's layer and metadata.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the data exists but cannot be removed.
    fn delete_container_storage(&self, id: &ContainerId) -> Result<()>;

    /// Returns the per-container directory for supervisor-owned files.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the store has no such container.
    fn container_directory(&self, id: &ContainerId) -> Result<PathBuf>;
}
