//! Container removal.
//!
//! Steps run in a fixed order and abort on the first blocking failure up to
//! the runtime delete. From there on the removal only moves forward: the
//! registry entry, name and id go together, and a storage cleanup failure
//! is reported without bringing the container back.

use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::{ContainerId, ContainerState};

use crate::supervisor::Supervisor;

impl Supervisor {
    /// Removes a container and returns its id.
    ///
    /// Any container the runtime does not report as stopped is only removed
    /// with `force`, after a stop bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// - `NotFound`/`AmbiguousPrefix` if the reference does not resolve.
    /// - `PodInUse` for a pod infra container with live members.
    /// - `ContainerRunning` for a live container without `force`.
    /// - The stop, status or delete error from the runtime; the container
    ///   stays registered.
    /// - An `Io` error removing the exit file; the container stays
    ///   registered.
    /// - A `Storage` error after the container is already unregistered.
    pub fn remove(&self, id_or_name: &str, force: bool) -> Result<ContainerId> {
        let ctr = self.lookup(id_or_name)?;
        let id = ctr.id().clone();

        if let Some(pod) = ctr.pod().filter(|p| p.infra) {
            let members = self.registry.pod_members(&pod.pod_id, &id);
            if members > 0 {
                return Err(StevedoreError::PodInUse {
                    id: id.to_string(),
                    pod: pod.pod_id.clone(),
                    members,
                });
            }
        }

        let state = self.runtime.update_status(&ctr)?;
        if state != ContainerState::Stopped {
            if !force {
                return Err(StevedoreError::ContainerRunning {
                    id: id.to_string(),
                    state,
                });
            }
            tracing::info!(id = %id, state = %state, "stopping container before removal");
            self.runtime.stop(&ctr, self.config.stop_timeout())?;
        }

        self.runtime.delete(&ctr)?;

        let exit_file = self.config.exit_file_path(id.as_str());
        match std::fs::remove_file(&exit_file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StevedoreError::io(&exit_file, e)),
        }

        let _ = self.registry.remove(&id)?;
        let storage = self.store.delete_container_storage(&id);
        self.persist_or_warn();

        match storage {
            Ok(()) => {
                tracing::info!(id = %id, "container removed");
                Ok(id)
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "container removed but its storage was left behind");
                Err(e)
            }
        }
    }
}
