//! The authoritative in-memory table of supervised containers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::ContainerId;

use crate::container::Container;
use crate::index::{IdIndex, NameIndex};

/// Maps ids to container handles and keeps the name and id indices in
/// step with the map.
///
/// Every method takes the registry lock for its whole duration and never
/// performs I/O while holding it. Membership, name reservation and id
/// indexing change together: no caller can observe a registered container
/// whose name is free, or a reserved name without its container.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: Mutex<HashMap<ContainerId, Arc<Container>>>,
    names: NameIndex,
    ids: IdIndex,
}

impl ContainerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a container, reserving its name and indexing its id.
    ///
    /// # Errors
    ///
    /// Returns `NameTaken` or `InvalidId`; in either case nothing stays
    /// reserved.
    pub fn add(&self, ctr: Arc<Container>) -> Result<()> {
        let mut containers = self.lock();
        let id = ctr.id().clone();
        if containers.contains_key(&id) {
            return Err(StevedoreError::InvalidId {
                id: id.to_string(),
                reason: "container is already registered",
            });
        }

        let name = ctr.name();
        self.names.reserve(&name, &id)?;
        if let Err(e) = self.ids.add(&id) {
            let _ = self.names.release(&name);
            return Err(e);
        }
        let _ = containers.insert(id.clone(), ctr);
        tracing::debug!(id = %id, name = %name, "container added to registry");
        Ok(())
    }

    /// Returns the container with this full id.
    #[must_use]
    pub fn get(&self, id: &ContainerId) -> Option<Arc<Container>> {
        self.lock().get(id).cloned()
    }

    /// Resolves a name, full id or unique id prefix. Names win.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing matches and `AmbiguousPrefix` if the
    /// prefix matches several ids.
    pub fn resolve(&self, id_or_name: &str) -> Result<Arc<Container>> {
        let containers = self.lock();
        let id = match self.names.get(id_or_name) {
            Ok(id) => id,
            Err(_) => self.ids.get(id_or_name).map_err(|e| match e {
                StevedoreError::NotFound { .. } => StevedoreError::container_not_found(id_or_name),
                other => other,
            })?,
        };
        containers
            .get(&id)
            .cloned()
            .ok_or_else(|| StevedoreError::container_not_found(id_or_name))
    }

    /// Unregisters a container, releasing its name and id in the same
    /// critical section.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is not registered.
    pub fn remove(&self, id: &ContainerId) -> Result<Arc<Container>> {
        let mut containers = self.lock();
        let ctr = containers
            .remove(id)
            .ok_or_else(|| StevedoreError::container_not_found(id.as_str()))?;

        for name in self.names.names_of(id) {
            if let Err(e) = self.names.release(&name) {
                tracing::warn!(id = %id, name = %name, error = %e, "name release failed");
            }
        }
        if let Err(e) = self.ids.delete(id) {
            tracing::warn!(id = %id, error = %e, "id index removal failed");
        }
        tracing::debug!(id = %id, "container removed from registry");
        Ok(ctr)
    }

    /// Renames a container. Renaming to the current name does nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `NameTaken` if another
    /// container holds the new name.
    pub fn rename(&self, id: &ContainerId, new_name: &str) -> Result<String> {
        let containers = self.lock();
        let ctr = containers
            .get(id)
            .ok_or_else(|| StevedoreError::container_not_found(id.as_str()))?;

        let old_name = ctr.name();
        if old_name == new_name {
            return Ok(old_name);
        }
        self.names.reserve(new_name, id)?;
        if let Err(e) = self.names.release(&old_name) {
            tracing::warn!(id = %id, name = %old_name, error = %e, "old name was not reserved");
        }
        ctr.set_name(new_name.to_string());
        Ok(old_name)
    }

    /// Returns a snapshot of all handles, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Container>> {
        let mut all: Vec<_> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        all
    }

    /// Counts the registered members of `pod_id` other than `except`.
    #[must_use]
    pub fn pod_members(&self, pod_id: &str, except: &ContainerId) -> usize {
        self.lock()
            .values()
            .filter(|c| c.id() != except && c.pod().is_some_and(|p| p.pod_id == pod_id))
            .count()
    }

    /// Returns the number of registered containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether no container is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether `name` is free for a new reservation.
    #[must_use]
    pub fn is_name_free(&self, name: &str) -> bool {
        let _containers = self.lock();
        self.names.is_free(name)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ContainerId, Arc<Container>>> {
        self.containers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use stevedore_common::types::PodRef;

    use super::*;
    use crate::container::ContainerConfig;

    fn ctr(id: &str, name: &str) -> Arc<Container> {
        let config = ContainerConfig {
            bundle_path: PathBuf::from("/bundles").join(id),
            ..ContainerConfig::default()
        };
        Arc::new(Container::new(ContainerId::new(id), name.into(), config).expect("container"))
    }

    #[test]
    fn add_then_resolve_by_name_id_and_prefix() {
        let registry = ContainerRegistry::new();
        registry.add(ctr("abcd1234", "web")).expect("add");
        registry.add(ctr("abcd5678", "db")).expect("add");

        assert_eq!(registry.resolve("web").expect("name").id().as_str(), "abcd1234");
        assert_eq!(registry.resolve("abcd5").expect("prefix").id().as_str(), "abcd5678");
        assert!(matches!(
            registry.resolve("abcd"),
            Err(StevedoreError::AmbiguousPrefix { .. })
        ));
        assert!(registry.resolve("nope").expect_err("missing").is_not_found());
    }

    #[test]
    fn name_lookup_wins_over_id_prefix() {
        let registry = ContainerRegistry::new();
        registry.add(ctr("abcd1234", "other")).expect("add");
        registry.add(ctr("ffff0000", "abcd")).expect("add");
        assert_eq!(registry.resolve("abcd").expect("name").id().as_str(), "ffff0000");
    }

    #[test]
    fn duplicate_name_leaves_nothing_reserved() {
        let registry = ContainerRegistry::new();
        registry.add(ctr("a1", "web")).expect("add");
        let err = registry.add(ctr("b2", "web")).expect_err("taken");
        assert!(matches!(err, StevedoreError::NameTaken { .. }));
        assert!(registry.get(&ContainerId::new("b2")).is_none());
        assert!(registry.resolve("b2").is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalid_id_rolls_back_name() {
        let registry = ContainerRegistry::new();
        let err = registry.add(ctr("bad id", "web")).expect_err("invalid");
        assert!(matches!(err, StevedoreError::InvalidId { .. }));
        assert!(registry.is_name_free("web"));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_frees_name_and_id_together() {
        let registry = ContainerRegistry::new();
        registry.add(ctr("a1", "web")).expect("add");
        let removed = registry.remove(&ContainerId::new("a1")).expect("remove");
        assert_eq!(removed.name(), "web");

        assert!(registry.get(&ContainerId::new("a1")).is_none());
        assert!(registry.is_name_free("web"));
        assert!(registry.resolve("a1").is_err());
        registry.add(ctr("a2", "web")).expect("name reusable");
        assert!(registry.remove(&ContainerId::new("a1")).is_err());
    }

    #[test]
    fn rename_moves_the_reservation() {
        let registry = ContainerRegistry::new();
        registry.add(ctr("a1", "web")).expect("add");
        registry.add(ctr("b2", "db")).expect("add");

        let old = registry.rename(&ContainerId::new("a1"), "frontend").expect("rename");
        assert_eq!(old, "web");
        assert!(registry.is_name_free("web"));
        assert_eq!(registry.resolve("frontend").expect("new").id().as_str(), "a1");

        let err = registry.rename(&ContainerId::new("a1"), "db").expect_err("taken");
        assert!(matches!(err, StevedoreError::NameTaken { .. }));
        assert_eq!(registry.get(&ContainerId::new("a1")).expect("ctr").name(), "frontend");
    }

    #[test]
    fn pod_members_excludes_the_asker() {
        let registry = ContainerRegistry::new();
        let pod = Some(PodRef {
            pod_id: "p1".into(),
            infra: false,
        });
        for (id, name) in [("i1", "infra"), ("m1", "app")] {
            let config = ContainerConfig {
                bundle_path: PathBuf::from("/bundles").join(id),
                pod: pod.clone(),
                ..ContainerConfig::default()
            };
            let c = Container::new(ContainerId::new(id), name.into(), config).expect("ctr");
            registry.add(Arc::new(c)).expect("add");
        }
        assert_eq!(registry.pod_members("p1", &ContainerId::new("i1")), 1);
        assert_eq!(registry.pod_members("p2", &ContainerId::new("i1")), 0);
    }

    #[test]
    fn removed_names_are_claimed_only_after_removal() {
        let registry = Arc::new(ContainerRegistry::new());
        for i in 0..50 {
            registry.add(ctr(&format!("old{i:02}"), &format!("n{i:02}"))).expect("add");
        }

        let claimer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let replacement = ctr(&format!("new{i:02}"), &format!("n{i:02}"));
                    loop {
                        match registry.add(Arc::clone(&replacement)) {
                            Ok(()) => break,
                            Err(e) => {
                                assert!(matches!(e, StevedoreError::NameTaken { .. }), "{e}");
                                std::thread::yield_now();
                            }
                        }
                    }
                }
            })
        };
        for i in 0..50 {
            let _ = registry.remove(&ContainerId::new(format!("old{i:02}"))).expect("remove");
        }
        claimer.join().expect("claimer");

        assert_eq!(registry.len(), 50);
        for i in 0..50 {
            let name = format!("n{i:02}");
            assert_eq!(registry.resolve(&name).expect("claimed").id().as_str(), format!("new{i:02}"));
            assert!(registry.get(&ContainerId::new(format!("old{i:02}"))).is_none());
        }
    }
}
