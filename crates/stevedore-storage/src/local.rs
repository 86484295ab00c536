//! Directory-backed container store.
//!
//! Layout under the root:
//!
//! ```text
//! containers/<id>/meta.json   name, creation time, mount count
//! containers/<id>/rootfs/     the container's writable layer
//! containers/<id>/userdata/   supervisor-owned per-container files
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::ContainerId;

use crate::store::ContainerStore;

const META_FILE: &str = "meta.json";

/// Metadata kept next to each container layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerMeta {
    id: ContainerId,
    name: String,
    created_at: String,
    #[serde(default)]
    mount_count: u32,
}

/// Manages per-container layers in a local directory tree.
#[derive(Debug)]
pub struct LocalStore {
    /// Root directory for all stored data.
    root: PathBuf,
    /// Serializes read-modify-write cycles on metadata files.
    meta_lock: Mutex<()>,
}

impl LocalStore {
    /// Opens or initializes the store at the given root.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let containers = root.join("containers");
        std::fs::create_dir_all(&containers).map_err(|e| StevedoreError::io(&containers, e))?;
        tracing::info!(path = %root.display(), "opened container store");
        Ok(Self {
            root,
            meta_lock: Mutex::new(()),
        })
    }

    /// Returns the root storage path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory holding a container's layer and metadata.
    #[must_use]
    pub fn layer_path(&self, id: &ContainerId) -> PathBuf {
        self.root.join("containers").join(id.as_str())
    }

    /// Checks whether a container layer exists.
    #[must_use]
    pub fn has_container(&self, id: &ContainerId) -> bool {
        self.layer_path(id).join(META_FILE).exists()
    }

    fn read_meta(&self, id: &ContainerId) -> Result<LayerMeta> {
        let path = self.layer_path(id).join(META_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StevedoreError::NotFound {
                    kind: "container storage",
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(storage_error("read metadata", id, &e.to_string())),
        };
        serde_json::from_str(&content)
            .map_err(|e| storage_error("read metadata", id, &e.to_string()))
    }

    fn write_meta(&self, meta: &LayerMeta) -> Result<()> {
        let path = self.layer_path(&meta.id).join(META_FILE);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(meta)?;
        std::fs::write(&tmp, data)
            .and_then(|()| std::fs::rename(&tmp, &path))
            .map_err(|e| storage_error("write metadata", &meta.id, &e.to_string()))
    }

    fn scan_by_name(&self, name: &str) -> Result<Option<ContainerId>> {
        let containers = self.root.join("containers");
        let entries =
            std::fs::read_dir(&containers).map_err(|e| StevedoreError::io(&containers, e))?;
        for entry in entries.flatten() {
            let id = ContainerId::new(entry.file_name().to_string_lossy());
            match self.read_meta(&id) {
                Ok(meta) if meta.name == name => return Ok(Some(meta.id)),
                Ok(_) => {}
                Err(e) => tracing::warn!(id = %id, error = %e, "skipping unreadable layer"),
            }
        }
        Ok(None)
    }
}

impl ContainerStore for LocalStore {
    fn create_container(&self, id: &ContainerId, name: &str) -> Result<PathBuf> {
        let _guard = self.meta_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.has_container(id) {
            return Err(storage_error("create", id, "container already exists"));
        }

        let dir = self.layer_path(id);
        for sub in ["rootfs", "userdata"] {
            let path = dir.join(sub);
            std::fs::create_dir_all(&path)
                .map_err(|e| storage_error("create", id, &format!("{}: {e}", path.display())))?;
        }
        self.write_meta(&LayerMeta {
            id: id.clone(),
            name: name.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            mount_count: 0,
        })?;

        tracing::debug!(id = %id, name, "container layer created");
        Ok(dir)
    }

    fn lookup(&self, name_or_id: &str) -> Result<ContainerId> {
        let as_id = ContainerId::new(name_or_id);
        if !name_or_id.is_empty() && self.has_container(&as_id) {
            return Ok(as_id);
        }
        self.scan_by_name(name_or_id)?
            .ok_or_else(|| StevedoreError::NotFound {
                kind: "container storage",
                id: name_or_id.to_string(),
            })
    }

    fn mount(&self, id: &ContainerId) -> Result<PathBuf> {
        let _guard = self.meta_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut meta = self.read_meta(id)?;
        let rootfs = self.layer_path(id).join("rootfs");
        std::fs::create_dir_all(&rootfs)
            .map_err(|e| storage_error("mount", id, &e.to_string()))?;
        meta.mount_count = meta.mount_count.saturating_add(1);
        self.write_meta(&meta)?;
        tracing::debug!(id = %id, mounts = meta.mount_count, "layer mounted");
        Ok(rootfs)
    }

    fn unmount(&self, id: &ContainerId) -> Result<()> {
        let _guard = self.meta_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut meta = self.read_meta(id)?;
        if meta.mount_count == 0 {
            tracing::debug!(id = %id, "unmount of an unmounted layer");
            return Ok(());
        }
        meta.mount_count -= 1;
        self.write_meta(&meta)?;
        tracing::debug!(id = %id, mounts = meta.mount_count, "layer unmounted");
        Ok(())
    }

    fn delete_container_storage(&self, id: &ContainerId) -> Result<()> {
        let _guard = self.meta_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = self.layer_path(id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(id = %id, "container storage deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(id = %id, "container storage already gone");
                Ok(())
            }
            Err(e) => Err(storage_error("delete", id, &e.to_string())),
        }
    }

    fn container_directory(&self, id: &ContainerId) -> Result<PathBuf> {
        if !self.has_container(id) {
            return Err(StevedoreError::NotFound {
                kind: "container storage",
                id: id.to_string(),
            });
        }
        Ok(self.layer_path(id).join("userdata"))
    }
}

fn storage_error(op: &'static str, id: &ContainerId, message: &str) -> StevedoreError {
    StevedoreError::Storage {
        op,
        id: id.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::open(dir.path()).expect("open");
        (dir, store)
    }

    #[test]
    fn open_returns_correct_root() {
        let (dir, store) = store();
        assert_eq!(store.root(), dir.path());
        assert!(dir.path().join("containers").is_dir());
    }

    #[test]
    fn lookup_by_id_and_by_name() {
        let (_dir, store) = store();
        let id = ContainerId::new("abc123");
        let _ = store.create_container(&id, "web").expect("create");

        assert_eq!(store.lookup("abc123").expect("by id"), id);
        assert_eq!(store.lookup("web").expect("by name"), id);
        assert!(store.lookup("db").expect_err("missing").is_not_found());
    }

    #[test]
    fn create_twice_fails() {
        let (_dir, store) = store();
        let id = ContainerId::new("abc123");
        let _ = store.create_container(&id, "web").expect("create");
        let err = store.create_container(&id, "web").expect_err("duplicate");
        assert!(matches!(err, StevedoreError::Storage { op: "create", .. }));
    }

    #[test]
    fn mount_counts_are_tracked() {
        let (_dir, store) = store();
        let id = ContainerId::new("m1");
        let _ = store.create_container(&id, "m").expect("create");

        let rootfs = store.mount(&id).expect("mount");
        assert!(rootfs.ends_with("containers/m1/rootfs"));
        let _ = store.mount(&id).expect("mount again");
        assert_eq!(store.read_meta(&id).expect("meta").mount_count, 2);

        store.unmount(&id).expect("unmount");
        store.unmount(&id).expect("unmount");
        store.unmount(&id).expect("extra unmount is harmless");
        assert_eq!(store.read_meta(&id).expect("meta").mount_count, 0);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = store();
        let id = ContainerId::new("d1");
        let _ = store.create_container(&id, "d").expect("create");

        store.delete_container_storage(&id).expect("delete");
        assert!(!store.has_container(&id));
        store
            .delete_container_storage(&id)
            .expect("second delete must not fail");
    }

    #[test]
    fn container_directory_requires_existing_layer() {
        let (_dir, store) = store();
        let id = ContainerId::new("u1");
        assert!(store.container_directory(&id).is_err());
        let _ = store.create_container(&id, "u").expect("create");
        let dir = store.container_directory(&id).expect("dir");
        assert!(dir.ends_with("containers/u1/userdata"));
        assert!(dir.is_dir());
    }

    #[test]
    fn mount_of_unknown_container_is_not_found() {
        let (_dir, store) = store();
        let err = store.mount(&ContainerId::new("nope")).expect_err("missing");
        assert!(err.is_not_found());
    }
}
