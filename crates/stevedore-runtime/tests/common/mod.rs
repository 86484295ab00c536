//! In-memory runtime and store doubles shared by the supervisor tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stevedore_common::config::SupervisorConfig;
use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::{ContainerId, ContainerState};
use stevedore_runtime::{Container, ContainerConfig, ExecRequest, OciRuntime, Supervisor};
use stevedore_storage::ContainerStore;

/// Ordered record of every collaborator call, shared by both doubles.
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Default)]
pub struct FakeRuntime {
    pub calls: CallLog,
    pub states: Mutex<HashMap<ContainerId, ContainerState>>,
    pub fail_stop: AtomicBool,
    pub fail_delete: AtomicBool,
    pub stop_during_exec: AtomicBool,
    pub exec_code: AtomicI32,
}

impl FakeRuntime {
    pub fn set_state(&self, id: &ContainerId, state: ContainerState) {
        let _ = self.states.lock().unwrap().insert(id.clone(), state);
    }

    fn log(&self, call: &str, ctr: &Container) {
        self.calls.lock().unwrap().push(format!("{call}:{}", ctr.id()));
    }

    fn failure(op: &'static str, ctr: &Container) -> StevedoreError {
        StevedoreError::Runtime {
            op,
            id: ctr.id().to_string(),
            message: "injected failure".into(),
        }
    }
}

impl OciRuntime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    fn update_status(&self, ctr: &Container) -> Result<ContainerState> {
        let state = self
            .states
            .lock()
            .unwrap()
            .get(ctr.id())
            .copied()
            .unwrap_or(ContainerState::Created);
        Ok(ctr.record_status(|s| s.state = state))
    }

    fn exec(&self, ctr: &Container, _request: &ExecRequest) -> Result<i32> {
        self.log("exec", ctr);
        if self.stop_during_exec.load(Ordering::SeqCst) {
            self.set_state(ctr.id(), ContainerState::Stopped);
        }
        Ok(self.exec_code.load(Ordering::SeqCst))
    }

    fn delete(&self, ctr: &Container) -> Result<()> {
        self.log("delete", ctr);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::failure("delete", ctr));
        }
        let _ = self.states.lock().unwrap().remove(ctr.id());
        Ok(())
    }

    fn stop(&self, ctr: &Container, _timeout: Duration) -> Result<()> {
        self.log("stop", ctr);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(Self::failure("stop", ctr));
        }
        self.set_state(ctr.id(), ContainerState::Stopped);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeStore {
    pub calls: CallLog,
    root: PathBuf,
    containers: Mutex<HashSet<ContainerId>>,
    pub fail_delete: AtomicBool,
}

impl FakeStore {
    pub fn new(root: &Path, calls: CallLog) -> Self {
        Self {
            calls,
            root: root.to_path_buf(),
            containers: Mutex::new(HashSet::new()),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn contains(&self, id: &ContainerId) -> bool {
        self.containers.lock().unwrap().contains(id)
    }
}

impl ContainerStore for FakeStore {
    fn create_container(&self, id: &ContainerId, _name: &str) -> Result<PathBuf> {
        let _ = self.containers.lock().unwrap().insert(id.clone());
        Ok(self.root.join(id.as_str()))
    }

    fn lookup(&self, name_or_id: &str) -> Result<ContainerId> {
        let id = ContainerId::new(name_or_id);
        if self.contains(&id) {
            Ok(id)
        } else {
            Err(StevedoreError::container_not_found(name_or_id))
        }
    }

    fn mount(&self, id: &ContainerId) -> Result<PathBuf> {
        Ok(self.root.join(id.as_str()).join("merged"))
    }

    fn unmount(&self, _id: &ContainerId) -> Result<()> {
        Ok(())
    }

    fn delete_container_storage(&self, id: &ContainerId) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("storage-delete:{id}"));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StevedoreError::Storage {
                op: "delete",
                id: id.to_string(),
                message: "injected failure".into(),
            });
        }
        let _ = self.containers.lock().unwrap().remove(id);
        Ok(())
    }

    fn container_directory(&self, id: &ContainerId) -> Result<PathBuf> {
        if self.contains(id) {
            Ok(self.root.join(id.as_str()))
        } else {
            Err(StevedoreError::container_not_found(id.as_str()))
        }
    }
}

/// A supervisor over the doubles, rooted in a temporary directory.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub runtime: Arc<FakeRuntime>,
    pub store: Arc<FakeStore>,
    pub calls: CallLog,
    pub supervisor: Supervisor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_state_file(false)
    }

    pub fn with_state_file(persist: bool) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = SupervisorConfig::rooted_at(dir.path());
        if persist {
            config.state_file = Some(dir.path().join("state.json"));
        }
        Self::over(dir, config)
    }

    pub fn over(dir: tempfile::TempDir, config: SupervisorConfig) -> Self {
        let calls = CallLog::default();
        let runtime = Arc::new(FakeRuntime {
            calls: Arc::clone(&calls),
            ..FakeRuntime::default()
        });
        let store = Arc::new(FakeStore::new(&dir.path().join("storage"), Arc::clone(&calls)));
        let supervisor = Supervisor::new(
            config,
            Arc::clone(&runtime) as Arc<dyn OciRuntime>,
            Arc::clone(&store) as Arc<dyn ContainerStore>,
        );
        Self {
            dir,
            runtime,
            store,
            calls,
            supervisor,
        }
    }

    /// Drops the supervisor and builds a fresh one over the same doubles
    /// and configuration, without loading state.
    pub fn reopen(self) -> Self {
        let config = self.supervisor.config().clone();
        let supervisor = Supervisor::new(
            config,
            Arc::clone(&self.runtime) as Arc<dyn OciRuntime>,
            Arc::clone(&self.store) as Arc<dyn ContainerStore>,
        );
        Self { supervisor, ..self }
    }

    /// Creates a bundle directory and a config pointing at it.
    pub fn config(&self, name: &str) -> ContainerConfig {
        let bundle = self.dir.path().join("bundles").join(name);
        std::fs::create_dir_all(&bundle).expect("bundle");
        ContainerConfig {
            name: Some(name.to_string()),
            bundle_path: bundle,
            ..ContainerConfig::default()
        }
    }

    pub fn register(&self, name: &str) -> Arc<Container> {
        self.supervisor.register(self.config(name)).expect("register")
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}
