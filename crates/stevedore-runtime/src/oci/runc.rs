//! `runc`-compatible command-line runtime.
//!
//! Every call is one short subprocess. The runtime's JSON `state` output is
//! decoded for status and pid; the monitor's exit file supplies the exit
//! code once the container has stopped.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use nix::sys::signal::Signal;
use serde::Deserialize;
use stevedore_common::config::SupervisorConfig;
use stevedore_common::constants;
use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::ContainerState;

use super::OciRuntime;
use crate::container::Container;
use crate::exec::ExecRequest;

/// Messages a runtime prints when it has no record of the container.
const VANISHED_MARKERS: [&str; 2] = ["does not exist", "No such file or directory"];

/// Name of the file the monitor creates in the bundle after an OOM kill.
const OOM_FILE_NAME: &str = "oom";

/// The subset of `runc state` output the supervisor reads.
#[derive(Debug, Deserialize)]
struct RuntimeState {
    status: String,
    #[serde(default)]
    pid: i32,
}

/// Drives an OCI runtime binary through its command-line interface.
#[derive(Debug, Clone)]
pub struct RuncRuntime {
    path: PathBuf,
    root: Option<PathBuf>,
    exits_dir: PathBuf,
    poll_interval: Duration,
    kill_timeout: Duration,
}

impl RuncRuntime {
    /// Creates an adapter for the binary at `path`.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        root: Option<PathBuf>,
        exits_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            path: path.into(),
            root,
            exits_dir: exits_dir.into(),
            poll_interval: Duration::from_millis(constants::STOP_POLL_INTERVAL_MS),
            kill_timeout: Duration::from_secs(constants::KILL_TIMEOUT_SECS),
        }
    }

    /// Creates an adapter from the supervisor configuration.
    #[must_use]
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(
            &config.runtime_path,
            config.runtime_root.clone(),
            &config.exits_dir,
        )
    }

    /// Overrides how long to wait for a container to die after `SIGKILL`.
    #[must_use]
    pub const fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    /// Returns the runtime binary path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.path);
        if let Some(root) = &self.root {
            let _ = cmd.arg("--root").arg(root);
        }
        cmd
    }

    fn output(&self, op: &'static str, ctr: &Container, args: &[&str]) -> Result<Output> {
        tracing::debug!(runtime = %self.path.display(), op, args = ?args, "invoking runtime");
        self.command()
            .args(args)
            .output()
            .map_err(|e| runtime_error(op, ctr, &format!("{}: {e}", self.path.display())))
    }

    fn kill(&self, ctr: &Container, signal: Signal) -> Result<()> {
        let id = ctr.id().as_str();
        let output = if signal == Signal::SIGKILL {
            self.output("kill", ctr, &["kill", "--all", id, "KILL"])?
        } else {
            self.output("kill", ctr, &["kill", id, signal.as_str()])?
        };
        if output.status.success() {
            tracing::debug!(id = %ctr.id(), signal = %signal, "signal sent");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_vanished(&stderr) {
            tracing::debug!(id = %ctr.id(), "kill of a vanished container");
            return Ok(());
        }
        Err(runtime_error("kill", ctr, stderr.trim()))
    }

    /// A frozen container only receives signals once thawed, so it is sent
    /// `SIGKILL` and resumed.
    fn kill_paused(&self, ctr: &Container) -> Result<()> {
        tracing::info!(id = %ctr.id(), "killing paused container");
        self.kill(ctr, Signal::SIGKILL)?;

        let output = self.output("resume", ctr, &["resume", ctr.id().as_str()])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(id = %ctr.id(), stderr = %stderr.trim(), "resume after kill failed");
        }

        if self.wait_stopped(ctr, self.kill_timeout)? {
            tracing::info!(id = %ctr.id(), "container killed");
            return Ok(());
        }
        Err(runtime_error("kill", ctr, "paused container still alive after SIGKILL"))
    }

    /// Polls until the container is stopped or `timeout` passes.
    fn wait_stopped(&self, ctr: &Container, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.update_status(ctr)? == ContainerState::Stopped {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    fn read_exit_file(&self, ctr: &Container) -> Result<Option<(i32, DateTime<Utc>)>> {
        let path = self.exits_dir.join(ctr.id().as_str());
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(id = %ctr.id(), path = %path.display(), "container exit file not found");
                return Ok(None);
            }
            Err(e) => return Err(StevedoreError::io(&path, e)),
        };
        let code = content.trim().parse::<i32>().map_err(|e| {
            runtime_error("state", ctr, &format!("bad exit file {}: {e}", path.display()))
        })?;
        let finished = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);
        Ok(Some((code, finished)))
    }
}

impl OciRuntime for RuncRuntime {
    fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(constants::DEFAULT_RUNTIME)
    }

    fn update_status(&self, ctr: &Container) -> Result<ContainerState> {
        let output = self.output("state", ctr, &["state", ctr.id().as_str()])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_vanished(&stderr) {
                tracing::warn!(id = %ctr.id(), "runtime has no record of the container, treating it as stopped");
                return Ok(ctr.record_status(|s| {
                    s.state = ContainerState::Stopped;
                    s.pid = None;
                    if s.finished_at.is_none() {
                        s.finished_at = Some(Utc::now());
                    }
                }));
            }
            return Err(runtime_error("state", ctr, stderr.trim()));
        }

        let reported: RuntimeState = serde_json::from_slice(&output.stdout)
            .map_err(|e| runtime_error("state", ctr, &format!("cannot decode state: {e}")))?;
        let observed = ContainerState::from_runtime_status(&reported.status);
        let exit = if observed == ContainerState::Stopped {
            self.read_exit_file(ctr)?
        } else {
            None
        };
        let oom_killed = ctr.bundle_path().join(OOM_FILE_NAME).exists();

        let state = ctr.record_status(|s| {
            s.state = observed;
            s.pid = (reported.pid > 0 && observed != ContainerState::Stopped).then_some(reported.pid);
            s.oom_killed = oom_killed;
            if observed == ContainerState::Running && s.started_at.is_none() {
                s.started_at = Some(Utc::now());
            }
            if observed == ContainerState::Stopped {
                if let Some((code, finished)) = exit {
                    s.exit_code = Some(code);
                    s.finished_at = Some(finished);
                } else if s.finished_at.is_none() {
                    s.finished_at = Some(Utc::now());
                }
            }
        });
        tracing::debug!(id = %ctr.id(), state = %state, "status refreshed");
        Ok(state)
    }

    fn exec(&self, ctr: &Container, request: &ExecRequest) -> Result<i32> {
        let mut cmd = self.command();
        let _ = cmd.arg("exec");
        if request.tty {
            let _ = cmd.arg("--tty");
        }
        if request.detach {
            let _ = cmd.arg("--detach");
        }
        for env in &request.env {
            let _ = cmd.arg("--env").arg(env);
        }
        if let Some(user) = &request.user {
            let _ = cmd.arg("--user").arg(user);
        }
        let _ = cmd.arg(ctr.id().as_str()).args(&request.command);

        tracing::info!(id = %ctr.id(), command = ?request.command, tty = request.tty, "exec in container");
        let status = cmd
            .status()
            .map_err(|e| runtime_error("exec", ctr, &format!("{}: {e}", self.path.display())))?;
        let code = status
            .code()
            .or_else(|| status.signal().map(|sig| 128 + sig))
            .unwrap_or(-1);
        tracing::debug!(id = %ctr.id(), code, "exec finished");
        Ok(code)
    }

    fn delete(&self, ctr: &Container) -> Result<()> {
        let output = self.output("delete", ctr, &["delete", ctr.id().as_str()])?;
        if output.status.success() {
            tracing::debug!(id = %ctr.id(), "runtime state deleted");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_vanished(&stderr) {
            tracing::debug!(id = %ctr.id(), "runtime state already gone");
            return Ok(());
        }
        Err(runtime_error("delete", ctr, stderr.trim()))
    }

    fn stop(&self, ctr: &Container, timeout: Duration) -> Result<()> {
        match self.update_status(ctr)? {
            ContainerState::Stopped => return Ok(()),
            ContainerState::Paused => return self.kill_paused(ctr),
            _ => {}
        }

        let signal = ctr.stop_signal();
        self.kill(ctr, signal)?;
        if self.wait_stopped(ctr, timeout)? {
            tracing::info!(id = %ctr.id(), signal = %signal, "container stopped");
            return Ok(());
        }

        tracing::warn!(id = %ctr.id(), timeout_secs = timeout.as_secs(), "stop timed out, sending SIGKILL");
        self.kill(ctr, Signal::SIGKILL)?;
        if self.wait_stopped(ctr, self.kill_timeout)? {
            tracing::info!(id = %ctr.id(), "container killed");
            return Ok(());
        }
        Err(runtime_error("kill", ctr, "container still running after SIGKILL"))
    }
}

fn is_vanished(stderr: &str) -> bool {
    VANISHED_MARKERS.iter().any(|m| stderr.contains(m))
}

fn runtime_error(op: &'static str, ctr: &Container, message: &str) -> StevedoreError {
    StevedoreError::Runtime {
        op,
        id: ctr.id().to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use stevedore_common::types::ContainerId;

    use super::*;
    use crate::container::ContainerConfig;

    /// A shell stand-in for runc. Its container exists while `status`
    /// exists next to it; every invocation is appended to `calls`.
    const FAKE_RUNTIME: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
echo "$@" >> "$dir/calls"
if [ "$1" = "--root" ]; then shift 2; fi
for last; do :; done
case "$1" in
state)
    if [ ! -f "$dir/status" ]; then echo "container \"$2\" does not exist" >&2; exit 1; fi
    printf '{"ociVersion":"1.0.2","id":"%s","pid":4242,"status":"%s"}' "$2" "$(cat "$dir/status")"
    ;;
delete)
    if [ ! -f "$dir/status" ]; then echo "container \"$2\" does not exist" >&2; exit 1; fi
    case "$(cat "$dir/status")" in
    running|paused) echo "cannot delete container $2 that is not stopped: $(cat "$dir/status")" >&2; exit 1 ;;
    esac
    rm -f "$dir/status"
    ;;
resume)
    if [ -f "$dir/frozen-kill" ]; then echo stopped > "$dir/status"; rm -f "$dir/frozen-kill"; fi
    ;;
kill)
    if [ ! -f "$dir/status" ]; then echo "container does not exist" >&2; exit 1; fi
    if [ "$(cat "$dir/status")" = "paused" ]; then
        if [ "$last" = "KILL" ]; then touch "$dir/frozen-kill"; fi
    elif [ "$last" = "KILL" ] || [ ! -f "$dir/ignore-term" ]; then
        echo stopped > "$dir/status"
    fi
    ;;
exec)
    exit "$(cat "$dir/exec-exit" 2>/dev/null || echo 0)"
    ;;
esac
"#;

    struct Fixture {
        dir: tempfile::TempDir,
        runtime: RuncRuntime,
        ctr: Container,
    }

    impl Fixture {
        fn new(status: Option<&str>) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let script = dir.path().join("fake-runc");
            std::fs::write(&script, FAKE_RUNTIME).expect("write script");
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("chmod");
            if let Some(status) = status {
                std::fs::write(dir.path().join("status"), status).expect("status");
            }
            let exits = dir.path().join("exits");
            std::fs::create_dir_all(&exits).expect("exits");
            let bundle = dir.path().join("bundle");
            std::fs::create_dir_all(&bundle).expect("bundle");

            let runtime = RuncRuntime::new(&script, None, &exits)
                .with_kill_timeout(Duration::from_secs(2));
            let config = ContainerConfig {
                bundle_path: bundle,
                ..ContainerConfig::default()
            };
            let ctr = Container::new(ContainerId::new("c1"), "web".into(), config).expect("ctr");
            Self { dir, runtime, ctr }
        }

        fn touch(&self, name: &str) {
            std::fs::write(self.dir.path().join(name), "").expect("touch");
        }

        fn calls(&self) -> Vec<String> {
            std::fs::read_to_string(self.dir.path().join("calls"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn running_state_is_decoded() {
        let fx = Fixture::new(Some("running"));
        let state = fx.runtime.update_status(&fx.ctr).expect("status");
        assert_eq!(state, ContainerState::Running);
        let status = fx.ctr.status();
        assert_eq!(status.pid, Some(4242));
        assert!(status.started_at.is_some());
        assert_eq!(fx.calls(), vec!["state c1"]);
    }

    #[test]
    fn vanished_container_is_stopped_not_an_error() {
        let fx = Fixture::new(None);
        let state = fx.runtime.update_status(&fx.ctr).expect("status");
        assert_eq!(state, ContainerState::Stopped);
        assert!(fx.ctr.status().finished_at.is_some());
    }

    #[test]
    fn stopped_state_reads_exit_file() {
        let fx = Fixture::new(Some("stopped"));
        std::fs::write(fx.dir.path().join("exits").join("c1"), "137\n").expect("exit file");
        fx.touch("bundle/oom");

        let _ = fx.runtime.update_status(&fx.ctr).expect("status");
        let status = fx.ctr.status();
        assert_eq!(status.exit_code, Some(137));
        assert!(status.oom_killed);
        assert_eq!(status.pid, None);
    }

    #[test]
    fn missing_exit_file_leaves_code_unknown() {
        let fx = Fixture::new(Some("stopped"));
        let _ = fx.runtime.update_status(&fx.ctr).expect("status");
        assert_eq!(fx.ctr.status().exit_code, None);
    }

    #[test]
    fn root_flag_precedes_subcommand() {
        let fx = Fixture::new(Some("created"));
        let runtime = RuncRuntime::new(
            fx.runtime.path(),
            Some(PathBuf::from("/run/alt")),
            fx.dir.path().join("exits"),
        );
        assert_eq!(runtime.update_status(&fx.ctr).expect("status"), ContainerState::Created);
        assert_eq!(fx.calls(), vec!["--root /run/alt state c1"]);
    }

    #[test]
    fn delete_twice_does_not_fail() {
        let fx = Fixture::new(Some("stopped"));
        fx.runtime.delete(&fx.ctr).expect("first delete");
        fx.runtime.delete(&fx.ctr).expect("second delete");
        assert_eq!(fx.calls(), vec!["delete c1", "delete c1"]);
    }

    #[test]
    fn delete_of_live_container_is_refused() {
        for live in ["running", "paused"] {
            let fx = Fixture::new(Some(live));
            let err = fx.runtime.delete(&fx.ctr).expect_err("refused");
            assert!(matches!(err, StevedoreError::Runtime { op: "delete", .. }));
            assert_eq!(fx.calls(), vec!["delete c1"]);
        }
    }

    #[test]
    fn stop_of_paused_container_kills_then_resumes() {
        let fx = Fixture::new(Some("paused"));
        fx.runtime
            .stop(&fx.ctr, Duration::from_secs(1))
            .expect("stop");
        let calls = fx.calls();
        assert!(!calls.contains(&"kill c1 SIGTERM".to_string()));
        let kill = calls.iter().position(|c| c == "kill --all c1 KILL").expect("kill");
        let resume = calls.iter().position(|c| c == "resume c1").expect("resume");
        assert!(kill < resume);
        assert_eq!(fx.ctr.state(), ContainerState::Stopped);
    }

    #[test]
    fn stop_sends_stop_signal_and_waits() {
        let fx = Fixture::new(Some("running"));
        fx.runtime
            .stop(&fx.ctr, Duration::from_secs(2))
            .expect("stop");
        assert_eq!(fx.ctr.state(), ContainerState::Stopped);
        assert!(fx.calls().contains(&"kill c1 SIGTERM".to_string()));
    }

    #[test]
    fn stop_escalates_to_sigkill() {
        let fx = Fixture::new(Some("running"));
        fx.touch("ignore-term");
        fx.runtime
            .stop(&fx.ctr, Duration::from_millis(300))
            .expect("stop");
        let calls = fx.calls();
        let term = calls.iter().position(|c| c == "kill c1 SIGTERM").expect("term");
        let kill = calls.iter().position(|c| c == "kill --all c1 KILL").expect("kill");
        assert!(term < kill);
        assert_eq!(fx.ctr.state(), ContainerState::Stopped);
    }

    #[test]
    fn stop_of_stopped_container_sends_nothing() {
        let fx = Fixture::new(Some("stopped"));
        fx.runtime
            .stop(&fx.ctr, Duration::from_secs(1))
            .expect("stop");
        assert_eq!(fx.calls(), vec!["state c1"]);
    }

    #[test]
    fn exec_passes_flags_and_returns_exit_code() {
        let fx = Fixture::new(Some("running"));
        std::fs::write(fx.dir.path().join("exec-exit"), "3").expect("exit");
        let request = ExecRequest {
            command: vec!["ls".into(), "-l".into()],
            detach: false,
            env: vec!["A=1".into()],
            tty: true,
            user: Some("1000:1000".into()),
        };
        let code = fx.runtime.exec(&fx.ctr, &request).expect("exec");
        assert_eq!(code, 3);
        assert_eq!(
            fx.calls(),
            vec!["exec --tty --env A=1 --user 1000:1000 c1 ls -l"]
        );
    }

    #[test]
    fn missing_binary_is_a_runtime_error() {
        let fx = Fixture::new(Some("running"));
        let runtime = RuncRuntime::new(fx.dir.path().join("absent"), None, fx.dir.path());
        let err = runtime.update_status(&fx.ctr).expect_err("no binary");
        assert!(matches!(err, StevedoreError::Runtime { op: "state", .. }));
    }

    #[test]
    fn name_comes_from_binary() {
        let runtime = RuncRuntime::new("/usr/local/bin/crun", None, "/run/exits");
        assert_eq!(runtime.name(), "crun");
    }
}
