//! Executing additional processes in running containers.

use std::os::fd::BorrowedFd;

use stevedore_attach::TerminalGuard;
use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::ContainerState;

use crate::supervisor::Supervisor;

/// A process to start inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecRequest {
    /// Program and arguments.
    pub command: Vec<String>,
    /// Return as soon as the process has started.
    pub detach: bool,
    /// Extra environment as `KEY=VALUE`.
    pub env: Vec<String>,
    /// Allocate a pseudo-terminal.
    pub tty: bool,
    /// `user[:group]` to run as.
    pub user: Option<String>,
}

impl ExecRequest {
    /// Creates a request running `command` with default options.
    #[must_use]
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }

    /// Checks the request before any runtime call.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for an empty command or a malformed
    /// environment entry.
    pub fn validate(&self) -> Result<()> {
        if self.command.first().is_none_or(String::is_empty) {
            return Err(StevedoreError::Config {
                message: "exec command is empty".into(),
            });
        }
        if let Some(bad) = self
            .env
            .iter()
            .find(|e| e.split_once('=').is_none_or(|(key, _)| key.is_empty()))
        {
            return Err(StevedoreError::Config {
                message: format!("environment entry {bad:?} is not KEY=VALUE"),
            });
        }
        Ok(())
    }
}

impl Supervisor {
    /// Runs a process in a running container and returns its exit code.
    ///
    /// With `tty` and a `terminal`, the terminal is in raw mode for the
    /// duration of the process and restored afterwards.
    ///
    /// # Errors
    ///
    /// - `Config` for an invalid request.
    /// - `ContainerPaused` for a paused container, `NotRunning` for any
    ///   other non-running state.
    /// - `Runtime` if the runtime cannot start the process, or if the
    ///   container stopped while the process ran and it exited non-zero.
    pub fn exec(
        &self,
        id_or_name: &str,
        request: &ExecRequest,
        terminal: Option<BorrowedFd<'_>>,
    ) -> Result<i32> {
        request.validate()?;
        let ctr = self.lookup(id_or_name)?;

        match self.runtime.update_status(&ctr)? {
            ContainerState::Running => {}
            ContainerState::Paused => {
                return Err(StevedoreError::ContainerPaused {
                    id: ctr.id().to_string(),
                });
            }
            state => {
                return Err(StevedoreError::NotRunning {
                    id: ctr.id().to_string(),
                    state,
                });
            }
        }

        let raw_terminal = match terminal {
            Some(fd) if request.tty && !request.detach => TerminalGuard::acquire(fd, true)
                .map_err(|e| StevedoreError::io("<terminal>", e))?,
            _ => TerminalGuard::inert(),
        };
        let code = self.runtime.exec(&ctr, request);
        drop(raw_terminal);
        let code = code?;

        if code != 0 && !request.detach {
            if let Ok(ContainerState::Stopped) = self.runtime.update_status(&ctr) {
                return Err(StevedoreError::Runtime {
                    op: "exec",
                    id: ctr.id().to_string(),
                    message: format!("container stopped while the process ran (exit code {code})"),
                });
            }
        }
        Ok(code)
    }
}
