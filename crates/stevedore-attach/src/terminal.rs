//! Caller terminal mode management.

use std::os::fd::{AsFd, BorrowedFd};

use nix::errno::Errno;
use nix::sys::termios::{self, SetArg, Termios};

/// Puts a terminal into raw mode and restores the saved mode on drop.
///
/// A guard built over something that is not a terminal does nothing, so
/// attach works the same when the caller's stdin is a pipe.
pub struct TerminalGuard<'fd> {
    fd: Option<BorrowedFd<'fd>>,
    saved: Option<Termios>,
}

impl<'fd> TerminalGuard<'fd> {
    /// Saves the current mode of `fd` and, if `raw`, switches it to raw mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal attributes cannot be read or set.
    /// `ENOTTY` is not an error and yields an inert guard.
    pub fn acquire(fd: BorrowedFd<'fd>, raw: bool) -> std::io::Result<Self> {
        let saved = match termios::tcgetattr(fd) {
            Ok(saved) => saved,
            Err(Errno::ENOTTY) => {
                tracing::debug!("attach input is not a terminal");
                return Ok(Self::inert());
            }
            Err(e) => return Err(e.into()),
        };

        if raw {
            let mut attrs = saved.clone();
            termios::cfmakeraw(&mut attrs);
            termios::tcsetattr(fd, SetArg::TCSANOW, &attrs)?;
            tracing::debug!("terminal switched to raw mode");
        }

        Ok(Self {
            fd: Some(fd),
            saved: Some(saved),
        })
    }

    /// A guard that neither changed nor will restore anything.
    #[must_use]
    pub const fn inert() -> Self {
        Self {
            fd: None,
            saved: None,
        }
    }

    /// Returns whether the guard holds a terminal mode to restore.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.saved.is_some()
    }
}

impl Drop for TerminalGuard<'_> {
    fn drop(&mut self) {
        if let (Some(fd), Some(saved)) = (self.fd.take(), self.saved.take()) {
            if let Err(e) = termios::tcsetattr(fd.as_fd(), SetArg::TCSANOW, &saved) {
                tracing::warn!(error = %e, "failed to restore terminal mode");
            }
        }
    }
}

impl std::fmt::Debug for TerminalGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalGuard")
            .field("active", &self.is_active())
            .finish()
    }
}
