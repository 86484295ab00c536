//! Adapter to the low-level OCI runtime.
//!
//! The runtime is the source of truth for a container's state; the
//! supervisor only reads it back on demand and never asserts transitions
//! itself. Alternative runtimes plug in by implementing [`OciRuntime`].

pub mod runc;

use std::time::Duration;

use stevedore_common::error::Result;
use stevedore_common::types::ContainerState;

use crate::container::Container;
use crate::exec::ExecRequest;

pub use runc::RuncRuntime;

/// Operations the supervisor needs from an OCI runtime.
pub trait OciRuntime: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Queries the runtime, records the result on `ctr`, and returns the
    /// refreshed state. A container the runtime no longer knows is
    /// `Stopped`, not an error.
    ///
    /// # Errors
    ///
    /// Returns a `Runtime` error if the runtime cannot be invoked or its
    /// answer cannot be understood.
    fn update_status(&self, ctr: &Container) -> Result<ContainerState>;

    /// Runs a process inside a running container and returns its exit code.
    /// With `detach` the code is the runtime's own.
    ///
    /// # Errors
    ///
    /// Returns a `Runtime` error if the runtime cannot be invoked.
    fn exec(&self, ctr: &Container, request: &ExecRequest) -> Result<i32>;

    /// Tears down the runtime's state for a created or stopped container.
    /// Deleting a container the runtime no longer knows succeeds.
    ///
    /// # Errors
    ///
    /// Returns a `Runtime` error if the runtime refuses, which it does for
    /// a container that is still alive.
    fn delete(&self, ctr: &Container) -> Result<()>;

    /// Sends the stop signal, waits up to `timeout`, then escalates to
    /// `SIGKILL`. A paused container cannot act on the stop signal and is
    /// killed and thawed straight away.
    ///
    /// # Errors
    ///
    /// Returns a `Runtime` error if a signal cannot be delivered or the
    /// container survives `SIGKILL`.
    fn stop(&self, ctr: &Container, timeout: Duration) -> Result<()>;
}
