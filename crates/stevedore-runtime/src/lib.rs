//! # stevedore-runtime
//!
//! Supervision of OCI containers run by an external low-level runtime.
//!
//! - **Indices**: unique name reservations and id prefix lookup.
//! - **Registry**: the in-memory container table and its lock discipline.
//! - **OCI**: the [`OciRuntime`](oci::OciRuntime) adapter and its `runc`
//!   command-line implementation.
//! - **Supervisor**: registration, lookup, persistence and the attach,
//!   exec and remove lifecycle operations.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod attach;
pub mod container;
pub mod exec;
pub mod index;
pub mod oci;
pub mod registry;
pub mod remove;
pub mod state;
pub mod supervisor;

pub use attach::AttachOptions;
pub use container::{Container, ContainerConfig, ContainerInfo, ContainerStatus};
pub use exec::ExecRequest;
pub use oci::{OciRuntime, RuncRuntime};
pub use registry::ContainerRegistry;
pub use supervisor::Supervisor;
