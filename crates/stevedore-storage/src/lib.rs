//! # stevedore-storage
//!
//! The content store the supervisor consumes as an external collaborator.
//!
//! - **Store**: the [`ContainerStore`](store::ContainerStore) trait: creation,
//!   lookup, mount/unmount, storage deletion and per-container directories.
//! - **Local**: [`LocalStore`](local::LocalStore), a directory-backed store
//!   keeping one layer directory per container under a root.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod local;
pub mod store;

pub use local::LocalStore;
pub use store::ContainerStore;
