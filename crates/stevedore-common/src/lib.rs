//! # stevedore-common
//!
//! Shared types, error taxonomy, configuration model, and constants used
//! across the entire Stevedore workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives the supervisor, the attach
//! multiplexer, and the store collaborator build upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod keys;
pub mod types;
