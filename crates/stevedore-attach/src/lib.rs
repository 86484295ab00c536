//! # stevedore-attach
//!
//! Interactive I/O bridge between a caller's terminal and a container
//! monitor's attach socket.
//!
//! - **Frames**: one stream-selector byte followed by up to 8192 payload bytes.
//! - **Socket**: async `SOCK_SEQPACKET` Unix connections.
//! - **Terminal**: save/raw/restore of the caller's terminal mode.
//! - **Detach**: exact detach-key matching on the stdin byte stream.
//! - **Resize**: fire-and-forget resize commands to the monitor control file.
//! - **Session**: the stdin/stdout join that drives one attach.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod detach;
pub mod frame;
pub mod resize;
pub mod session;
pub mod socket;
pub mod terminal;

pub use session::{AttachRequest, AttachStreams, attach, run_session};
pub use socket::{SeqPacketConn, SeqPacketListener};
pub use terminal::TerminalGuard;
