//! Terminal resize forwarding to the monitor's control file.
//!
//! The monitor reads newline-terminated commands from `<bundle>/ctl`;
//! message type `1` is a resize carrying height then width.

use std::path::Path;

use stevedore_common::types::TerminalSize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Control message type for a window resize.
pub const RESIZE_MESSAGE: u8 = 1;

/// Formats the control-file line for a resize.
#[must_use]
pub fn resize_command(size: TerminalSize) -> String {
    format!("{RESIZE_MESSAGE} {} {}\n", size.height, size.width)
}

/// Opens the monitor control file for appending. The file must exist.
///
/// # Errors
///
/// Returns the open error; the monitor creates the file, so its absence
/// means there is nothing to attach to.
pub async fn open_control_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().append(true).open(path).await
}

/// Spawns a task writing every size received on `sizes` to `control`.
///
/// Write failures are logged and never stop the session. The task ends
/// when the sending side is dropped.
pub fn spawn_resize_forwarder(
    mut control: File,
    mut sizes: mpsc::Receiver<TerminalSize>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(size) = sizes.recv().await {
            let line = resize_command(size);
            let written = async {
                control.write_all(line.as_bytes()).await?;
                control.flush().await
            }
            .await;
            match written {
                Ok(()) => tracing::debug!(height = size.height, width = size.width, "terminal resized"),
                Err(e) => tracing::warn!(error = %e, "failed to forward terminal resize"),
            }
        }
    })
}
