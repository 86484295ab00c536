//! `stv attach`: attach to a container's terminal.

use std::io::IsTerminal;
use std::os::fd::AsFd;

use anyhow::Context;
use clap::Args;
use stevedore_attach::{AttachRequest, AttachStreams};
use stevedore_common::types::TerminalSize;
use stevedore_runtime::{AttachOptions, Supervisor};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

/// Arguments for the `attach` command.
#[derive(Args, Debug)]
pub struct AttachArgs {
    /// Container name, id or id prefix.
    pub container: String,

    /// Do not forward stdin.
    #[arg(long)]
    pub no_stdin: bool,

    /// Detach sequence, e.g. `ctrl-p,ctrl-q`.
    #[arg(long)]
    pub detach_keys: Option<String>,
}

/// Executes the `attach` command.
///
/// Typing the detach sequence ends the command successfully.
///
/// # Errors
///
/// Returns an error if the container cannot be attached to or the session
/// fails.
pub fn execute(supervisor: &Supervisor, args: AttachArgs) -> anyhow::Result<()> {
    let options = AttachOptions {
        suppress_stdin: args.no_stdin,
        detach_keys: args.detach_keys,
    };
    // Fail fast before the terminal is touched.
    let request = supervisor.prepare_attach(&args.container, &options)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let result = runtime.block_on(session(supervisor, &request));
    // Stdin is read on a blocking thread that cannot be interrupted.
    runtime.shutdown_background();

    match result {
        Err(e) if e.is_detach() => {
            tracing::info!(container = %args.container, "detached");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}

async fn session(
    supervisor: &Supervisor,
    request: &AttachRequest,
) -> stevedore_common::error::Result<()> {
    let stdin = std::io::stdin();
    let terminal = stdin.is_terminal().then(|| stdin.as_fd());

    let (resize_tx, resize_rx) = mpsc::channel(8);
    let _resizer = tokio::spawn(watch_window(resize_tx));

    let streams = AttachStreams {
        stdin: tokio::io::stdin(),
        stdout: tokio::io::stdout(),
        stderr: tokio::io::stderr(),
        terminal,
    };
    supervisor
        .attach(request, streams, resize_rx)
        .await
}

/// Sends the current window size, then again on every `SIGWINCH`, until
/// the session drops the receiver.
async fn watch_window(tx: mpsc::Sender<TerminalSize>) {
    let mut winch = match signal(SignalKind::window_change()) {
        Ok(winch) => Some(winch),
        Err(e) => {
            tracing::warn!(error = %e, "cannot watch window size changes");
            None
        }
    };

    loop {
        match crossterm::terminal::size() {
            Ok((width, height)) => {
                if tx.send(TerminalSize { height, width }).await.is_err() {
                    return;
                }
            }
            Err(e) => tracing::debug!(error = %e, "terminal size unavailable"),
        }
        let Some(winch) = winch.as_mut() else {
            return;
        };
        if winch.recv().await.is_none() {
            return;
        }
    }
}
