//! One interactive attach session.
//!
//! Two halves run concurrently over a single connection: the demultiplexer
//! copies monitor frames to stdout/stderr, the forwarder frames stdin and
//! watches for the detach sequence. Whichever reaches a terminal event
//! first decides the outcome; the other is dropped.

use std::os::fd::BorrowedFd;
use std::path::PathBuf;

use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::TerminalSize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::detach::{DetachScanner, Scan};
use crate::frame::{self, Stream};
use crate::resize;
use crate::socket::SeqPacketConn;
use crate::terminal::TerminalGuard;

/// Where to attach and how.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    /// The monitor's attach socket.
    pub socket_path: PathBuf,
    /// The monitor's control file inside the bundle.
    pub control_path: PathBuf,
    /// Raw detach key bytes; empty disables detaching.
    pub detach_keys: Vec<u8>,
    /// Do not forward stdin and leave the terminal mode alone.
    pub suppress_stdin: bool,
}

/// Caller-side streams of an attach session.
#[derive(Debug)]
pub struct AttachStreams<'fd, I, O, E> {
    /// Input forwarded to the container.
    pub stdin: I,
    /// Receives the container's stdout frames.
    pub stdout: O,
    /// Receives the container's stderr frames.
    pub stderr: E,
    /// Terminal to switch to raw mode for the session, if any.
    pub terminal: Option<BorrowedFd<'fd>>,
}

/// How the stdin half finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forwarded {
    Eof,
    Detached,
}

/// Attaches the caller's streams to a container monitor.
///
/// Returns `Ok(())` when the monitor closes the socket and
/// [`StevedoreError::DetachedByUser`] when the detach sequence is typed.
/// The terminal mode is restored on every path out of this function.
/// Closing the sending side of `resizes` only stops resize forwarding.
///
/// # Errors
///
/// Returns an `Io` error if the terminal, the control file or the socket
/// cannot be set up, or if either copy direction fails.
pub async fn attach<I, O, E>(
    request: &AttachRequest,
    streams: AttachStreams<'_, I, O, E>,
    resizes: mpsc::Receiver<TerminalSize>,
) -> Result<()>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let _terminal = match streams.terminal {
        Some(fd) => TerminalGuard::acquire(fd, !request.suppress_stdin)
            .map_err(|e| StevedoreError::io("<terminal>", e))?,
        None => TerminalGuard::inert(),
    };

    let control = resize::open_control_file(&request.control_path)
        .await
        .map_err(|e| StevedoreError::io(&request.control_path, e))?;
    let _forwarder = resize::spawn_resize_forwarder(control, resizes);

    let conn = SeqPacketConn::connect(&request.socket_path)
        .map_err(|e| StevedoreError::io(&request.socket_path, e))?;
    tracing::info!(socket = %request.socket_path.display(), "attached");

    let stdin = (!request.suppress_stdin).then_some(streams.stdin);
    let result = run_session(
        &conn,
        stdin,
        streams.stdout,
        streams.stderr,
        &request.detach_keys,
    )
    .await;

    match &result {
        Ok(()) => tracing::info!("attach session ended by monitor"),
        Err(e) if e.is_detach() => tracing::info!("detached from container"),
        Err(e) => tracing::warn!(error = %e, "attach session failed"),
    }
    result
}

/// Runs the stdin/stdout join over an established connection.
///
/// With no stdin only the demultiplexer runs. When stdin reaches end of
/// file the write side of the socket is shut down and the session
/// continues until the monitor closes.
///
/// # Errors
///
/// Returns [`StevedoreError::DetachedByUser`] on detach and an `Io` error
/// if either copy direction fails.
pub async fn run_session<I, O, E>(
    conn: &SeqPacketConn,
    stdin: Option<I>,
    stdout: O,
    stderr: E,
    detach_keys: &[u8],
) -> Result<()>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let demux = demux_output(conn, stdout, stderr);
    tokio::pin!(demux);

    let Some(stdin) = stdin else {
        return demux.await;
    };
    let forward = forward_input(conn, stdin, detach_keys);
    tokio::pin!(forward);

    tokio::select! {
        result = &mut demux => result,
        result = &mut forward => match result? {
            Forwarded::Detached => Err(StevedoreError::DetachedByUser),
            Forwarded::Eof => demux.await,
        },
    }
}

async fn demux_output<O, E>(conn: &SeqPacketConn, mut stdout: O, mut stderr: E) -> Result<()>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; frame::MAX_FRAME];
    loop {
        let n = conn
            .recv(&mut buf)
            .await
            .map_err(|e| StevedoreError::io(conn.peer(), e))?;
        if n == 0 {
            return Ok(());
        }
        let Some((stream, payload)) = frame::parse(&buf[..n]) else {
            continue;
        };
        match stream {
            Stream::Stdout => write_flush(&mut stdout, payload).await?,
            Stream::Stderr => write_flush(&mut stderr, payload).await?,
            Stream::Stdin | Stream::Unknown(_) => {
                tracing::warn!(stream = ?stream, len = payload.len(), "dropping frame");
            }
        }
    }
}

async fn write_flush<W: AsyncWrite + Unpin>(out: &mut W, payload: &[u8]) -> Result<()> {
    async {
        out.write_all(payload).await?;
        out.flush().await
    }
    .await
    .map_err(|e| StevedoreError::io("<output>", e))
}

async fn forward_input<I>(conn: &SeqPacketConn, mut stdin: I, detach_keys: &[u8]) -> Result<Forwarded>
where
    I: AsyncRead + Unpin,
{
    let mut scanner = DetachScanner::new(detach_keys);
    let mut buf = vec![0u8; frame::MAX_PAYLOAD];
    let mut out = Vec::with_capacity(frame::MAX_PAYLOAD);
    loop {
        let n = stdin
            .read(&mut buf)
            .await
            .map_err(|e| StevedoreError::io("<input>", e))?;
        out.clear();
        if n == 0 {
            out.extend(scanner.take_pending());
            send_frames(conn, &out).await?;
            conn.shutdown_write()
                .map_err(|e| StevedoreError::io(conn.peer(), e))?;
            return Ok(Forwarded::Eof);
        }

        let scan = scanner.scan(&buf[..n], &mut out);
        send_frames(conn, &out).await?;
        if scan == Scan::Detached {
            return Ok(Forwarded::Detached);
        }
    }
}

async fn send_frames(conn: &SeqPacketConn, data: &[u8]) -> Result<()> {
    for message in frame::encode_stdin(data) {
        let _ = conn
            .send(&message)
            .await
            .map_err(|e| StevedoreError::io(conn.peer(), e))?;
    }
    Ok(())
}
