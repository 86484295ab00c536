//! Async `SOCK_SEQPACKET` Unix sockets.
//!
//! The monitor's attach socket preserves message boundaries, so each
//! `recv` yields exactly one frame. The standard library only offers
//! stream and datagram Unix sockets; these wrap a `socket2::Socket` in
//! tokio's `AsyncFd`.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::path::{Path, PathBuf};

use socket2::{Domain, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;

/// A connected SEQPACKET socket.
///
/// All operations take `&self` so the reading and writing halves of an
/// attach session can share one connection.
#[derive(Debug)]
pub struct SeqPacketConn {
    inner: AsyncFd<Socket>,
    peer: PathBuf,
}

impl SeqPacketConn {
    /// Connects to the socket bound at `path`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or the connection is
    /// refused.
    pub fn connect(path: &Path) -> io::Result<Self> {
        let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)?;
        socket.connect(&SockAddr::unix(path)?)?;
        Self::from_socket(socket, path.to_path_buf())
    }

    /// Creates a connected pair of sockets.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair cannot be created or registered.
    pub fn pair() -> io::Result<(Self, Self)> {
        let (a, b) = Socket::pair(Domain::UNIX, Type::SEQPACKET, None)?;
        Ok((
            Self::from_socket(a, PathBuf::from("<socketpair>"))?,
            Self::from_socket(b, PathBuf::from("<socketpair>"))?,
        ))
    }

    fn from_socket(socket: Socket, peer: PathBuf) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            inner: AsyncFd::new(socket)?,
            peer,
        })
    }

    /// Path of the socket this connection talks to.
    #[must_use]
    pub fn peer(&self) -> &Path {
        &self.peer
    }

    /// Receives one message. Returns `0` once the peer has closed.
    ///
    /// # Errors
    ///
    /// Returns any socket error other than `WouldBlock`/`Interrupted`.
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.readable().await?;
            match guard.try_io(|inner| {
                let mut socket: &Socket = inner.get_ref();
                socket.read(buf)
            }) {
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {}
                Ok(result) => return result,
                Err(_would_block) => {}
            }
        }
    }

    /// Sends `buf` as one message.
    ///
    /// # Errors
    ///
    /// Returns any socket error other than `WouldBlock`/`Interrupted`.
    pub async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.writable().await?;
            match guard.try_io(|inner| {
                let mut socket: &Socket = inner.get_ref();
                socket.write(buf)
            }) {
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {}
                Ok(result) => return result,
                Err(_would_block) => {}
            }
        }
    }

    /// Signals end of input to the peer while keeping the read side open.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is no longer connected.
    pub fn shutdown_write(&self) -> io::Result<()> {
        self.inner.get_ref().shutdown(Shutdown::Write)
    }
}

/// A listening SEQPACKET socket, the monitor side of an attach socket.
#[derive(Debug)]
pub struct SeqPacketListener {
    inner: AsyncFd<Socket>,
    path: PathBuf,
}

impl SeqPacketListener {
    /// Binds and listens on `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is in use or cannot be bound.
    pub fn bind(path: &Path) -> io::Result<Self> {
        let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)?;
        socket.bind(&SockAddr::unix(path)?)?;
        socket.listen(16)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            inner: AsyncFd::new(socket)?,
            path: path.to_path_buf(),
        })
    }

    /// Accepts one connection.
    ///
    /// # Errors
    ///
    /// Returns any accept error other than `WouldBlock`/`Interrupted`.
    pub async fn accept(&self) -> io::Result<SeqPacketConn> {
        loop {
            let mut guard = self.inner.readable().await?;
            match guard.try_io(|inner| inner.get_ref().accept()) {
                Ok(Ok((socket, _addr))) => {
                    return SeqPacketConn::from_socket(socket, self.path.clone());
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {}
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_preserves_message_boundaries() {
        let (a, b) = SeqPacketConn::pair().expect("pair");
        let _ = a.send(b"\x02one").await.expect("send");
        let _ = a.send(b"\x03two").await.expect("send");

        let mut buf = [0u8; 64];
        let n = b.recv(&mut buf).await.expect("recv");
        assert_eq!(&buf[..n], b"\x02one");
        let n = b.recv(&mut buf).await.expect("recv");
        assert_eq!(&buf[..n], b"\x03two");
    }

    #[tokio::test]
    async fn shutdown_write_reads_as_eof_on_peer() {
        let (a, b) = SeqPacketConn::pair().expect("pair");
        a.shutdown_write().expect("shutdown");

        let mut buf = [0u8; 8];
        assert_eq!(b.recv(&mut buf).await.expect("recv"), 0);
    }

    #[tokio::test]
    async fn dropped_peer_reads_as_eof() {
        let (a, b) = SeqPacketConn::pair().expect("pair");
        drop(a);

        let mut buf = [0u8; 8];
        assert_eq!(b.recv(&mut buf).await.expect("recv"), 0);
    }

    #[tokio::test]
    async fn listener_accepts_connections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("attach");
        let listener = SeqPacketListener::bind(&path).expect("bind");

        let client = SeqPacketConn::connect(&path).expect("connect");
        let server = listener.accept().await.expect("accept");
        assert_eq!(client.peer(), path.as_path());

        let _ = client.send(b"\x01hi").await.expect("send");
        let mut buf = [0u8; 16];
        let n = server.recv(&mut buf).await.expect("recv");
        assert_eq!(&buf[..n], b"\x01hi");
    }

    #[tokio::test]
    async fn connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(SeqPacketConn::connect(&dir.path().join("absent")).is_err());
    }
}
