//! Attach socket wire format.
//!
//! Every message is a single SEQPACKET datagram: one stream-selector byte
//! followed by the payload.

/// Selector for the container's stdin (also used when the client writes).
pub const STDIN: u8 = 1;
/// Selector for the container's stdout.
pub const STDOUT: u8 = 2;
/// Selector for the container's stderr.
pub const STDERR: u8 = 3;

/// Maximum payload carried by one frame.
pub const MAX_PAYLOAD: usize = 8192;
/// Maximum frame size including the selector byte.
pub const MAX_FRAME: usize = MAX_PAYLOAD + 1;

/// Stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Container stdin.
    Stdin,
    /// Container stdout.
    Stdout,
    /// Container stderr.
    Stderr,
    /// Unrecognized selector, dropped by the demultiplexer.
    Unknown(u8),
}

impl Stream {
    /// Decodes a selector byte.
    #[must_use]
    pub const fn from_selector(byte: u8) -> Self {
        match byte {
            STDIN => Self::Stdin,
            STDOUT => Self::Stdout,
            STDERR => Self::Stderr,
            other => Self::Unknown(other),
        }
    }
}

/// Splits a received datagram into its stream and payload.
///
/// Returns `None` for an empty datagram.
#[must_use]
pub fn parse(datagram: &[u8]) -> Option<(Stream, &[u8])> {
    let (&selector, payload) = datagram.split_first()?;
    Some((Stream::from_selector(selector), payload))
}

/// Encodes stdin bytes into frames of at most [`MAX_FRAME`] bytes.
#[must_use]
pub fn encode_stdin(data: &[u8]) -> Vec<Vec<u8>> {
    data.chunks(MAX_PAYLOAD)
        .map(|chunk| {
            let mut frame = Vec::with_capacity(chunk.len() + 1);
            frame.push(STDIN);
            frame.extend_from_slice(chunk);
            frame
        })
        .collect()
}
