//! Detach-key matching on the stdin byte stream.
//!
//! Bytes that could be the start of the detach sequence are held back until
//! the sequence either completes (they are dropped) or diverges (they are
//! released in order). Anything after a completed match is discarded.

/// Result of scanning one buffer of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Keep copying.
    Continue,
    /// The detach sequence completed inside this buffer.
    Detached,
}

/// Incremental matcher for a detach key sequence.
#[derive(Debug, Clone)]
pub struct DetachScanner {
    keys: Vec<u8>,
    matched: usize,
}

impl DetachScanner {
    /// Creates a scanner for `keys`. An empty sequence never detaches.
    #[must_use]
    pub fn new(keys: &[u8]) -> Self {
        Self {
            keys: keys.to_vec(),
            matched: 0,
        }
    }

    /// Scans `input`, appending the bytes that are safe to forward to `out`.
    pub fn scan(&mut self, input: &[u8], out: &mut Vec<u8>) -> Scan {
        if self.keys.is_empty() {
            out.extend_from_slice(input);
            return Scan::Continue;
        }

        for &byte in input {
            if byte == self.keys[self.matched] {
                self.matched += 1;
                if self.matched == self.keys.len() {
                    self.matched = 0;
                    return Scan::Detached;
                }
                continue;
            }

            if self.matched == 0 {
                out.push(byte);
                continue;
            }

            // Mismatch after a partial match: release the longest head of the
            // held bytes that can no longer start the sequence.
            let mut held = self.keys[..self.matched].to_vec();
            held.push(byte);
            let mut start = 1;
            while start < held.len() && !self.keys.starts_with(&held[start..]) {
                start += 1;
            }
            out.extend_from_slice(&held[..start]);
            self.matched = held.len() - start;
        }
        Scan::Continue
    }

    /// Returns the bytes held back as a possible match and resets the
    /// scanner. Called at end of input, where they turn out to be data.
    pub fn take_pending(&mut self) -> Vec<u8> {
        let pending = self.keys[..self.matched].to_vec();
        self.matched = 0;
        pending
    }
}
