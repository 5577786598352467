use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{decode_frame, Frame};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const DEFAULT_READ_CHUNK_SIZE: usize = 512;

/// Accumulates inbound bytes and splits them into frames.
///
/// Partial frames stay buffered across reads; nothing is discarded until a
/// complete frame has been recognised.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    scratch: Vec<u8>,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_READ_CHUNK_SIZE)
    }

    /// Create a reader that pulls at most `chunk_size` bytes per read.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scratch: vec![0u8; chunk_size.max(1)],
        }
    }

    /// Perform one read from `src` and append whatever arrived.
    ///
    /// Returns the number of bytes appended; `Ok(0)` means the read timed out
    /// or would block. End of stream is `FrameError::ConnectionClosed`.
    pub fn fill<R: Read + ?Sized>(&mut self, src: &mut R) -> Result<usize> {
        loop {
            match src.read(&mut self.scratch) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    trace!(bytes = n, buffered = self.buf.len() + n, "read from channel");
                    self.buf.extend_from_slice(&self.scratch[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Ok(0)
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Append bytes that were received elsewhere.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete frame, given the payload size the oldest outstanding
    /// descriptor expects (see [`decode_frame`]).
    pub fn next_frame(&mut self, pending: Option<u8>) -> Result<Option<Frame>> {
        let frame = decode_frame(&mut self.buf, pending);
        match &frame {
            Ok(Some(_)) => {}
            Ok(None) if !self.buf.is_empty() => {
                trace!(buffered = self.buf.len(), "waiting for rest of frame");
            }
            Ok(None) => {}
            Err(err) => debug!(
                error = %err,
                head = ?self.buf.first(),
                ?pending,
                "inbound stream rejected"
            ),
        }
        frame
    }

    /// Bytes received but not yet resolved into a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
