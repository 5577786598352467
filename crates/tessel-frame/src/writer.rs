use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::protocol::{cmd, MAX_TRANSFER};
use crate::queue::{Completion, Descriptor};

const INITIAL_BUFFER_CAPACITY: usize = 64;

/// Encodes a burst of commands and the reply descriptors they expect.
///
/// Nothing reaches the channel until [`CommandWriter::flush_to`] writes the
/// whole burst at once, so a logical operation spanning several commands
/// cannot be interleaved with another one. Descriptors are collected in
/// command order; the caller must queue them before flushing.
#[derive(Debug, Default)]
pub struct CommandWriter {
    buf: BytesMut,
    replies: Vec<Descriptor>,
}

impl CommandWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            replies: Vec::new(),
        }
    }

    /// Raw command bytes with no reply.
    pub fn command(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Fence the burst with an ECHO when a completion is given.
    ///
    /// The coprocessor answers ECHO only after executing everything before it,
    /// so the completion runs once the preceding commands are done.
    pub fn sync(&mut self, completion: Option<Completion>) {
        if let Some(completion) = completion {
            self.buf.put_slice(&[cmd::ECHO, 1, cmd::ECHO_PROBE]);
            self.replies.push(Descriptor::new(1, Some(completion)));
        }
    }

    /// Command followed by an optional ECHO fence.
    pub fn simple(&mut self, bytes: &[u8], completion: Option<Completion>) {
        self.command(bytes);
        self.sync(completion);
    }

    /// Command answered by a single HIGH/LOW byte.
    pub fn status(&mut self, bytes: &[u8], completion: Option<Completion>) {
        self.command(bytes);
        self.replies.push(Descriptor::new(0, completion));
    }

    /// Command answered by `size` data bytes.
    pub fn request(&mut self, bytes: &[u8], size: u8, completion: Option<Completion>) {
        self.command(bytes);
        self.replies.push(Descriptor::new(size, completion));
    }

    /// Transmit `data`, split into TX commands of at most 255 bytes.
    pub fn tx(&mut self, data: &[u8], completion: Option<Completion>) -> Result<()> {
        if data.is_empty() {
            return Err(FrameError::InvalidLength {
                len: 0,
                max: MAX_TRANSFER,
            });
        }
        for chunk in data.chunks(MAX_TRANSFER) {
            self.buf.reserve(2 + chunk.len());
            self.buf.put_u8(cmd::TX);
            self.buf.put_u8(chunk.len() as u8);
            self.buf.put_slice(chunk);
        }
        self.sync(completion);
        Ok(())
    }

    /// Receive `len` bytes.
    pub fn rx(&mut self, len: usize, completion: Option<Completion>) -> Result<()> {
        let size = transfer_len(len)?;
        self.request(&[cmd::RX, size], size, completion);
        Ok(())
    }

    /// Full-duplex transfer: send `data`, receive as many bytes.
    pub fn txrx(&mut self, data: &[u8], completion: Option<Completion>) -> Result<()> {
        let size = transfer_len(data.len())?;
        self.buf.reserve(2 + data.len());
        self.buf.put_slice(&[cmd::TXRX, size]);
        self.buf.put_slice(data);
        self.replies.push(Descriptor::new(size, completion));
        Ok(())
    }

    /// Encoded bytes not yet flushed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the descriptors collected so far, in command order.
    pub fn take_replies(&mut self) -> Vec<Descriptor> {
        std::mem::take(&mut self.replies)
    }

    /// Write the whole burst to `dst` and flush it.
    pub fn flush_to<W: Write + ?Sized>(&mut self, dst: &mut W) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match dst.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.buf.clear();

        loop {
            match dst.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}

fn transfer_len(len: usize) -> Result<u8> {
    if len == 0 || len > MAX_TRANSFER {
        return Err(FrameError::InvalidLength {
            len,
            max: MAX_TRANSFER,
        });
    }
    Ok(len as u8)
}
