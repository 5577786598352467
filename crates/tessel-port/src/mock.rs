//! In-memory channel for exercising the engine without a coprocessor.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tessel_transport::ByteChannel;

#[derive(Debug, Default)]
struct State {
    written: Vec<u8>,
    write_calls: usize,
    inbound: VecDeque<u8>,
    inbound_closed: bool,
    fail_writes: bool,
    keep_alive: bool,
    shut_down: bool,
}

/// Cloneable handle; every clone sees the same state.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockChannel {
    state: Arc<Mutex<State>>,
}

impl MockChannel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        self.state().written.clone()
    }

    pub(crate) fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().written)
    }

    pub(crate) fn write_calls(&self) -> usize {
        self.state().write_calls
    }

    pub(crate) fn push_inbound(&self, bytes: &[u8]) {
        self.state().inbound.extend(bytes);
    }

    pub(crate) fn close_inbound(&self) {
        self.state().inbound_closed = true;
    }

    pub(crate) fn fail_writes(&self) {
        self.state().fail_writes = true;
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.state().shut_down
    }
}

impl Read for MockChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state();
        if state.inbound.is_empty() {
            if state.inbound_closed {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        state.write_calls += 1;
        state.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteChannel for MockChannel {
    fn set_keep_alive(&mut self, keep_alive: bool) {
        self.state().keep_alive = keep_alive;
    }

    fn keep_alive(&self) -> bool {
        self.state().keep_alive
    }

    fn set_read_timeout(&self, _timeout: Option<Duration>) -> tessel_transport::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> tessel_transport::Result<()> {
        self.state().shut_down = true;
        Ok(())
    }
}
