use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A reliable, ordered, bidirectional byte stream to one port's coprocessor.
///
/// Besides plain reads and writes the channel carries a keep-alive flag: the
/// protocol engine raises it while it still owes a caller a reply, an interrupt
/// or a UART stream, and lowers it once nothing is outstanding. The driving
/// loop uses it to decide whether the port still needs servicing.
pub trait ByteChannel: Read + Write + Send {
    /// Mark whether this channel must keep its owner running.
    fn set_keep_alive(&mut self, keep_alive: bool);

    /// Whether the channel currently keeps its owner running.
    fn keep_alive(&self) -> bool;

    /// Bound how long a single read may block. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Close both directions of the channel.
    fn shutdown(&mut self) -> Result<()>;
}

/// A connected port channel.
///
/// On Unix this wraps the Unix domain socket exported by the port daemon.
#[cfg(unix)]
pub struct PortStream {
    inner: std::os::unix::net::UnixStream,
    keep_alive: bool,
}

#[cfg(unix)]
impl PortStream {
    /// Create a PortStream from a Unix domain socket stream.
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: stream,
            keep_alive: false,
        }
    }

    /// Connected socket pair, handy for wiring a simulated coprocessor.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// The keep-alive flag is per handle and starts lowered on the clone.
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_unix(cloned))
    }
}

#[cfg(unix)]
impl Read for PortStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(unix)]
impl Write for PortStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(unix)]
impl ByteChannel for PortStream {
    fn set_keep_alive(&mut self, keep_alive: bool) {
        if self.keep_alive != keep_alive {
            tracing::trace!(keep_alive, "port channel keep-alive changed");
        }
        self.keep_alive = keep_alive;
    }

    fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    fn shutdown(&mut self) -> Result<()> {
        match self.inner.shutdown(std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already torn down by the peer.
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(unix)]
impl std::fmt::Debug for PortStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortStream")
            .field("type", &"unix")
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}
