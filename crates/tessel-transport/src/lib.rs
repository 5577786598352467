//! Byte channel to a port coprocessor.
//!
//! Each physical module port is served by a daemon that relays a reliable,
//! ordered byte stream to the port's coprocessor over a Unix domain socket.
//! This is the lowest layer: everything else reads and writes through a
//! [`ByteChannel`], usually the [`PortStream`] provided here.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::ByteChannel;

#[cfg(unix)]
pub use traits::PortStream;
#[cfg(unix)]
pub use uds::UnixDomainSocket;
