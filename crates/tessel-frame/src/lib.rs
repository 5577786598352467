//! Framing and correlation for the port coprocessor protocol.
//!
//! The coprocessor answers commands and reports events over one shared byte
//! stream with no framing delimiter. Every inbound frame is classified by its
//! leading byte:
//! - `0xD0` starts a UART receive chunk (`[0xD0, len, payload..]`)
//! - `0xA0..` are single-byte asynchronous events (`0xC0..0xC8` pin changes)
//! - anything lower is the reply to the oldest outstanding command, whose
//!   descriptor in the [`ReplyQueue`] declares how many data bytes follow.
//!
//! Commands go out through a [`CommandWriter`], which groups the bytes of one
//! logical operation into a single write.

pub mod codec;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod queue;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, Frame};
pub use error::{FrameError, Result};
pub use lifecycle::{Lifecycle, Transition};
pub use protocol::{cmd, reply, InterruptMode, MAX_TRANSFER, PIN_COUNT};
pub use queue::{Completion, Descriptor, Reply, ReplyQueue};
pub use reader::FrameReader;
pub use writer::CommandWriter;
