/// Errors raised while framing, correlating or encoding port traffic.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A reply byte arrived while no command was waiting for one.
    #[error("received unexpected response with no commands pending: {0:#04x}")]
    UnexpectedReply(u8),

    /// A reply was matched against an empty descriptor queue.
    #[error("no command is waiting for a reply")]
    NoPendingCommand,

    /// A data packet arrived for a command that declared no payload.
    #[error("received unexpected data packet")]
    UnexpectedData,

    /// A reply byte that is neither data nor a bit result.
    #[error("received unknown reply marker {0:#04x}")]
    UnknownReply(u8),

    /// A transfer length outside what a single command can carry.
    #[error("transfer length {len} must be within 1-{max}")]
    InvalidLength { len: usize, max: usize },

    /// The command was still pending when its port stopped processing.
    #[error("command abandoned before a reply arrived")]
    Abandoned,

    /// An I/O error occurred while reading or writing the channel.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel reached end of stream.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True when the inbound stream can no longer be trusted.
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            FrameError::UnexpectedReply(_)
                | FrameError::NoPendingCommand
                | FrameError::UnexpectedData
                | FrameError::UnknownReply(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
