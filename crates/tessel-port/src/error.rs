use tessel_frame::InterruptMode;

use crate::port::PortName;

/// Errors that can occur while driving a port.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] tessel_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] tessel_frame::FrameError),

    /// The port stopped processing after a fatal error.
    #[error("port {port} is faulted: {reason}")]
    Faulted { port: PortName, reason: String },

    /// The port was not opened on this board.
    #[error("port {0} is not enabled")]
    PortDisabled(PortName),

    /// Pin index outside the port.
    #[error("pin {0} does not exist (pins 0-7)")]
    InvalidPin(u8),

    /// I2C addresses are seven bits wide.
    #[error("I2C address {0:#04x} is out of range (0x00-0x7f)")]
    InvalidAddress(u8),

    #[error("interrupts are not supported on pin {pin}")]
    InterruptUnsupported { pin: u8 },

    #[error("cannot set pin {pin} interrupt mode to {requested}; already listening for {active}")]
    InterruptConflict {
        pin: u8,
        requested: InterruptMode,
        active: InterruptMode,
    },

    #[error("analog write can only be used on pin 7 (G3) of port B, not pin {pin} of port {port}")]
    AnalogWriteUnsupported { port: PortName, pin: u8 },

    #[error("analog write must be between 0 and 3.3 V (got {0})")]
    AnalogOutOfRange(f64),

    #[error("I2C frequency should be between 90 kHz and 400 kHz (got {0} Hz)")]
    InvalidFrequency(u32),

    #[error("SPI clock needs to be between 368 Hz and 24 MHz (got {0} Hz)")]
    InvalidClockSpeed(u32),

    #[error("SPI data mode must be 0-3 (got {0})")]
    InvalidDataMode(u8),

    #[error("UART baud rate must be between 9600 and 115200 (got {0})")]
    InvalidBaudRate(u32),

    /// Unusable engine settings, such as a zero read timeout.
    #[error("invalid port configuration: {0}")]
    InvalidPortConfig(&'static str),

    /// Write attempted on a UART that has been disabled.
    #[error("UART is not enabled on port {0}")]
    UartDisabled(PortName),
}

impl PortError {
    /// True when the error leaves the port unusable.
    pub fn is_fatal(&self) -> bool {
        match self {
            PortError::Transport(_) | PortError::Faulted { .. } => true,
            PortError::Frame(err) => !matches!(err, tessel_frame::FrameError::InvalidLength { .. }),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PortError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_frame::FrameError;

    #[test]
    fn configuration_errors_are_not_fatal() {
        assert!(!PortError::InvalidFrequency(1).is_fatal());
        assert!(!PortError::InvalidPin(9).is_fatal());
        assert!(!PortError::InvalidPortConfig("read_timeout_ms must be positive").is_fatal());
        assert!(!PortError::Frame(FrameError::InvalidLength { len: 0, max: 255 }).is_fatal());
    }

    #[test]
    fn protocol_and_channel_errors_are_fatal() {
        assert!(PortError::Frame(FrameError::UnexpectedData).is_fatal());
        assert!(PortError::Frame(FrameError::ConnectionClosed).is_fatal());
        assert!(PortError::Faulted {
            port: PortName::A,
            reason: "closed".into(),
        }
        .is_fatal());
    }
}
