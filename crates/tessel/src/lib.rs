//! Host-side driver for the Tessel module port coprocessor.
//!
//! Each module port is served by a coprocessor reached over a byte stream.
//! This crate ties the layers together: GPIO, analog, I2C, SPI and UART
//! commands are encoded onto the stream and the coprocessor's replies and
//! events are decoded back out of it.
//!
//! # Crate Structure
//!
//! - [`transport`]: the byte channel to a port (Unix domain sockets)
//! - [`frame`]: wire constants, frame classification, reply queue, bursts
//! - [`port`]: per-port engine, peripheral drivers and the board registry

/// Re-export transport types.
pub mod transport {
    pub use tessel_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use tessel_frame::*;
}

/// Re-export port engine and peripheral types.
pub mod port {
    pub use tessel_port::*;
}

pub use tessel_port::{
    on_complete, Board, BoardConfig, I2cConfig, InterruptMode, Port, PortError, PortName,
    SpiConfig, UartConfig,
};
