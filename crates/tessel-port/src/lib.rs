//! Protocol engine and peripheral drivers for Tessel module ports.
//!
//! A [`Port`] owns the byte channel to one port's coprocessor. Commands are
//! written in atomic [`CommandBurst`]s; replies are matched to commands in
//! strict FIFO order while pin interrupts, UART data and other events are
//! dispatched as they arrive. [`Pin`], [`I2c`], [`Spi`] and [`Uart`] encode
//! the peripheral commands on top, and a [`Board`] keeps one port per
//! physical connector.
//!
//! ```no_run
//! use tessel_port::{on_complete, Board, BoardConfig, PortName};
//!
//! let mut board = Board::open(&BoardConfig::default())?;
//! board
//!     .port(PortName::A)?
//!     .pin(5)?
//!     .output(true, on_complete(|r| println!("led on: {:?}", r.is_ok())))?;
//! board.run_until_idle()?;
//! # Ok::<(), tessel_port::PortError>(())
//! ```

pub mod board;
pub mod burst;
pub mod config;
pub mod error;
pub mod i2c;
pub mod pin;
pub mod port;
pub mod spi;
pub mod uart;

#[cfg(test)]
mod mock;

pub use board::Board;
pub use burst::CommandBurst;
pub use config::{
    BoardConfig, ChipSelectActive, ClockPhase, ClockPolarity, I2cConfig, PortConfig, SpiConfig,
    UartConfig,
};
pub use error::{PortError, Result};
pub use i2c::I2c;
pub use pin::{Pin, PinEvent, PinEvents, DIGITAL_PINS, INTERRUPT_PINS};
pub use port::{on_complete, Mode, Port, PortName};
pub use spi::{Spi, SpiSettings};
pub use tessel_frame::{Completion, InterruptMode, Reply};
pub use uart::Uart;
