use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PortError, Result};
use crate::port::PortName;

/// Configuration for a single port's engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Upper bound on one blocking read in [`crate::Port::poll`].
    /// `None` blocks until bytes arrive.
    pub read_timeout_ms: Option<u64>,
    /// Maximum bytes pulled from the channel per read.
    pub read_chunk_size: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: Some(50),
            read_chunk_size: 512,
        }
    }
}

impl PortConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// A zero timeout is refused by the socket and a zero chunk reads
    /// nothing, so both are rejected up front.
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout_ms == Some(0) {
            return Err(PortError::InvalidPortConfig(
                "read_timeout_ms must be positive (omit it to block)",
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(PortError::InvalidPortConfig("read_chunk_size must be positive"));
        }
        Ok(())
    }
}

/// Which ports to open and where their coprocessor endpoints live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Endpoint for port A; `None` leaves the port closed.
    pub port_a: Option<PathBuf>,
    /// Endpoint for port B; `None` leaves the port closed.
    pub port_b: Option<PathBuf>,
    pub port: PortConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            port_a: Some(PortName::A.default_path()),
            port_b: Some(PortName::B.default_path()),
            port: PortConfig::default(),
        }
    }
}

impl BoardConfig {
    pub fn path(&self, name: PortName) -> Option<&PathBuf> {
        match name {
            PortName::A => self.port_a.as_ref(),
            PortName::B => self.port_b.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct I2cConfig {
    /// Bus frequency in Hz, 90 kHz to 400 kHz.
    pub frequency: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self { frequency: 100_000 }
    }
}

/// Level that selects the SPI slave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipSelectActive {
    #[default]
    Low,
    High,
}

/// Idle level of the SPI clock (CPOL).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockPolarity {
    #[default]
    Low,
    High,
}

/// Clock edge on which data is sampled (CPHA).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockPhase {
    #[default]
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpiConfig {
    /// Clock in Hz, 368 Hz to 24 MHz.
    pub clock_speed: u32,
    /// Chip-select pin; defaults to the first digital pin (5).
    pub chip_select: Option<u8>,
    pub chip_select_active: ChipSelectActive,
    pub polarity: ClockPolarity,
    pub phase: ClockPhase,
    /// Combined mode 0-3 (bit 0 polarity, bit 1 phase). Overrides
    /// `polarity` and `phase` when set.
    pub data_mode: Option<u8>,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            clock_speed: 2_000_000,
            chip_select: None,
            chip_select_active: ChipSelectActive::Low,
            polarity: ClockPolarity::Low,
            phase: ClockPhase::First,
            data_mode: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UartConfig {
    /// 9600 to 115200.
    pub baud_rate: u32,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self { baud_rate: 9600 }
    }
}
