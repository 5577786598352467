use bytes::Bytes;
use tessel_frame::{cmd, Completion, PIN_COUNT};
use tessel_transport::ByteChannel;
use tracing::{debug, info};

use crate::config::{ChipSelectActive, ClockPhase, ClockPolarity, SpiConfig};
use crate::error::{PortError, Result};
use crate::pin::DIGITAL_PINS;
use crate::port::{data_reply, Mode, Port, REFERENCE_CLOCK_HZ};

pub const MIN_CLOCK_SPEED: u32 = 368;
pub const MAX_CLOCK_SPEED: u32 = 24_000_000;

const REGISTER_MAX: u32 = 255;

/// Clock register and divisor for an SPI clock speed.
///
/// `f = 48 MHz / (div * 2 * (reg + 1))`. The divisor stays at 1 unless the
/// register alone cannot reach the requested speed.
pub fn clock_registers(clock_speed: u32) -> Result<(u8, u8)> {
    if !(MIN_CLOCK_SPEED..=MAX_CLOCK_SPEED).contains(&clock_speed) {
        return Err(PortError::InvalidClockSpeed(clock_speed));
    }
    let speed = f64::from(clock_speed);
    let reg = (REFERENCE_CLOCK_HZ / (2.0 * speed) - 1.0).floor() as u32;
    if reg <= REGISTER_MAX {
        return Ok((reg as u8, 1));
    }

    let div = ((REFERENCE_CLOCK_HZ / (speed * f64::from(2 * REGISTER_MAX + 2))).floor() as u32).max(1);
    if div > REGISTER_MAX {
        let reg = (reg / REGISTER_MAX).clamp(1, REGISTER_MAX);
        Ok((reg as u8, REGISTER_MAX as u8))
    } else {
        Ok((REGISTER_MAX as u8, div as u8))
    }
}

/// SPI parameters derived once when the bus is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiSettings {
    pub clock_reg: u8,
    pub clock_div: u8,
    pub polarity: ClockPolarity,
    pub phase: ClockPhase,
    pub chip_select: u8,
    pub chip_select_active: ChipSelectActive,
}

impl SpiSettings {
    pub fn from_config(config: &SpiConfig) -> Result<Self> {
        let (clock_reg, clock_div) = clock_registers(config.clock_speed)?;

        let chip_select = config.chip_select.unwrap_or(DIGITAL_PINS[0]);
        if usize::from(chip_select) >= PIN_COUNT {
            return Err(PortError::InvalidPin(chip_select));
        }

        let (polarity, phase) = match config.data_mode {
            Some(mode) if mode > 3 => return Err(PortError::InvalidDataMode(mode)),
            Some(mode) => (
                if mode & 0x1 != 0 {
                    ClockPolarity::High
                } else {
                    ClockPolarity::Low
                },
                if mode & 0x2 != 0 {
                    ClockPhase::Second
                } else {
                    ClockPhase::First
                },
            ),
            None => (config.polarity, config.phase),
        };

        Ok(Self {
            clock_reg,
            clock_div,
            polarity,
            phase,
            chip_select,
            chip_select_active: config.chip_select_active,
        })
    }

    /// `ENABLE_SPI` mode byte: bit 0 polarity, bit 1 phase.
    pub fn mode_bits(&self) -> u8 {
        let cpol = u8::from(self.polarity == ClockPolarity::High);
        let cpha = u8::from(self.phase == ClockPhase::Second);
        cpol | (cpha << 1)
    }

    fn select(&self) -> [u8; 2] {
        let op = match self.chip_select_active {
            ChipSelectActive::Low => cmd::GPIO_LOW,
            ChipSelectActive::High => cmd::GPIO_HIGH,
        };
        [op, self.chip_select]
    }

    fn deselect(&self) -> [u8; 2] {
        let op = match self.chip_select_active {
            ChipSelectActive::Low => cmd::GPIO_HIGH,
            ChipSelectActive::High => cmd::GPIO_LOW,
        };
        [op, self.chip_select]
    }
}

/// Handle for the port's SPI master.
pub struct Spi<'a, C: ByteChannel> {
    port: &'a mut Port<C>,
    settings: SpiSettings,
}

impl<C: ByteChannel> Port<C> {
    /// The port's SPI master, enabling it on first use.
    ///
    /// Enabling drives chip select to its inactive level and configures the
    /// bus in one burst. Once enabled, `config` is ignored until
    /// [`Spi::disable`].
    pub fn spi(&mut self, config: &SpiConfig) -> Result<Spi<'_, C>> {
        let settings = match self.spi {
            Some(settings) => {
                debug!(port = %self.name(), "SPI already enabled");
                settings
            }
            None => {
                let settings = SpiSettings::from_config(config)?;
                let mut burst = self.burst();
                burst.simple(&settings.deselect(), None);
                burst.simple(
                    &[
                        cmd::ENABLE_SPI,
                        settings.mode_bits(),
                        settings.clock_reg,
                        settings.clock_div,
                    ],
                    None,
                );
                burst.commit()?;
                self.spi = Some(settings);
                self.set_mode(Mode::Spi);
                info!(
                    port = %self.name(),
                    clock_speed = config.clock_speed,
                    clock_reg = settings.clock_reg,
                    clock_div = settings.clock_div,
                    "SPI enabled"
                );
                settings
            }
        };
        Ok(Spi {
            port: self,
            settings,
        })
    }
}

impl<C: ByteChannel> Spi<'_, C> {
    pub fn settings(&self) -> &SpiSettings {
        &self.settings
    }

    /// Clock out `data`; `completion` runs once it has been sent.
    pub fn send(&mut self, data: &[u8], completion: Option<Completion>) -> Result<()> {
        let settings = self.settings;
        let mut burst = self.port.burst();
        burst.simple(&settings.select(), None);
        burst.tx(data, completion)?;
        burst.simple(&settings.deselect(), None);
        burst.commit()
    }

    /// Clock in `len` bytes (1-255).
    pub fn receive<F>(&mut self, len: usize, callback: F) -> Result<()>
    where
        F: FnOnce(tessel_frame::Result<Bytes>) + Send + 'static,
    {
        let settings = self.settings;
        let mut burst = self.port.burst();
        burst.simple(&settings.select(), None);
        burst.rx(len, Some(data_reply(callback)))?;
        burst.simple(&settings.deselect(), None);
        burst.commit()
    }

    /// Full-duplex exchange of `data.len()` bytes (1-255).
    pub fn transfer<F>(&mut self, data: &[u8], callback: F) -> Result<()>
    where
        F: FnOnce(tessel_frame::Result<Bytes>) + Send + 'static,
    {
        let settings = self.settings;
        let mut burst = self.port.burst();
        burst.simple(&settings.select(), None);
        burst.txrx(data, Some(data_reply(callback)))?;
        burst.simple(&settings.deselect(), None);
        burst.commit()
    }

    /// Turn the SPI master off. The next [`Port::spi`] enables it afresh.
    pub fn disable(self) -> Result<()> {
        let mut burst = self.port.burst();
        burst.simple(&[cmd::DISABLE_SPI], None);
        burst.commit()?;
        self.port.spi = None;
        if self.port.mode() == Mode::Spi {
            self.port.set_mode(Mode::None);
        }
        info!(port = %self.port.name(), "SPI disabled");
        Ok(())
    }
}
