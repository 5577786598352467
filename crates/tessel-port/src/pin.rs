use tessel_frame::{cmd, Completion, InterruptMode, Reply};
use tessel_transport::ByteChannel;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::error::{PortError, Result};
use crate::port::{map_reply, Port, PortName};

/// Pins that can raise interrupts.
pub const INTERRUPT_PINS: [u8; 4] = [2, 5, 6, 7];

/// The `G1`-`G3` digital pins. The first is the default SPI chip select.
pub const DIGITAL_PINS: [u8; 3] = [5, 6, 7];

/// The only pin with a DAC.
pub const ANALOG_WRITE_PIN: (PortName, u8) = (PortName::B, 7);

const ANALOG_RESOLUTION: f64 = 4096.0;
const ANALOG_REFERENCE_VOLTS: f64 = 3.3;
const DAC_MAX: f64 = 1023.0;

/// A pin interrupt delivered to a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    pub port: PortName,
    pub pin: u8,
    pub mode: InterruptMode,
}

/// Stream of interrupts for one [`Pin::listen`] call.
///
/// Level triggers deliver one event and then close.
pub type PinEvents = UnboundedReceiver<PinEvent>;

#[derive(Debug, Default)]
pub(crate) struct PinState {
    pub(crate) mode: Option<InterruptMode>,
    pub(crate) listeners: Vec<UnboundedSender<PinEvent>>,
}

/// Handle for one pin of a port.
pub struct Pin<'a, C: ByteChannel> {
    port: &'a mut Port<C>,
    index: u8,
}

impl<'a, C: ByteChannel> Pin<'a, C> {
    pub(crate) fn new(port: &'a mut Port<C>, index: u8) -> Self {
        Self { port, index }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn supports_interrupts(&self) -> bool {
        INTERRUPT_PINS.contains(&self.index)
    }

    pub fn supports_analog_read(&self) -> bool {
        self.port.name().supports_analog_read(self.index)
    }

    pub fn interrupt_mode(&self) -> Option<InterruptMode> {
        self.port.pins[usize::from(self.index)].mode
    }

    pub fn high(&mut self, completion: Option<Completion>) -> Result<()> {
        self.simple(cmd::GPIO_HIGH, completion)
    }

    pub fn low(&mut self, completion: Option<Completion>) -> Result<()> {
        self.simple(cmd::GPIO_LOW, completion)
    }

    pub fn toggle(&mut self, completion: Option<Completion>) -> Result<()> {
        self.simple(cmd::GPIO_TOGGLE, completion)
    }

    /// Configure the pin as an input.
    pub fn input(&mut self, completion: Option<Completion>) -> Result<()> {
        self.simple(cmd::GPIO_INPUT, completion)
    }

    /// Drive the pin as an output at `value`.
    pub fn output(&mut self, value: bool, completion: Option<Completion>) -> Result<()> {
        if value {
            self.high(completion)
        } else {
            self.low(completion)
        }
    }

    pub fn write(&mut self, value: bool, completion: Option<Completion>) -> Result<()> {
        self.output(value, completion)
    }

    /// Read the pin level without changing its direction.
    pub fn raw_read<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(tessel_frame::Result<bool>) + Send + 'static,
    {
        self.read_level(cmd::GPIO_RAW_READ, callback)
    }

    /// Configure the pin as an input and read its level.
    pub fn read<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(tessel_frame::Result<bool>) + Send + 'static,
    {
        self.read_level(cmd::GPIO_IN, callback)
    }

    /// Sample the ADC, in volts.
    ///
    /// On a pin without an ADC this logs a warning and sends nothing.
    pub fn analog_read<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(tessel_frame::Result<f64>) + Send + 'static,
    {
        if !self.supports_analog_read() {
            warn!(
                port = %self.port.name(),
                pin = self.index,
                "analog read is only supported on port A pins 4 and 7 and on all pins of port B"
            );
            return Ok(());
        }

        let completion = map_reply(callback, |reply| {
            let data = reply.into_data();
            if data.len() < 2 {
                return Err(tessel_frame::FrameError::InvalidLength {
                    len: data.len(),
                    max: 2,
                });
            }
            let raw = u16::from_le_bytes([data[0], data[1]]);
            Ok(f64::from(raw) / ANALOG_RESOLUTION * ANALOG_REFERENCE_VOLTS)
        });
        let mut burst = self.port.burst();
        burst.request(&[cmd::ANALOG_READ, self.index], 2, Some(completion));
        burst.commit()
    }

    /// Drive the DAC to `volts` (0 to 3.3 V). Only port B pin 7 has one.
    pub fn analog_write(&mut self, volts: f64) -> Result<()> {
        let port = self.port.name();
        if (port, self.index) != ANALOG_WRITE_PIN {
            return Err(PortError::AnalogWriteUnsupported {
                port,
                pin: self.index,
            });
        }

        let value = volts / ANALOG_REFERENCE_VOLTS * DAC_MAX;
        if !(0.0..=DAC_MAX).contains(&value) {
            return Err(PortError::AnalogOutOfRange(volts));
        }
        let [hi, lo] = (value as u16).to_be_bytes();

        let mut burst = self.port.burst();
        burst.command(&[cmd::ANALOG_WRITE, hi, lo]);
        burst.commit()
    }

    /// Arm an interrupt and subscribe to it.
    ///
    /// Listening again with the armed mode adds a subscriber; a different
    /// mode is rejected until the pin is disarmed. Edge triggers stay armed
    /// while any subscriber remains; level triggers fire once.
    pub fn listen(&mut self, mode: InterruptMode) -> Result<PinEvents> {
        let pin = self.index;
        if !self.supports_interrupts() {
            return Err(PortError::InterruptUnsupported { pin });
        }

        match self.interrupt_mode() {
            Some(active) if active != mode => {
                return Err(PortError::InterruptConflict {
                    pin,
                    requested: mode,
                    active,
                })
            }
            Some(_) => {}
            None => {
                let mut burst = self.port.burst();
                burst.simple(&[cmd::GPIO_INT, pin | (mode.bits() << 4)], None);
                burst.commit()?;
                self.port.acquire();
                self.port.pins[usize::from(pin)].mode = Some(mode);
                debug!(port = %self.port.name(), pin, %mode, "interrupt armed");
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.port.pins[usize::from(pin)].listeners.push(tx);
        Ok(rx)
    }

    /// Clear the armed interrupt, closing every subscriber.
    pub fn disarm(&mut self) -> Result<()> {
        self.port.disarm_interrupt(self.index)
    }

    fn simple(&mut self, op: u8, completion: Option<Completion>) -> Result<()> {
        let mut burst = self.port.burst();
        burst.simple(&[op, self.index], completion);
        burst.commit()
    }

    fn read_level<F>(&mut self, op: u8, callback: F) -> Result<()>
    where
        F: FnOnce(tessel_frame::Result<bool>) + Send + 'static,
    {
        let completion = map_reply(callback, |reply| Ok(matches!(reply, Reply::Bit(true))));
        let mut burst = self.port.burst();
        burst.status(&[op, self.index], Some(completion));
        burst.commit()
    }
}

impl<C: ByteChannel> Port<C> {
    /// Digital pin `G1`-`G3` by its 1-based alias number.
    pub fn digital(&mut self, number: u8) -> Result<Pin<'_, C>> {
        match usize::from(number).checked_sub(1).and_then(|i| DIGITAL_PINS.get(i)) {
            Some(&index) => Ok(Pin::new(self, index)),
            None => Err(PortError::InvalidPin(number)),
        }
    }

    pub(crate) fn disarm_interrupt(&mut self, pin: u8) -> Result<()> {
        let state = &mut self.pins[usize::from(pin)];
        let Some(mode) = state.mode.take() else {
            return Ok(());
        };
        state.listeners.clear();

        let mut burst = self.burst();
        burst.simple(&[cmd::GPIO_INT, pin], None);
        let sent = burst.commit();
        self.release();
        debug!(port = %self.name(), pin, %mode, "interrupt disarmed");
        sent
    }
}
