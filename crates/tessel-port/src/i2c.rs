use bytes::Bytes;
use tessel_frame::{cmd, Completion};
use tessel_transport::ByteChannel;
use tracing::{debug, info};

use crate::config::I2cConfig;
use crate::error::{PortError, Result};
use crate::port::{data_reply, Mode, Port, REFERENCE_CLOCK_HZ};

pub const MIN_FREQUENCY: u32 = 90_000;
pub const MAX_FREQUENCY: u32 = 400_000;

/// Worst-case SCL rise time, in seconds.
const MAX_RISE_TIME: f64 = 1.5e-8;

/// Baud register for an I2C bus frequency.
///
/// `f = 48 MHz / (2 * (5 + baud) + 48 MHz * t_rise)`, solved for `baud` and
/// clamped to 8 bits.
pub fn compute_baud(frequency: u32) -> u8 {
    let baud = ((REFERENCE_CLOCK_HZ / f64::from(frequency)) - REFERENCE_CLOCK_HZ * MAX_RISE_TIME)
        / 2.0
        - 5.0;
    baud.floor().clamp(0.0, 255.0) as u8
}

/// Handle for one I2C slave address on a port.
pub struct I2c<'a, C: ByteChannel> {
    port: &'a mut Port<C>,
    address: u8,
}

impl<C: ByteChannel> Port<C> {
    /// Talk to the device at 7-bit `address`.
    ///
    /// The bus is enabled by the first call; later calls reuse it and ignore
    /// the requested frequency.
    pub fn i2c(&mut self, address: u8, config: &I2cConfig) -> Result<I2c<'_, C>> {
        if address > 0x7F {
            return Err(PortError::InvalidAddress(address));
        }
        if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&config.frequency) {
            return Err(PortError::InvalidFrequency(config.frequency));
        }

        let baud = compute_baud(config.frequency);
        match self.i2c_baud {
            Some(active) => {
                debug!(port = %self.name(), baud = active, "I2C already enabled");
            }
            None => {
                let mut burst = self.burst();
                burst.simple(&[cmd::ENABLE_I2C, baud], None);
                burst.commit()?;
                self.i2c_baud = Some(baud);
                self.set_mode(Mode::I2c);
                info!(port = %self.name(), frequency = config.frequency, baud, "I2C enabled");
            }
        }

        Ok(I2c {
            port: self,
            address,
        })
    }

    /// Baud register the bus was enabled with.
    pub fn i2c_baud(&self) -> Option<u8> {
        self.i2c_baud
    }
}

impl<C: ByteChannel> I2c<'_, C> {
    pub fn address(&self) -> u8 {
        self.address
    }

    fn write_address(&self) -> u8 {
        self.address << 1
    }

    fn read_address(&self) -> u8 {
        (self.address << 1) | 1
    }

    /// Write `data` to the device. `completion` runs after the STOP.
    pub fn send(&mut self, data: &[u8], completion: Option<Completion>) -> Result<()> {
        let address = self.write_address();
        let mut burst = self.port.burst();
        burst.simple(&[cmd::START, address], None);
        burst.tx(data, None)?;
        burst.simple(&[cmd::STOP], completion);
        burst.commit()
    }

    /// Read `len` bytes (1-255) from the device.
    pub fn read<F>(&mut self, len: usize, callback: F) -> Result<()>
    where
        F: FnOnce(tessel_frame::Result<Bytes>) + Send + 'static,
    {
        let address = self.read_address();
        let mut burst = self.port.burst();
        burst.simple(&[cmd::START, address], None);
        burst.rx(len, Some(data_reply(callback)))?;
        burst.simple(&[cmd::STOP], None);
        burst.commit()
    }

    /// Write `tx` (skipped when empty), then read `rx_len` bytes, with a
    /// repeated START between the two.
    pub fn transfer<F>(&mut self, tx: &[u8], rx_len: usize, callback: F) -> Result<()>
    where
        F: FnOnce(tessel_frame::Result<Bytes>) + Send + 'static,
    {
        let (write, read) = (self.write_address(), self.read_address());
        let mut burst = self.port.burst();
        if !tx.is_empty() {
            burst.simple(&[cmd::START, write], None);
            burst.tx(tx, None)?;
        }
        burst.simple(&[cmd::START, read], None);
        burst.rx(rx_len, Some(data_reply(callback)))?;
        burst.simple(&[cmd::STOP], None);
        burst.commit()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::PortConfig;
    use crate::mock::MockChannel;
    use crate::port::{on_complete, PortName};

    fn port() -> (Port<MockChannel>, MockChannel) {
        let channel = MockChannel::new();
        let port = Port::new(PortName::A, channel.clone(), &PortConfig::default()).unwrap();
        (port, channel)
    }

    fn at(frequency: u32) -> I2cConfig {
        I2cConfig { frequency }
    }

    #[test]
    fn baud_register_from_frequency() {
        assert_eq!(compute_baud(100_000), 234);
        assert_eq!(compute_baud(400_000), 54);
        assert_eq!(compute_baud(90_000), 255);
    }

    #[test]
    fn frequency_out_of_range_sends_nothing() {
        let (mut port, channel) = port();
        for frequency in [89_999, 400_001, 0] {
            assert!(matches!(
                port.i2c(0x48, &at(frequency)),
                Err(PortError::InvalidFrequency(f)) if f == frequency
            ));
        }
        assert!(matches!(
            port.i2c(0x80, &at(100_000)),
            Err(PortError::InvalidAddress(0x80))
        ));
        assert!(channel.written().is_empty());
        assert_eq!(port.mode(), Mode::None);
    }

    #[test]
    fn enable_is_sent_once() {
        let (mut port, channel) = port();
        port.i2c(0x48, &at(100_000)).unwrap();
        port.i2c(0x20, &at(400_000)).unwrap();
        assert_eq!(channel.written(), vec![cmd::ENABLE_I2C, 234]);
        assert_eq!(port.i2c_baud(), Some(234));
        assert_eq!(port.mode(), Mode::I2c);
    }

    #[test]
    fn read_is_one_burst() {
        let (mut port, channel) = port();
        let received = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&received);

        port.i2c(0x48, &at(100_000)).unwrap();
        channel.take_written();
        port.i2c(0x48, &at(100_000))
            .unwrap()
            .read(4, move |r| *slot.lock().unwrap() = Some(r.unwrap()))
            .unwrap();

        assert_eq!(
            channel.written(),
            vec![cmd::START, 0x91, cmd::RX, 4, cmd::STOP]
        );
        assert_eq!(channel.write_calls(), 2);
        assert_eq!(port.pending_replies(), 1);

        port.receive(&[0x84, 1, 2]).unwrap();
        assert!(received.lock().unwrap().is_none());
        port.receive(&[3, 4]).unwrap();
        assert_eq!(
            received.lock().unwrap().as_deref(),
            Some(&[1u8, 2, 3, 4][..])
        );
        assert_eq!(port.obligations(), 0);
    }

    #[test]
    fn send_fences_after_stop() {
        let (mut port, channel) = port();
        let mut i2c = port.i2c(0x1D, &at(100_000)).unwrap();
        channel.take_written();
        i2c.send(&[0x2A, 0x01], on_complete(|r| assert!(r.is_ok())))
            .unwrap();

        assert_eq!(
            channel.written(),
            vec![
                cmd::START,
                0x3A,
                cmd::TX,
                2,
                0x2A,
                0x01,
                cmd::STOP,
                cmd::ECHO,
                1,
                0x88
            ]
        );
        port.receive(&[0x84, 0x88]).unwrap();
        assert_eq!(port.obligations(), 0);
    }

    #[test]
    fn transfer_skips_empty_write_phase() {
        let (mut port, channel) = port();
        let mut i2c = port.i2c(0x1D, &at(100_000)).unwrap();
        channel.take_written();

        i2c.transfer(&[0x0D], 1, |_| {}).unwrap();
        i2c.transfer(&[], 2, |_| {}).unwrap();
        assert_eq!(
            channel.written(),
            vec![
                cmd::START,
                0x3A,
                cmd::TX,
                1,
                0x0D,
                cmd::START,
                0x3B,
                cmd::RX,
                1,
                cmd::STOP,
                cmd::START,
                0x3B,
                cmd::RX,
                2,
                cmd::STOP
            ]
        );
        assert_eq!(port.pending_replies(), 2);
    }

    #[test]
    fn oversized_read_is_rejected_before_sending() {
        let (mut port, channel) = port();
        let mut i2c = port.i2c(0x1D, &at(100_000)).unwrap();
        channel.take_written();
        assert!(i2c.read(0, |_| {}).is_err());
        assert!(i2c.send(&[], None).is_err());
        assert!(channel.written().is_empty());
    }
}
