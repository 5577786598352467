use std::io;

use bytes::{Buf, Bytes};
use tessel_frame::{cmd, Completion};
use tessel_transport::ByteChannel;
use tracing::{debug, info};

use crate::config::UartConfig;
use crate::error::{PortError, Result};
use crate::port::{Mode, Port, REFERENCE_CLOCK_HZ};

pub const MIN_BAUD_RATE: u32 = 9_600;
pub const MAX_BAUD_RATE: u32 = 115_200;

const SAMPLES_PER_BIT: f64 = 16.0;

/// Baud register for the coprocessor's fractional baud generator:
/// `65536 * (1 - 16 * baud / 48 MHz)`, rounded.
pub fn compute_baud_register(baud_rate: u32) -> u16 {
    let register = 65536.0 * (1.0 - SAMPLES_PER_BIT * (f64::from(baud_rate) / REFERENCE_CLOCK_HZ));
    register.round().clamp(0.0, f64::from(u16::MAX)) as u16
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct UartState {
    pub(crate) baud_rate: u32,
    pub(crate) enabled: bool,
}

/// Handle for the port's UART.
///
/// Received bytes arrive asynchronously and are buffered on the port until
/// read; call [`Port::poll`] to pull them in. Implements [`io::Read`] and
/// [`io::Write`].
pub struct Uart<'a, C: ByteChannel> {
    port: &'a mut Port<C>,
}

impl<C: ByteChannel> Port<C> {
    /// The port's UART, enabling it if it is not already running.
    ///
    /// An enabled UART holds the port referenced until
    /// [`Uart::disable`].
    pub fn uart(&mut self, config: &UartConfig) -> Result<Uart<'_, C>> {
        if let Some(state) = self.uart.filter(|state| state.enabled) {
            debug!(port = %self.name(), baud_rate = state.baud_rate, "UART already enabled");
            return Ok(Uart { port: self });
        }

        if !(MIN_BAUD_RATE..=MAX_BAUD_RATE).contains(&config.baud_rate) {
            return Err(PortError::InvalidBaudRate(config.baud_rate));
        }
        let register = compute_baud_register(config.baud_rate);
        let [hi, lo] = register.to_be_bytes();

        let mut burst = self.burst();
        burst.simple(&[cmd::ENABLE_UART, hi, lo], None);
        burst.commit()?;

        self.acquire();
        self.uart = Some(UartState {
            baud_rate: config.baud_rate,
            enabled: true,
        });
        self.set_mode(Mode::Uart);
        info!(port = %self.name(), baud_rate = config.baud_rate, register, "UART enabled");
        Ok(Uart { port: self })
    }
}

impl<C: ByteChannel> Uart<'_, C> {
    pub fn is_enabled(&self) -> bool {
        self.port.uart.is_some_and(|state| state.enabled)
    }

    pub fn baud_rate(&self) -> Option<u32> {
        self.port.uart.map(|state| state.baud_rate)
    }

    /// Transmit `data`, chunked into TX commands. `completion` runs once the
    /// coprocessor has taken all of it.
    pub fn send(&mut self, data: &[u8], completion: Option<Completion>) -> Result<()> {
        if !self.is_enabled() {
            return Err(PortError::UartDisabled(self.port.name()));
        }
        let mut burst = self.port.burst();
        burst.tx(data, completion)?;
        burst.commit()
    }

    /// Bytes received and not yet read.
    pub fn available(&self) -> usize {
        self.port.uart_rx.len()
    }

    /// Take everything received so far.
    pub fn take_received(&mut self) -> Bytes {
        self.port.uart_rx.split().freeze()
    }

    /// Stop the UART and release the port. Later sends fail.
    pub fn disable(&mut self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let mut burst = self.port.burst();
        burst.simple(&[cmd::DISABLE_UART, 0, 0], None);
        burst.commit()?;

        if let Some(state) = self.port.uart.as_mut() {
            state.enabled = false;
        }
        self.port.release();
        if self.port.mode() == Mode::Uart {
            self.port.set_mode(Mode::None);
        }
        info!(port = %self.port.name(), "UART disabled");
        Ok(())
    }
}

impl<C: ByteChannel> io::Read for Uart<'_, C> {
    /// Copies buffered bytes. An empty buffer is `WouldBlock` while the UART
    /// is enabled and end of stream once it is disabled.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rx = &mut self.port.uart_rx;
        if rx.is_empty() && !buf.is_empty() {
            if self.port.uart.is_some_and(|state| state.enabled) {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            return Ok(0);
        }
        let n = buf.len().min(rx.len());
        buf[..n].copy_from_slice(&rx[..n]);
        rx.advance(n);
        Ok(n)
    }
}

impl<C: ByteChannel> io::Write for Uart<'_, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.send(buf, None).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;
    use crate::config::PortConfig;
    use crate::mock::MockChannel;
    use crate::port::{on_complete, PortName};

    fn port() -> (Port<MockChannel>, MockChannel) {
        let channel = MockChannel::new();
        let port = Port::new(PortName::A, channel.clone(), &PortConfig::default()).unwrap();
        (port, channel)
    }

    #[test]
    fn baud_register() {
        assert_eq!(compute_baud_register(9_600), 65_326);
        assert_eq!(compute_baud_register(115_200), 63_019);
    }

    #[test]
    fn baud_out_of_range_sends_nothing() {
        let (mut port, channel) = port();
        for baud_rate in [9_599, 115_201] {
            assert!(matches!(
                port.uart(&UartConfig { baud_rate }),
                Err(PortError::InvalidBaudRate(b)) if b == baud_rate
            ));
        }
        assert!(channel.written().is_empty());
        assert_eq!(port.obligations(), 0);
    }

    #[test]
    fn enable_once_and_hold_reference() {
        let (mut port, channel) = port();
        port.uart(&UartConfig::default()).unwrap();
        port.uart(&UartConfig { baud_rate: 115_200 }).unwrap();

        let [hi, lo] = 65_326u16.to_be_bytes();
        assert_eq!(channel.written(), vec![cmd::ENABLE_UART, hi, lo]);
        assert_eq!(port.obligations(), 1);
        assert!(port.keep_alive());
        assert_eq!(port.mode(), Mode::Uart);
    }

    #[test]
    fn received_chunks_are_buffered() {
        let (mut port, _channel) = port();
        port.uart(&UartConfig::default()).unwrap();

        // Header plus one byte, then the rest.
        port.receive(&[0xD0, 4, b'p']).unwrap();
        assert_eq!(port.uart(&UartConfig::default()).unwrap().available(), 0);
        port.receive(&[b'i', b'n', b'g']).unwrap();

        let mut uart = port.uart(&UartConfig::default()).unwrap();
        assert_eq!(uart.available(), 4);
        let mut buf = [0u8; 3];
        assert_eq!(uart.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"pin");
        assert_eq!(uart.take_received(), Bytes::from_static(b"g"));
        assert_eq!(
            uart.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[test]
    fn send_chunks_and_fences() {
        let (mut port, channel) = port();
        let mut uart = port.uart(&UartConfig::default()).unwrap();
        channel.take_written();

        uart.send(b"hi", on_complete(|_| {})).unwrap();
        uart.write_all(b"!").unwrap();
        assert_eq!(
            channel.written(),
            vec![cmd::TX, 2, b'h', b'i', cmd::ECHO, 1, 0x88, cmd::TX, 1, b'!']
        );
        assert_eq!(port.obligations(), 2);
    }

    #[test]
    fn disable_releases_and_rejects_writes() {
        let (mut port, channel) = port();
        let mut uart = port.uart(&UartConfig::default()).unwrap();
        uart.disable().unwrap();
        uart.disable().unwrap();

        assert!(matches!(
            uart.send(b"x", None),
            Err(PortError::UartDisabled(PortName::A))
        ));
        assert!(uart.write(b"x").is_err());
        let mut buf = [0u8; 1];
        assert_eq!(uart.read(&mut buf).unwrap(), 0);

        assert_eq!(channel.written()[3..], [cmd::DISABLE_UART, 0, 0]);
        assert_eq!(port.obligations(), 0);
        assert!(!port.keep_alive());
        assert_eq!(port.mode(), Mode::None);
    }

    #[test]
    fn uart_can_be_enabled_again() {
        let (mut port, channel) = port();
        port.uart(&UartConfig::default()).unwrap().disable().unwrap();
        port.uart(&UartConfig { baud_rate: 115_200 }).unwrap();

        let [hi, lo] = 63_019u16.to_be_bytes();
        assert_eq!(channel.written()[6..], [cmd::ENABLE_UART, hi, lo]);
        assert_eq!(port.obligations(), 1);
    }

    #[test]
    fn bytes_before_enable_are_dropped() {
        let (mut port, _channel) = port();
        port.receive(&[0xD0, 1, b'x']).unwrap();
        assert_eq!(port.uart(&UartConfig::default()).unwrap().available(), 0);
    }
}
