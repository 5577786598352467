use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tessel_frame::{
    Completion, Descriptor, Frame, FrameError, FrameReader, Lifecycle, Reply, ReplyQueue,
    Transition, PIN_COUNT,
};
use tessel_transport::ByteChannel;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, trace, warn};

use crate::config::PortConfig;
use crate::error::{PortError, Result};
use crate::pin::{Pin, PinState};
use crate::spi::SpiSettings;
use crate::uart::UartState;

/// Crystal feeding the coprocessor's peripheral clocks.
pub(crate) const REFERENCE_CLOCK_HZ: f64 = 48e6;

/// Physical module port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortName {
    A,
    B,
}

impl PortName {
    pub const ALL: [PortName; 2] = [PortName::A, PortName::B];

    /// Socket exported by the port daemon for this port.
    pub fn default_path(self) -> PathBuf {
        match self {
            PortName::A => PathBuf::from("/var/run/tessel/port_a"),
            PortName::B => PathBuf::from("/var/run/tessel/port_b"),
        }
    }

    /// Every pin of port B has an ADC; port A only on pins 4 and 7.
    pub fn supports_analog_read(self, pin: u8) -> bool {
        match self {
            PortName::A => pin == 4 || pin == 7,
            PortName::B => usize::from(pin) < PIN_COUNT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortName::A => "A",
            PortName::B => "B",
        }
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "A" | "a" => Ok(PortName::A),
            "B" | "b" => Ok(PortName::B),
            other => Err(format!("unknown port '{other}' (expected A or B)")),
        }
    }
}

/// Serial peripheral currently driven on the port. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    None,
    I2c,
    Spi,
    Uart,
}

/// Protocol engine for one module port.
///
/// Owns the channel, the inbound accumulator, the reply queue and the
/// lifecycle counter. Every command goes out through a
/// [`CommandBurst`](crate::CommandBurst); every inbound byte is classified by
/// [`Port::poll`] or [`Port::receive`]. The engine is single-threaded: all
/// state is reached through `&mut self`.
pub struct Port<C: ByteChannel> {
    name: PortName,
    channel: C,
    reader: FrameReader,
    replies: ReplyQueue,
    lifecycle: Lifecycle,
    pub(crate) pins: [PinState; PIN_COUNT],
    mode: Mode,
    pub(crate) i2c_baud: Option<u8>,
    pub(crate) spi: Option<SpiSettings>,
    pub(crate) uart: Option<UartState>,
    pub(crate) uart_rx: BytesMut,
    events: Vec<UnboundedSender<u8>>,
    fault: Option<String>,
    closed: bool,
}

impl<C: ByteChannel> Port<C> {
    pub fn new(name: PortName, mut channel: C, config: &PortConfig) -> Result<Self> {
        config.validate()?;
        channel.set_read_timeout(config.read_timeout())?;
        channel.set_keep_alive(false);
        info!(port = %name, "port opened");

        Ok(Self {
            name,
            channel,
            reader: FrameReader::with_chunk_size(config.read_chunk_size),
            replies: ReplyQueue::new(),
            lifecycle: Lifecycle::new(),
            pins: std::array::from_fn(|_| PinState::default()),
            mode: Mode::None,
            i2c_baud: None,
            spi: None,
            uart: None,
            uart_rx: BytesMut::new(),
            events: Vec::new(),
            fault: None,
            closed: false,
        })
    }

    pub fn name(&self) -> PortName {
        self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Outstanding reasons to keep servicing this port: queued replies, an
    /// open UART and armed interrupts.
    pub fn obligations(&self) -> usize {
        self.lifecycle.count()
    }

    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }

    /// Keep-alive flag as last set on the channel.
    pub fn keep_alive(&self) -> bool {
        self.channel.keep_alive()
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// Why the port stopped, if it did.
    pub fn fault_reason(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Handle for pin `index` (0-7).
    pub fn pin(&mut self, index: u8) -> Result<Pin<'_, C>> {
        if usize::from(index) >= PIN_COUNT {
            return Err(PortError::InvalidPin(index));
        }
        Ok(Pin::new(self, index))
    }

    /// Receiver for asynchronous event codes that are neither pin changes nor
    /// UART data.
    pub fn subscribe_events(&mut self) -> UnboundedReceiver<u8> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events.push(tx);
        rx
    }

    /// Run `completion` once every command already sent has executed.
    pub fn sync(&mut self, completion: Completion) -> Result<()> {
        let mut burst = self.burst();
        burst.sync(Some(completion));
        burst.commit()
    }

    pub(crate) fn check_healthy(&self) -> Result<()> {
        match &self.fault {
            Some(reason) => Err(PortError::Faulted {
                port: self.name,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn acquire(&mut self) {
        let transition = self.lifecycle.acquire();
        self.apply(transition);
    }

    pub(crate) fn release(&mut self) {
        let transition = self.lifecycle.release();
        self.apply(transition);
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Referenced => {
                debug!(port = %self.name, "port referenced");
                self.channel.set_keep_alive(true);
            }
            Transition::Unreferenced => {
                if self.channel.keep_alive() {
                    debug!(port = %self.name, "port unreferenced");
                }
                self.channel.set_keep_alive(false);
            }
            Transition::Unchanged => {}
        }
    }

    /// Queue the burst's descriptors, then write its bytes in one go.
    pub(crate) fn submit(&mut self, mut writer: tessel_frame::CommandWriter) -> Result<()> {
        self.check_healthy()?;
        if writer.is_empty() {
            return Ok(());
        }

        let descriptors = writer.take_replies();
        trace!(
            port = %self.name,
            bytes = writer.as_bytes().len(),
            replies = descriptors.len(),
            "flushing command burst"
        );
        for descriptor in descriptors {
            self.replies.push(descriptor);
            self.acquire();
        }

        if let Err(err) = writer.flush_to(&mut self.channel) {
            let err = PortError::from(err);
            self.fault(&err);
            return Err(err);
        }
        Ok(())
    }

    /// Read once from the channel and dispatch every complete frame.
    ///
    /// Blocks for at most the configured read timeout. Returns the number of
    /// frames dispatched.
    pub fn poll(&mut self) -> Result<usize> {
        self.check_healthy()?;
        self.reap_listeners()?;
        if let Err(err) = self.reader.fill(&mut self.channel) {
            let err = PortError::from(err);
            self.fault(&err);
            return Err(err);
        }
        self.process()
    }

    /// Feed bytes that were read from the channel by other means.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<usize> {
        self.check_healthy()?;
        self.reap_listeners()?;
        self.reader.extend(bytes);
        self.process()
    }

    /// Poll until nothing is outstanding.
    ///
    /// An open UART or an armed edge interrupt keeps the port referenced, so
    /// this only returns once those are disabled. A reply that never arrives
    /// keeps it polling.
    pub fn run_until_idle(&mut self) -> Result<()> {
        self.check_healthy()?;
        while !self.lifecycle.is_idle() {
            self.poll()?;
        }
        Ok(())
    }

    /// Stop processing and shut the channel down. Outstanding completions
    /// are told their command was abandoned.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.fault.is_none() {
            info!(port = %self.name, "closing port");
            self.shut_down("port closed".to_string());
        }
        self.channel.shutdown()?;
        Ok(())
    }

    fn process(&mut self) -> Result<usize> {
        let mut dispatched = 0;
        loop {
            let frame = match self.reader.next_frame(self.replies.head_size()) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(dispatched),
                Err(err) => {
                    let err = PortError::from(err);
                    self.fault(&err);
                    return Err(err);
                }
            };
            trace!(port = %self.name, ?frame, "frame");
            if let Err(err) = self.dispatch(frame) {
                self.fault(&err);
                return Err(err);
            }
            dispatched += 1;
        }
    }

    fn dispatch(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Data(payload) => self.resolve(Reply::Data(payload)),
            Frame::Bit(bit) => {
                if let Some(size) = self.replies.head_size().filter(|size| *size > 0) {
                    warn!(
                        port = %self.name,
                        expected = size,
                        "bit reply resolves a command that expected data"
                    );
                }
                self.resolve(Reply::Bit(bit))
            }
            Frame::PinChange(pin) => self.pin_changed(pin),
            Frame::UartRx(payload) => {
                self.uart_received(payload);
                Ok(())
            }
            Frame::Event(code) => {
                debug!(port = %self.name, code = format_args!("{code:#04x}"), "async event");
                self.events.retain(|tx| tx.send(code).is_ok());
                Ok(())
            }
        }
    }

    fn resolve(&mut self, reply: Reply) -> Result<()> {
        let descriptor = self.replies.pop()?;
        self.release();
        descriptor.complete(Ok(reply));
        Ok(())
    }

    fn pin_changed(&mut self, pin: u8) -> Result<()> {
        let name = self.name;
        let state = &mut self.pins[usize::from(pin)];
        let Some(mode) = state.mode else {
            debug!(port = %name, pin, "pin change with no interrupt armed");
            return Ok(());
        };

        let event = crate::pin::PinEvent {
            port: name,
            pin,
            mode,
        };
        state.listeners.retain(|tx| tx.send(event).is_ok());
        debug!(port = %name, pin, %mode, "pin interrupt");

        if mode.is_one_shot() {
            state.mode = None;
            state.listeners.clear();
            self.release();
        } else if state.listeners.is_empty() {
            debug!(port = %name, pin, "no listeners left, disarming");
            self.disarm_interrupt(pin)?;
        }
        Ok(())
    }

    /// Disarm edge interrupts whose every receiver has been dropped.
    fn reap_listeners(&mut self) -> Result<()> {
        for pin in 0..PIN_COUNT {
            let state = &mut self.pins[pin];
            if state.mode.is_none() {
                continue;
            }
            state.listeners.retain(|tx| !tx.is_closed());
            if state.listeners.is_empty() {
                debug!(port = %self.name, pin, "interrupt receivers dropped, disarming");
                self.disarm_interrupt(pin as u8)?;
            }
        }
        Ok(())
    }

    fn uart_received(&mut self, payload: Bytes) {
        if self.uart.is_some() {
            trace!(port = %self.name, len = payload.len(), "uart rx");
            self.uart_rx.extend_from_slice(&payload);
        } else {
            debug!(port = %self.name, len = payload.len(), "dropping UART bytes, UART never enabled");
        }
    }

    fn fault(&mut self, err: &PortError) {
        if self.fault.is_some() {
            return;
        }
        error!(port = %self.name, error = %err, "port faulted");
        self.shut_down(err.to_string());
    }

    fn shut_down(&mut self, reason: String) {
        self.fault = Some(reason);
        self.reader.clear();

        let abandoned: Vec<Descriptor> = self.replies.drain().collect();
        if !abandoned.is_empty() {
            warn!(port = %self.name, count = abandoned.len(), "abandoning outstanding commands");
        }
        for pin in &mut self.pins {
            pin.mode = None;
            pin.listeners.clear();
        }
        self.events.clear();
        self.lifecycle = Lifecycle::new();
        self.channel.set_keep_alive(false);

        for descriptor in abandoned {
            descriptor.complete(Err(FrameError::Abandoned));
        }
    }
}

impl<C: ByteChannel> fmt::Debug for Port<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("obligations", &self.lifecycle.count())
            .field("pending_replies", &self.replies.len())
            .field("fault", &self.fault)
            .finish()
    }
}

/// Completion that reports only success or failure.
pub fn on_complete<F>(callback: F) -> Option<Completion>
where
    F: FnOnce(tessel_frame::Result<()>) + Send + 'static,
{
    Some(Box::new(move |result| callback(result.map(|_| ()))))
}

/// Completion that converts the reply before handing it on.
pub(crate) fn map_reply<T, F, M>(callback: F, map: M) -> Completion
where
    F: FnOnce(tessel_frame::Result<T>) + Send + 'static,
    M: FnOnce(Reply) -> tessel_frame::Result<T> + Send + 'static,
{
    Box::new(move |result| callback(result.and_then(map)))
}

/// Completion for commands answered with a data payload.
pub(crate) fn data_reply<F>(callback: F) -> Completion
where
    F: FnOnce(tessel_frame::Result<Bytes>) + Send + 'static,
{
    map_reply(callback, |reply| Ok(reply.into_data()))
}
