use tessel_frame::{Completion, CommandWriter};
use tessel_transport::ByteChannel;

use crate::error::Result;
use crate::port::Port;

/// A group of commands written to the port as one unit.
///
/// The burst holds the port mutably, so no other command can be issued until
/// it is committed or dropped. Dropping it without [`commit`](Self::commit)
/// discards everything: no bytes are sent and no completion runs.
///
/// ```ignore
/// let mut burst = port.burst();
/// burst.simple(&[cmd::START, 0x48 << 1], None);
/// burst.tx(&[0x01, 0x02], None)?;
/// burst.simple(&[cmd::STOP], on_complete(|_| {}));
/// burst.commit()?;
/// ```
#[must_use = "a burst sends nothing until committed"]
pub struct CommandBurst<'a, C: ByteChannel> {
    port: &'a mut Port<C>,
    writer: CommandWriter,
}

impl<C: ByteChannel> Port<C> {
    /// Start an atomic command sequence.
    pub fn burst(&mut self) -> CommandBurst<'_, C> {
        CommandBurst {
            port: self,
            writer: CommandWriter::new(),
        }
    }
}

impl<C: ByteChannel> CommandBurst<'_, C> {
    /// Raw command bytes with no reply.
    pub fn command(&mut self, bytes: &[u8]) -> &mut Self {
        self.writer.command(bytes);
        self
    }

    /// Command fenced by an ECHO when `completion` is given.
    pub fn simple(&mut self, bytes: &[u8], completion: Option<Completion>) -> &mut Self {
        self.writer.simple(bytes, completion);
        self
    }

    /// Command answered by a HIGH/LOW byte.
    pub fn status(&mut self, bytes: &[u8], completion: Option<Completion>) -> &mut Self {
        self.writer.status(bytes, completion);
        self
    }

    /// Command answered by `size` data bytes.
    pub fn request(&mut self, bytes: &[u8], size: u8, completion: Option<Completion>) -> &mut Self {
        self.writer.request(bytes, size, completion);
        self
    }

    pub fn sync(&mut self, completion: Option<Completion>) -> &mut Self {
        self.writer.sync(completion);
        self
    }

    pub fn tx(&mut self, data: &[u8], completion: Option<Completion>) -> Result<&mut Self> {
        self.writer.tx(data, completion)?;
        Ok(self)
    }

    pub fn rx(&mut self, len: usize, completion: Option<Completion>) -> Result<&mut Self> {
        self.writer.rx(len, completion)?;
        Ok(self)
    }

    pub fn txrx(&mut self, data: &[u8], completion: Option<Completion>) -> Result<&mut Self> {
        self.writer.txrx(data, completion)?;
        Ok(self)
    }

    /// Encoded bytes so far.
    pub fn as_bytes(&self) -> &[u8] {
        self.writer.as_bytes()
    }

    /// Queue the burst's reply descriptors and write it to the channel.
    pub fn commit(self) -> Result<()> {
        let Self { port, writer } = self;
        port.submit(writer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tessel_frame::cmd;

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
    fn commit_writes_once_with_descriptors_queued() {
        let (mut port, channel) = port();
        let mut burst = port.burst();
        burst
            .command(&[cmd::START, 0x90])
            .request(&[cmd::RX, 2], 2, None)
            .simple(&[cmd::STOP], on_complete(|_| {}));
        burst.commit().unwrap();

        assert_eq!(
            channel.written(),
            vec![cmd::START, 0x90, cmd::RX, 2, cmd::STOP, cmd::ECHO, 1, 0x88]
        );
        assert_eq!(channel.write_calls(), 1);
        assert_eq!(port.pending_replies(), 2);
        assert_eq!(port.obligations(), 2);
    }

    #[test]
    fn dropped_burst_sends_nothing() {
        let (mut port, channel) = port();
        {
            let mut burst = port.burst();
            burst.status(&[cmd::GPIO_IN, 1], None);
        }
        assert!(channel.written().is_empty());
        assert_eq!(port.pending_replies(), 0);
    }

    #[test]
    fn invalid_transfer_sends_nothing() {
        let (mut port, channel) = port();
        let fired = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&fired);

        let mut burst = port.burst();
        burst.simple(&[cmd::START, 0x90], None);
        assert!(burst.rx(300, on_complete(move |_| *flag.lock().unwrap() = true)).is_err());
        drop(burst);

        assert!(channel.written().is_empty());
        assert!(!*fired.lock().unwrap());
        assert_eq!(port.obligations(), 0);
    }

    #[test]
    fn empty_burst_is_a_no_op() {
        let (mut port, channel) = port();
        port.burst().commit().unwrap();
        assert_eq!(channel.write_calls(), 0);
    }
}
