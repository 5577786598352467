use std::collections::BTreeMap;

use tessel_transport::ByteChannel;
#[cfg(unix)]
use tessel_transport::{PortStream, UnixDomainSocket};
use tracing::{debug, warn};

#[cfg(unix)]
use crate::config::BoardConfig;
use crate::error::{PortError, Result};
use crate::port::{Port, PortName};

/// The set of open module ports, one engine per port.
pub struct Board<C: ByteChannel> {
    ports: BTreeMap<PortName, Port<C>>,
}

#[cfg(unix)]
impl Board<PortStream> {
    /// Connect every port that has an endpoint configured.
    pub fn open(config: &BoardConfig) -> Result<Self> {
        let mut board = Self::new();
        for name in PortName::ALL {
            let Some(path) = config.path(name) else {
                debug!(port = %name, "port disabled");
                continue;
            };
            let stream = UnixDomainSocket::connect(path)?;
            board.insert(Port::new(name, stream, &config.port)?);
        }
        Ok(board)
    }
}

impl<C: ByteChannel> Default for Board<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ByteChannel> Board<C> {
    pub fn new() -> Self {
        Self {
            ports: BTreeMap::new(),
        }
    }

    /// Register a port, returning the one it replaces.
    pub fn insert(&mut self, port: Port<C>) -> Option<Port<C>> {
        self.ports.insert(port.name(), port)
    }

    pub fn port(&mut self, name: PortName) -> Result<&mut Port<C>> {
        self.ports
            .get_mut(&name)
            .ok_or(PortError::PortDisabled(name))
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port<C>> {
        self.ports.values()
    }

    pub fn obligations(&self) -> usize {
        self.ports.values().map(Port::obligations).sum()
    }

    /// Poll every port in turn until none has anything outstanding.
    ///
    /// A port that faults stops being polled; the others keep going. The
    /// first fault is returned once the rest are idle.
    pub fn run_until_idle(&mut self) -> Result<()> {
        let mut first_error = None;
        loop {
            let mut busy = false;
            for port in self.ports.values_mut() {
                if port.is_faulted() || port.obligations() == 0 {
                    continue;
                }
                busy = true;
                if let Err(err) = port.poll() {
                    first_error.get_or_insert(err);
                }
            }
            if !busy {
                break;
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Close every port.
    pub fn close(&mut self) -> Result<()> {
        let mut first_error = None;
        for port in self.ports.values_mut() {
            if let Err(err) = port.close() {
                warn!(port = %port.name(), error = %err, "error closing port");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<C: ByteChannel> Drop for Board<C> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::sync::{Arc, Mutex};

    use tessel_frame::{cmd, FrameError};

    use super::*;
    use crate::config::PortConfig;
    use crate::mock::MockChannel;
    use crate::port::on_complete;

    fn board() -> (Board<MockChannel>, MockChannel, MockChannel) {
        let (a, b) = (MockChannel::new(), MockChannel::new());
        let mut board = Board::new();
        board.insert(Port::new(PortName::A, a.clone(), &PortConfig::default()).unwrap());
        board.insert(Port::new(PortName::B, b.clone(), &PortConfig::default()).unwrap());
        (board, a, b)
    }

    #[test]
    fn missing_port_is_disabled() {
        let mut board: Board<MockChannel> = Board::new();
        assert!(matches!(
            board.port(PortName::B),
            Err(PortError::PortDisabled(PortName::B))
        ));
    }

    #[test]
    fn runs_every_port_to_idle() {
        let (mut board, a, b) = board();
        board.port(PortName::A).unwrap().pin(1).unwrap().high(on_complete(|_| {})).unwrap();
        board.port(PortName::B).unwrap().pin(2).unwrap().read(|_| {}).unwrap();
        assert_eq!(board.obligations(), 2);

        a.push_inbound(&[0x84, 0x88]);
        b.push_inbound(&[0x83]);
        board.run_until_idle().unwrap();
        assert_eq!(board.obligations(), 0);
    }

    #[test]
    fn fault_on_one_port_leaves_the_other_running() {
        let (mut board, a, b) = board();
        let done = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&done);
        board.port(PortName::A).unwrap().pin(0).unwrap().read(|_| {}).unwrap();
        board
            .port(PortName::B)
            .unwrap()
            .pin(0)
            .unwrap()
            .read(move |r| *flag.lock().unwrap() = r.is_ok())
            .unwrap();

        // DATA where a bit reply is expected.
        a.push_inbound(&[0x84, 0x00]);
        b.push_inbound(&[0x82]);
        let err = board.run_until_idle().unwrap_err();
        assert!(matches!(err, PortError::Frame(FrameError::UnexpectedData)));

        assert!(*done.lock().unwrap());
        assert!(board.port(PortName::A).unwrap().is_faulted());
        assert!(!board.port(PortName::B).unwrap().is_faulted());
    }

    #[test]
    fn close_shuts_every_channel() {
        let (mut board, a, b) = board();
        board.close().unwrap();
        assert!(a.is_shut_down());
        assert!(b.is_shut_down());
    }

    #[cfg(unix)]
    #[test]
    fn open_connects_configured_ports() {
        let dir = std::env::temp_dir().join(format!("tessel-board-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("port_b");
        let listener = UnixDomainSocket::bind(&path).unwrap();

        let config = BoardConfig {
            port_a: None,
            port_b: Some(path.clone()),
            port: PortConfig::default(),
        };
        let mut board = Board::open(&config).unwrap();
        let mut coprocessor = listener.accept().unwrap();
        assert!(board.port(PortName::A).is_err());

        let port = board.port(PortName::B).unwrap();
        port.pin(7).unwrap().high(on_complete(|r| assert!(r.is_ok()))).unwrap();
        let mut command = [0u8; 5];
        coprocessor.read_exact(&mut command).unwrap();
        assert_eq!(command, [cmd::GPIO_HIGH, 7, cmd::ECHO, 1, 0x88]);
        coprocessor.write_all(&[0x84, 0x88]).unwrap();

        board.run_until_idle().unwrap();
        assert!(!board.port(PortName::B).unwrap().keep_alive());

        drop(board);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn open_fails_for_missing_endpoint() {
        let config = BoardConfig {
            port_a: Some(std::path::PathBuf::from("/nonexistent/tessel/port_a")),
            port_b: None,
            port: PortConfig::default(),
        };
        assert!(matches!(
            Board::open(&config),
            Err(PortError::Transport(_))
        ));
    }
}
