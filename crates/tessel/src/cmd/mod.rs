use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use tessel_port::{Board, BoardConfig, InterruptMode, Pin, Port, PortName};
use tessel_transport::PortStream;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::exit::{
    frame_error, io_error, port_error, CliError, CliResult, INTERNAL, TIMEOUT, USAGE,
};
use crate::output::OutputFormat;

pub mod analog;
pub mod i2c;
pub mod pin;
pub mod spi;
pub mod uart;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive or read a GPIO pin.
    Pin(PinArgs),
    /// Arm a pin interrupt and print each event.
    Watch(WatchArgs),
    /// Sample the ADC, or drive the DAC with --write.
    Analog(AnalogArgs),
    /// Write to and/or read from an I2C device.
    I2c(I2cArgs),
    /// Full-duplex SPI transfer.
    Spi(SpiArgs),
    /// Send or receive on the port's UART.
    Uart(UartArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, board: &BoardArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Pin(args) => pin::run(args, board, format),
        Command::Watch(args) => watch::run(args, board, format),
        Command::Analog(args) => analog::run(args, board, format),
        Command::I2c(args) => i2c::run(args, board, format),
        Command::Spi(args) => spi::run(args, board, format),
        Command::Uart(args) => uart::run(args, board, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where the coprocessors live and how long to wait for them.
#[derive(Args, Debug)]
pub struct BoardArgs {
    /// Endpoint for port A.
    #[arg(long, value_name = "PATH", env = "TESSEL_PORT_A", global = true)]
    pub port_a: Option<PathBuf>,
    /// Endpoint for port B.
    #[arg(long, value_name = "PATH", env = "TESSEL_PORT_B", global = true)]
    pub port_b: Option<PathBuf>,
    /// Board configuration file (JSON).
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
    /// Maximum time to wait for a reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    pub timeout: String,
}

impl BoardArgs {
    /// Board configuration with only `target` enabled.
    pub fn board_config(&self, target: PortName) -> CliResult<BoardConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let context = format!("read {}", path.display());
                let text = std::fs::read_to_string(path).map_err(|err| io_error(&context, err))?;
                serde_json::from_str(&text).map_err(|err| {
                    CliError::new(USAGE, format!("invalid config {}: {err}", path.display()))
                })?
            }
            None => BoardConfig::default(),
        };

        if let Some(path) = &self.port_a {
            config.port_a = Some(path.clone());
        }
        if let Some(path) = &self.port_b {
            config.port_b = Some(path.clone());
        }
        match target {
            PortName::A => config.port_b = None,
            PortName::B => config.port_a = None,
        }
        Ok(config)
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PinAction {
    Read,
    RawRead,
    High,
    Low,
    Toggle,
    Input,
}

impl PinAction {
    pub fn name(self) -> &'static str {
        match self {
            PinAction::Read => "read",
            PinAction::RawRead => "raw-read",
            PinAction::High => "high",
            PinAction::Low => "low",
            PinAction::Toggle => "toggle",
            PinAction::Input => "input",
        }
    }
}

#[derive(Args, Debug)]
pub struct PinArgs {
    /// Port name (A or B).
    pub port: PortName,
    /// Pin index (0-7).
    pub pin: u8,
    pub action: PinAction,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Port name (A or B).
    pub port: PortName,
    /// Pin index; interrupts are available on pins 2, 5, 6 and 7.
    pub pin: u8,
    /// Trigger: rise, fall, change, high or low.
    pub mode: InterruptMode,
    /// Exit after N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct AnalogArgs {
    /// Port name (A or B).
    pub port: PortName,
    /// Pin index (0-7).
    pub pin: u8,
    /// Drive the DAC to this voltage instead of reading.
    #[arg(long, value_name = "VOLTS")]
    pub write: Option<f64>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).multiple(true).args(["write", "read"])))]
pub struct I2cArgs {
    /// Port name (A or B).
    pub port: PortName,
    /// 7-bit device address (decimal or 0x-prefixed hex).
    #[arg(value_parser = parse_address)]
    pub address: u8,
    /// Bus frequency in Hz.
    #[arg(long, default_value_t = 100_000)]
    pub frequency: u32,
    /// Bytes to write, as hex.
    #[arg(long, value_name = "HEX")]
    pub write: Option<String>,
    /// Number of bytes to read after the write.
    #[arg(long, value_name = "LEN")]
    pub read: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SpiArgs {
    /// Port name (A or B).
    pub port: PortName,
    /// Bytes to clock out, as hex.
    pub data: String,
    /// Clock speed in Hz.
    #[arg(long, default_value_t = 2_000_000)]
    pub clock_speed: u32,
    /// Combined mode number (bit 0 polarity, bit 1 phase).
    #[arg(long)]
    pub data_mode: Option<u8>,
    /// Chip-select pin index.
    #[arg(long)]
    pub chip_select: Option<u8>,
    /// Chip select is asserted high.
    #[arg(long)]
    pub cs_active_high: bool,
}

#[derive(Args, Debug)]
pub struct UartArgs {
    /// Port name (A or B).
    pub port: PortName,
    #[arg(long, default_value_t = 9_600)]
    pub baud_rate: u32,
    #[command(subcommand)]
    pub action: UartAction,
}

#[derive(Subcommand, Debug)]
pub enum UartAction {
    /// Transmit text.
    Write { text: String },
    /// Print received bytes until interrupted.
    Listen {
        /// Exit after N bytes.
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

/// One open port plus the reply deadline.
pub struct Session {
    board: Board<PortStream>,
    name: PortName,
    timeout: Duration,
}

impl Session {
    pub fn open(args: &BoardArgs, name: PortName) -> CliResult<Self> {
        let timeout = parse_duration(&args.timeout)?;
        let config = args.board_config(name)?;
        let board = Board::open(&config)
            .map_err(|err| port_error(&format!("open port {name}"), err))?;
        Ok(Self {
            board,
            name,
            timeout,
        })
    }

    pub fn port(&mut self) -> CliResult<&mut Port<PortStream>> {
        let name = self.name;
        self.board
            .port(name)
            .map_err(|err| port_error(&format!("port {name}"), err))
    }

    pub fn pin(&mut self, index: u8) -> CliResult<Pin<'_, PortStream>> {
        self.port()?
            .pin(index)
            .map_err(|err| port_error(&format!("pin {index}"), err))
    }

    pub fn poll(&mut self) -> CliResult<usize> {
        self.port()?.poll().map_err(|err| port_error("receive", err))
    }

    /// Poll until `rx` resolves or the timeout passes.
    pub fn wait<T>(
        &mut self,
        mut rx: oneshot::Receiver<tessel_frame::Result<T>>,
        context: &str,
    ) -> CliResult<T> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match rx.try_recv() {
                Ok(result) => return result.map_err(|err| frame_error(context, err)),
                Err(TryRecvError::Closed) => {
                    return Err(CliError::new(
                        INTERNAL,
                        format!("{context}: completion dropped without a result"),
                    ))
                }
                Err(TryRecvError::Empty) => {}
            }
            if Instant::now() >= deadline {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("{context}: no reply within {:?}", self.timeout),
                ));
            }
            self.port()?
                .poll()
                .map_err(|err| port_error(context, err))?;
        }
    }
}

/// A completion callback paired with the receiver it reports to.
pub fn capture<T: Send + 'static>() -> (
    impl FnOnce(tessel_frame::Result<T>) + Send + 'static,
    oneshot::Receiver<tessel_frame::Result<T>>,
) {
    let (tx, rx) = oneshot::channel();
    let callback = move |result: tessel_frame::Result<T>| {
        let _ = tx.send(result);
    };
    (callback, rx)
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Hex string to bytes; whitespace and a leading `0x` are ignored.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.split_whitespace().collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex data must be a non-empty, even number of digits: {input}"),
        ));
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex data: {input}")))
        })
        .collect()
}

pub fn parse_address(input: &str) -> Result<u8, String> {
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid I2C address: {input}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_args() -> BoardArgs {
        BoardArgs {
            port_a: None,
            port_b: None,
            config: None,
            timeout: "5s".to_string(),
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_hex_accepts_prefix_and_spaces() {
        assert_eq!(parse_hex("0xdead BEEF").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(parse_hex("01").unwrap(), vec![1]);
    }

    #[test]
    fn parse_hex_rejects_odd_or_invalid_digits() {
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
        assert!(parse_hex("").is_err());
    }

    #[test]
    fn parse_hex_rejects_non_ascii_without_panicking() {
        assert_eq!(parse_hex("aéb").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("é").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("0x€1").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_address_decimal_and_hex() {
        assert_eq!(parse_address("0x48"), Ok(0x48));
        assert_eq!(parse_address("72"), Ok(72));
        assert!(parse_address("0x1FF").is_err());
    }

    #[test]
    fn board_config_opens_only_the_target() {
        let mut args = board_args();
        args.port_b = Some(PathBuf::from("/tmp/b"));
        let config = args.board_config(PortName::B).unwrap();
        assert_eq!(config.port_a, None);
        assert_eq!(config.port_b, Some(PathBuf::from("/tmp/b")));

        let config = board_args().board_config(PortName::A).unwrap();
        assert_eq!(config.port_a, Some(PortName::A.default_path()));
        assert_eq!(config.port_b, None);
    }

    #[test]
    fn board_config_reads_json_file() {
        let dir = std::env::temp_dir().join(format!("tessel-cli-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("board.json");
        std::fs::write(
            &path,
            r#"{"port_a": "/run/a", "port": {"read_timeout_ms": 10}}"#,
        )
        .unwrap();

        let mut args = board_args();
        args.config = Some(path);
        let config = args.board_config(PortName::A).unwrap();
        assert_eq!(config.port_a, Some(PathBuf::from("/run/a")));
        assert_eq!(config.port.read_timeout(), Some(Duration::from_millis(10)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn capture_delivers_result() {
        let (callback, mut rx) = capture::<u8>();
        callback(Ok(7));
        assert_eq!(rx.try_recv().unwrap().unwrap(), 7);
    }
}
