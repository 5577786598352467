//! Scan port B's I2C bus for devices that answer a one-byte read.
//!
//! ```sh
//! cargo run --example i2c-probe -- /var/run/tessel/port_b
//! ```

use std::sync::mpsc;

use tessel::port::PortConfig;
use tessel::transport::UnixDomainSocket;
use tessel::{I2cConfig, Port, PortName};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| PortName::B.default_path().display().to_string());

    let stream = UnixDomainSocket::connect(&path)?;
    let mut port = Port::new(PortName::B, stream, &PortConfig::default())?;
    let config = I2cConfig::default();

    for address in 0x08..=0x77u8 {
        let (tx, rx) = mpsc::channel();
        port.i2c(address, &config)?.read(1, move |result| {
            let _ = tx.send(result);
        })?;
        port.run_until_idle()?;

        if let Ok(Ok(data)) = rx.try_recv() {
            if let Some(first) = data.first() {
                println!("{address:#04x}: {first:#04x}");
            }
        }
    }

    port.close()?;
    Ok(())
}
