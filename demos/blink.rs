//! Toggle pin 5 on port A ten times, waiting for each toggle to land.
//!
//! ```sh
//! cargo run --example blink -- /var/run/tessel/port_a
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tessel::port::PortConfig;
use tessel::transport::UnixDomainSocket;
use tessel::{on_complete, Port, PortName};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| PortName::A.default_path().display().to_string());

    let stream = UnixDomainSocket::connect(&path)?;
    let mut port = Port::new(PortName::A, stream, &PortConfig::default())?;

    let toggled = Arc::new(AtomicUsize::new(0));
    port.pin(5)?.output(false, None)?;
    for _ in 0..10 {
        let counter = Arc::clone(&toggled);
        port.pin(5)?.toggle(on_complete(move |result| {
            if result.is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }))?;
        port.run_until_idle()?;
        thread::sleep(Duration::from_millis(250));
    }

    println!("toggled {} times", toggled.load(Ordering::SeqCst));
    port.close()?;
    Ok(())
}
