use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tessel_port::{on_complete, PortName, UartConfig};

use crate::cmd::{capture, install_ctrlc_handler, BoardArgs, Session, UartAction, UartArgs};
use crate::exit::{port_error, CliResult, SUCCESS};
use crate::output::{print_raw, print_reading, OutputFormat, Reading};

pub fn run(args: UartArgs, board: &BoardArgs, format: OutputFormat) -> CliResult<i32> {
    let config = UartConfig {
        baud_rate: args.baud_rate,
    };
    let mut session = Session::open(board, args.port)?;
    // Fail on a bad baud rate before doing anything else.
    session
        .port()?
        .uart(&config)
        .map_err(|err| port_error("uart", err))?;

    match args.action {
        UartAction::Write { text } => {
            let (callback, rx) = capture::<()>();
            session
                .port()?
                .uart(&config)
                .and_then(|mut uart| uart.send(text.as_bytes(), on_complete(callback)))
                .map_err(|err| port_error("uart write", err))?;
            session.wait(rx, "uart write")?;
            let reading = Reading::new(args.port, "uart", "write", Value::from(text.len()));
            print_reading(&reading, format);
        }
        UartAction::Listen { count } => listen(&mut session, args.port, &config, count, format)?,
    }

    session
        .port()?
        .uart(&config)
        .and_then(|mut uart| uart.disable())
        .map_err(|err| port_error("uart disable", err))?;
    Ok(SUCCESS)
}

fn listen(
    session: &mut Session,
    port: PortName,
    config: &UartConfig,
    count: Option<usize>,
    format: OutputFormat,
) -> CliResult<()> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let mut total = 0usize;
    while running.load(Ordering::SeqCst) {
        session.poll()?;
        let received = session
            .port()?
            .uart(config)
            .map_err(|err| port_error("uart", err))?
            .take_received();
        if received.is_empty() {
            continue;
        }

        total += received.len();
        if matches!(format, OutputFormat::Raw) {
            print_raw(&received);
        } else {
            let text = String::from_utf8_lossy(&received).into_owned();
            print_reading(&Reading::new(port, "uart", "receive", Value::from(text)), format);
        }
        if count.is_some_and(|count| total >= count) {
            break;
        }
    }
    Ok(())
}
