use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, BoardArgs, Session, WatchArgs};
use crate::exit::{port_error, CliResult, SUCCESS};
use crate::output::{print_reading, OutputFormat, Reading};

pub fn run(args: WatchArgs, board: &BoardArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = Session::open(board, args.port)?;
    let context = format!("watch pin {}", args.pin);
    let mut events = session
        .pin(args.pin)?
        .listen(args.mode)
        .map_err(|err| port_error(&context, err))?;
    info!(port = %args.port, pin = args.pin, mode = %args.mode, "watching for interrupts");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let mut seen = 0usize;
    while running.load(Ordering::SeqCst) {
        match events.try_recv() {
            Ok(event) => {
                let reading = Reading::new(
                    event.port,
                    format!("pin {}", event.pin),
                    "interrupt",
                    Value::from(event.mode.name()),
                );
                print_reading(&reading, format);
                seen += 1;
                if args.count.is_some_and(|count| seen >= count) {
                    break;
                }
                continue;
            }
            // Level triggers close their stream after one event.
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }
        session.poll()?;
    }

    session
        .pin(args.pin)?
        .disarm()
        .map_err(|err| port_error(&context, err))?;
    Ok(SUCCESS)
}
