use serde_json::Value;

use crate::cmd::{capture, AnalogArgs, BoardArgs, Session};
use crate::exit::{port_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_reading, OutputFormat, Reading};

pub fn run(args: AnalogArgs, board: &BoardArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = Session::open(board, args.port)?;
    let target = format!("pin {}", args.pin);

    let (operation, value) = match args.write {
        Some(volts) => {
            session
                .pin(args.pin)?
                .analog_write(volts)
                .map_err(|err| port_error("analog write", err))?;
            ("analog-write", Value::from(volts))
        }
        None => {
            let (callback, rx) = capture::<f64>();
            let mut pin = session.pin(args.pin)?;
            if !pin.supports_analog_read() {
                return Err(CliError::new(
                    USAGE,
                    format!("port {} {target} has no ADC", args.port),
                ));
            }
            pin.analog_read(callback)
                .map_err(|err| port_error("analog read", err))?;
            let volts: f64 = session.wait(rx, "analog read")?;
            ("analog-read", Value::from(volts))
        }
    };

    print_reading(&Reading::new(args.port, target, operation, value), format);
    Ok(SUCCESS)
}
