use bytes::Bytes;
use serde_json::Value;
use tessel_port::{on_complete, I2cConfig};

use crate::cmd::{capture, parse_hex, BoardArgs, I2cArgs, Session};
use crate::exit::{port_error, CliResult, SUCCESS};
use crate::output::{hex, print_raw, print_reading, OutputFormat, Reading};

pub fn run(args: I2cArgs, board: &BoardArgs, format: OutputFormat) -> CliResult<i32> {
    let tx = match args.write.as_deref() {
        Some(data) => parse_hex(data)?,
        None => Vec::new(),
    };
    let config = I2cConfig {
        frequency: args.frequency,
    };
    let context = format!("i2c {:#04x}", args.address);

    let mut session = Session::open(board, args.port)?;
    let mut i2c = session
        .port()?
        .i2c(args.address, &config)
        .map_err(|err| port_error(&context, err))?;

    let (operation, value) = match args.read {
        Some(len) => {
            let (callback, rx) = capture::<Bytes>();
            i2c.transfer(&tx, len, callback)
                .map_err(|err| port_error(&context, err))?;
            let data = session.wait(rx, &context)?;
            if matches!(format, OutputFormat::Raw) {
                print_raw(&data);
                return Ok(SUCCESS);
            }
            ("read", Value::from(hex(&data)))
        }
        None => {
            let (callback, rx) = capture::<()>();
            i2c.send(&tx, on_complete(callback))
                .map_err(|err| port_error(&context, err))?;
            session.wait(rx, &context)?;
            ("write", Value::from("ok"))
        }
    };

    let target = format!("i2c {:#04x}", args.address);
    print_reading(&Reading::new(args.port, target, operation, value), format);
    Ok(SUCCESS)
}
