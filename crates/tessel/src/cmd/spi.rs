use bytes::Bytes;
use serde_json::Value;
use tessel_port::config::ChipSelectActive;
use tessel_port::SpiConfig;

use crate::cmd::{capture, parse_hex, BoardArgs, Session, SpiArgs};
use crate::exit::{port_error, CliResult, SUCCESS};
use crate::output::{hex, print_raw, print_reading, OutputFormat, Reading};

pub fn run(args: SpiArgs, board: &BoardArgs, format: OutputFormat) -> CliResult<i32> {
    let data = parse_hex(&args.data)?;
    let config = SpiConfig {
        clock_speed: args.clock_speed,
        chip_select: args.chip_select,
        chip_select_active: if args.cs_active_high {
            ChipSelectActive::High
        } else {
            ChipSelectActive::Low
        },
        data_mode: args.data_mode,
        ..SpiConfig::default()
    };

    let mut session = Session::open(board, args.port)?;
    let (callback, rx) = capture::<Bytes>();
    session
        .port()?
        .spi(&config)
        .and_then(|mut spi| spi.transfer(&data, callback))
        .map_err(|err| port_error("spi transfer", err))?;
    let received = session.wait(rx, "spi transfer")?;

    if matches!(format, OutputFormat::Raw) {
        print_raw(&received);
        return Ok(SUCCESS);
    }
    let reading = Reading::new(args.port, "spi", "transfer", Value::from(hex(&received)));
    print_reading(&reading, format);
    Ok(SUCCESS)
}
