use serde_json::Value;
use tessel_port::{on_complete, Completion, Pin};
use tessel_transport::PortStream;

use crate::cmd::{capture, BoardArgs, PinAction, PinArgs, Session};
use crate::exit::{port_error, CliResult, SUCCESS};
use crate::output::{print_reading, OutputFormat, Reading};

pub fn run(args: PinArgs, board: &BoardArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = Session::open(board, args.port)?;
    let context = format!("pin {} {}", args.pin, args.action.name());

    let value = match args.action {
        PinAction::Read => {
            let (callback, rx) = capture::<bool>();
            session
                .pin(args.pin)?
                .read(callback)
                .map_err(|err| port_error(&context, err))?;
            Value::from(u8::from(session.wait(rx, &context)?))
        }
        PinAction::RawRead => {
            let (callback, rx) = capture::<bool>();
            session
                .pin(args.pin)?
                .raw_read(callback)
                .map_err(|err| port_error(&context, err))?;
            Value::from(u8::from(session.wait(rx, &context)?))
        }
        PinAction::High => drive(&mut session, args.pin, &context, |pin, done| pin.high(done))?,
        PinAction::Low => drive(&mut session, args.pin, &context, |pin, done| pin.low(done))?,
        PinAction::Toggle => drive(&mut session, args.pin, &context, |pin, done| pin.toggle(done))?,
        PinAction::Input => drive(&mut session, args.pin, &context, |pin, done| pin.input(done))?,
    };

    let reading = Reading::new(
        args.port,
        format!("pin {}", args.pin),
        args.action.name(),
        value,
    );
    print_reading(&reading, format);
    Ok(SUCCESS)
}

/// Send a command that has no reply of its own and wait for its fence.
fn drive<F>(session: &mut Session, index: u8, context: &str, op: F) -> CliResult<Value>
where
    F: FnOnce(&mut Pin<'_, PortStream>, Option<Completion>) -> tessel_port::Result<()>,
{
    let (callback, rx) = capture::<()>();
    let mut pin = session.pin(index)?;
    op(&mut pin, on_complete(callback)).map_err(|err| port_error(context, err))?;
    session.wait(rx, context)?;
    Ok(Value::from("ok"))
}
