use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("tessel {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: tessel");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "default_ports: A={}, B={}",
        tessel_port::PortName::A.default_path().display(),
        tessel_port::PortName::B.default_path().display()
    );
    println!(
        "protocol: max_transfer={}, pins={}",
        tessel_frame::MAX_TRANSFER,
        tessel_frame::PIN_COUNT
    );

    Ok(SUCCESS)
}
