use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Crates that make up the driver; `--log-level` applies to these.
const DRIVER_TARGETS: [&str; 4] = ["tessel", "tessel_transport", "tessel_frame", "tessel_port"];

/// Driver crates log at `level`; everything else at warn or quieter.
pub fn log_filter(level: LogLevel) -> Targets {
    let driver = level.as_filter();
    Targets::new()
        .with_targets(DRIVER_TARGETS.map(|target| (target, driver)))
        .with_default(driver.min(LevelFilter::WARN))
}

/// Frame traffic is logged at trace level; stdout stays reserved for results.
/// Targets are shown from debug up, where several crates interleave.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let show_target = level.as_filter() >= LevelFilter::DEBUG;
    let filter = log_filter(level);

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(show_target),
            )
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(show_target),
            )
            .with(filter)
            .try_init(),
    };
    let _ = result;
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn driver_crates_follow_requested_level() {
        let filter = log_filter(LogLevel::Trace);
        assert!(filter.would_enable("tessel_frame::reader", &Level::TRACE));
        assert!(filter.would_enable("tessel::cmd::watch", &Level::DEBUG));
        assert!(!filter.would_enable("mio::poll", &Level::DEBUG));
        assert!(filter.would_enable("mio::poll", &Level::WARN));
    }

    #[test]
    fn quiet_level_applies_everywhere() {
        let filter = log_filter(LogLevel::Error);
        assert!(!filter.would_enable("tessel_port::port", &Level::WARN));
        assert!(!filter.would_enable("other", &Level::WARN));
        assert!(filter.would_enable("other", &Level::ERROR));
    }
}
