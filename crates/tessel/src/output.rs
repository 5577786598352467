use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use tessel_port::PortName;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One result line: what was done to which target, and what came back.
#[derive(Debug, Serialize)]
pub struct Reading {
    pub port: PortName,
    pub target: String,
    pub operation: &'static str,
    pub value: Value,
}

impl Reading {
    pub fn new(port: PortName, target: impl Into<String>, operation: &'static str, value: Value) -> Self {
        Self {
            port,
            target: target.into(),
            operation,
            value,
        }
    }
}

pub fn print_reading(reading: &Reading, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(reading).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TARGET", "OPERATION", "VALUE"])
                .add_row(vec![
                    reading.port.to_string(),
                    reading.target.clone(),
                    reading.operation.to_string(),
                    value_text(&reading.value),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "port={} target={} {}={}",
                reading.port,
                reading.target,
                reading.operation,
                value_text(&reading.value)
            );
        }
        OutputFormat::Raw => {
            println!("{}", value_text(&reading.value));
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Lowercase hex without separators.
pub fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_serializes_flat() {
        let reading = Reading::new(PortName::B, "pin 3", "read", Value::from(1));
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"port": "B", "target": "pin 3", "operation": "read", "value": 1})
        );
    }

    #[test]
    fn hex_is_lowercase() {
        assert_eq!(hex(&[0xAB, 0x01]), "ab01");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn string_values_print_unquoted() {
        assert_eq!(value_text(&Value::from("ok")), "ok");
        assert_eq!(value_text(&Value::from(1.5)), "1.5");
    }
}
