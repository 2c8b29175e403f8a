//! Output formatting for CLI

use console::style;
use serde::Serialize;

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Format output based on selected format
pub fn format_output<T: Serialize>(data: &T, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => serde_json::to_value(data)
            .map(|v| v.to_string())
            .unwrap_or_default(),
    }
}

/// Print a pass/fail line
pub fn print_status(ok: bool, detail: &str) {
    if ok {
        println!("  {} {}", style("OK").green().bold(), detail);
    } else {
        println!("  {} {}", style("FAIL").red().bold(), detail);
    }
}
