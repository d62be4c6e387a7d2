//! Formatted output helpers for CLI commands.
//!
//! Terminal styling, human-readable durations and the aligned
//! key/value listing used for exported outputs.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use cirrus_common::constants::APP_NAME;

pub(crate) const BOLD: &str = "\x1b[1m";
pub(crate) const DIM: &str = "\x1b[2m";
pub(crate) const GREEN: &str = "\x1b[32m";
pub(crate) const CYAN: &str = "\x1b[36m";
pub(crate) const RESET: &str = "\x1b[0m";

/// Formats a duration compactly (e.g. "30m", "1h 30m", "90ms").
///
/// Precision below a millisecond is dropped.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let millis = Duration::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
    humantime::format_duration(millis).to_string()
}

/// Renders a JSON value for display: strings bare, everything else compact.
#[must_use]
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lists key/value pairs with the values aligned.
#[must_use]
pub fn format_outputs(outputs: &BTreeMap<String, serde_json::Value>) -> String {
    let width = outputs.keys().map(String::len).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in outputs {
        let _ = writeln!(out, "  {key:<width$}  {}", render_value(value));
    }
    out
}

/// Prints the banner shown before long-running commands.
pub fn print_header(action: &str) {
    eprintln!();
    eprintln!(
        "  {BOLD}{APP_NAME}{RESET} {DIM}v{}{RESET}  {action}",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
}
