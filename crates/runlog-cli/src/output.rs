//! Output formatting utilities.

use serde_json::Value;

/// Formats a record as JSON.
pub fn format_json(record: &Value) -> String {
    serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a record as a simple table row.
pub fn format_table_row(index: u64, record: &Value) -> String {
    let event_type = record
        .get("event_type")
        .and_then(|v| v.as_str())
        .unwrap_or("?");
    let step_key = record
        .get("step_key")
        .and_then(|v| v.as_str())
        .unwrap_or("-");
    let message = record
        .get("message")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format_json(record));

    format!(
        "{:<8} {:<20} {:<20} {}",
        index,
        truncate(event_type, 20),
        truncate(step_key, 20),
        truncate(&message, 60)
    )
}

/// Prints table header.
#[allow(clippy::print_literal)]
pub fn print_table_header() {
    println!("{:<8} {:<20} {:<20} {}", "CURSOR", "TYPE", "STEP", "MESSAGE");
    println!("{}", "-".repeat(100));
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
