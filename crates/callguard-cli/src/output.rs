//! Output formatting for human-readable and JSON modes.
//!
//! Human mode uses colored terminal output. JSON mode writes one
//! compact JSON document per command with no ANSI escapes: results on
//! stdout, errors on stderr.

use callguard_types::{Action, Timestamp};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Confirms a completed change.
pub fn print_success(msg: &str, json_mode: bool) {
    if json_mode {
        println!("{}", json!({ "status": "ok", "message": msg }));
    } else {
        println!("{} {msg}", "✓".green().bold());
    }
}

/// Prints one named value.
pub fn print_kv(key: &str, value: &str, json_mode: bool) {
    if json_mode {
        println!("{}", json!({ key: value }));
    } else {
        println!("{}: {value}", key.bold());
    }
}

/// Prints a serializable value as compact JSON, or indented JSON in
/// human mode.
pub fn print_value<T: Serialize>(value: &T, json_mode: bool) {
    let rendered = if json_mode {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match rendered {
        Ok(s) => println!("{s}"),
        Err(e) => print_error(&format!("json serialization failed: {e}"), json_mode),
    }
}

pub fn print_error(msg: &str, json_mode: bool) {
    if json_mode {
        eprintln!("{}", json!({ "error": msg }));
    } else {
        eprintln!("{} {msg}", "error:".red().bold());
    }
}

/// Prints rows under `headers`.
///
/// In JSON mode each row becomes an object keyed by the lowercased
/// header.
pub fn print_table(headers: &[&str], rows: &[Vec<String>], json_mode: bool) {
    if json_mode {
        let objects: Vec<Value> = rows.iter().map(|row| row_object(headers, row)).collect();
        println!("{}", Value::Array(objects));
        return;
    }
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    let widths = column_widths(headers, rows);
    let titles: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();
    println!("{}", pad_row(&titles, &widths).bold());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", rule.join("  ").dimmed());
    for row in rows {
        println!("{}", pad_row(row, &widths));
    }
}

fn row_object(headers: &[&str], row: &[String]) -> Value {
    let fields: Map<String, Value> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let cell = row.get(i).cloned().unwrap_or_default();
            (h.to_lowercase(), Value::String(cell))
        })
        .collect();
    Value::Object(fields)
}

/// Column widths in chars; contact names and labels are not ASCII.
fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .fold(h.chars().count(), usize::max)
        })
        .collect()
}

fn pad_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}", w = *w))
        .collect::<Vec<_>>()
        .join("  ")
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

/// `-` for missing optional cells.
pub fn or_dash(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "-".into(),
    }
}

/// UTC time without offset or fraction, for tables.
pub fn short_time(ts: &Timestamp) -> String {
    ts.as_datetime().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn colored_action(action: &Action) -> ColoredString {
    let text = action.to_string();
    match action {
        Action::Allow => text.green().bold(),
        Action::Reject => text.yellow().bold(),
        Action::RejectAsSpam { .. } | Action::Block => text.red().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_cover_headers_and_unicode_cells() {
        let rows = vec![vec!["Numéro masqué".to_string(), "1".to_string()]];
        assert_eq!(column_widths(&["number", "count"], &rows), vec![13, 5]);
    }

    #[test]
    fn json_rows_use_lowercase_keys_and_fill_gaps() {
        let row = row_object(&["NUMBER", "LABEL"], &["+33612345678".to_string()]);
        assert_eq!(row["number"], "+33612345678");
        assert_eq!(row["label"], "");
    }

    #[test]
    fn missing_cells_render_as_dash() {
        assert_eq!(or_dash(None), "-");
        assert_eq!(or_dash(Some("")), "-");
        assert_eq!(or_dash(Some("Alice")), "Alice");
    }
}
