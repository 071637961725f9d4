// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output helpers: text tables and JSON.

use clap::ValueEnum;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print rows as a padded text table (or JSON array).
pub fn print_table(format: OutputFormat, headers: &[&str], rows: Vec<Vec<String>>) {
    if format == OutputFormat::Json {
        let objects: Vec<Value> = rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (header, cell) in headers.iter().zip(row) {
                    obj.insert(header.to_string(), Value::String(cell.clone()));
                }
                Value::Object(obj)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&objects).unwrap_or_else(|_| "[]".into()));
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }
    let line = |cells: Vec<String>| {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:width$}", c, width = widths.get(i).copied().unwrap_or(0)))
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };
    line(headers.iter().map(|h| h.to_uppercase()).collect());
    for row in rows {
        line(row);
    }
}

/// Print a record as key/value text or raw JSON.
pub fn print_record(format: OutputFormat, record: &Value) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".into()))
        }
        OutputFormat::Text => {
            if let Some(obj) = record.as_object() {
                let width = obj.keys().map(String::len).max().unwrap_or(0);
                for (key, value) in obj {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    println!("{key:width$}  {rendered}");
                }
            } else {
                println!("{record}");
            }
        }
    }
}

/// Cell helper: stringify a JSON field with a dash fallback.
pub fn cell(record: &Value, field: &str) -> String {
    match record.get(field) {
        None | Some(Value::Null) => "-".into(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
