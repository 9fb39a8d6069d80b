//! Loading raw order rows from JSON or CSV exports

use crate::error::{AnalysisError, Result};
use crate::models::RawOrderRecord;
use csv::ReaderBuilder;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Records from a JSON document. `null` is an empty list; non-object items are skipped.
pub fn records_from_value(value: &Value) -> Result<Vec<RawOrderRecord>> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => return Err(AnalysisError::InvalidInput(kind(other))),
    };

    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::Object(map) => records.push(map.clone()),
            other => warn!("Skipping item {}: expected an object, got {}", i, kind(other)),
        }
    }
    Ok(records)
}

pub fn records_from_json_str(input: &str) -> Result<Vec<RawOrderRecord>> {
    let value: Value = serde_json::from_str(input)?;
    records_from_value(&value)
}

/// Every cell becomes a string, empty cells become null
pub fn records_from_csv<R: Read>(reader: R) -> Result<Vec<RawOrderRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: RawOrderRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| {
                let value = if cell.trim().is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (header.clone(), value)
            })
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Load a `.json` or `.csv` export
pub fn load_records(path: &Path) -> Result<Vec<RawOrderRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let records = match extension.as_deref() {
        Some("json") => {
            let value: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
            records_from_value(&value)?
        }
        Some("csv") => records_from_csv(File::open(path)?)?,
        _ => {
            return Err(AnalysisError::UnsupportedFormat(
                path.display().to_string(),
            ))
        }
    };

    info!("Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}
