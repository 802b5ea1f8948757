/// JSON reading: a single record, an object of column arrays, an array of
/// records, or newline-delimited records.
use super::Table;
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Column name used for records that are not objects.
const SCALAR_COLUMN: &str = "0";

pub fn read_json(path: &Path) -> Result<Table> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);

    let records = match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) if is_columnar(&map) => return Ok(columnar_table(map)),
        Ok(Value::Object(map)) => vec![Value::Object(map)],
        Ok(Value::Array(items)) => items,
        Ok(_) => return Err(Error::unreadable(path, "top-level JSON value is not a record or a list")),
        Err(_) => parse_lines(path, &text)?,
    };
    Ok(records_table(records))
}

fn parse_lines(path: &Path, text: &str) -> Result<Vec<Value>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| Error::unreadable(path, e)))
        .collect()
}

/// `{"a": [..], "b": [..]}`: every value is an array.
fn is_columnar(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.values().all(Value::is_array)
}

fn columnar_table(map: Map<String, Value>) -> Table {
    let height = map.values().filter_map(Value::as_array).map(Vec::len).max().unwrap_or(0);
    let columns: Vec<String> = map.keys().cloned().collect();
    let mut rows = vec![Vec::with_capacity(columns.len()); height];
    for value in map.values() {
        let cells = value.as_array().map(Vec::as_slice).unwrap_or_default();
        for (i, row) in rows.iter_mut().enumerate() {
            row.push(cells.get(i).map(cell_text).unwrap_or_default());
        }
    }
    Table::from_records(columns, rows)
}

fn records_table(records: Vec<Value>) -> Table {
    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        match record {
            Value::Object(map) => {
                for key in map.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
            }
            _ => {
                if !columns.iter().any(|c| c == SCALAR_COLUMN) {
                    columns.push(SCALAR_COLUMN.to_string());
                }
            }
        }
    }

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|col| match record {
                    Value::Object(map) => map.get(col).map(cell_text).unwrap_or_default(),
                    other if col == SCALAR_COLUMN => cell_text(other),
                    _ => String::new(),
                })
                .collect()
        })
        .collect();
    Table::from_records(columns, rows)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
