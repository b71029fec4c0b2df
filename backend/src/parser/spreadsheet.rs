//! Spreadsheet workbooks (xlsx, xlsm, xls, ods) via calamine.

use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::{NaiveDateTime, Timelike};
use serde_json::Value;
use std::path::Path;

use super::Sheet;
use crate::error::{WorkbookError, WorkbookResult};

/// Read every sheet that has a header row, in workbook order.
pub fn read_spreadsheet(path: &Path) -> WorkbookResult<Vec<Sheet>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| WorkbookError::Spreadsheet(format!("{}: {}", path.display(), e)))?;
    let sheet_names = workbook.sheet_names().to_owned();

    let mut sheets = Vec::new();
    for sheet_name in sheet_names {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| WorkbookError::Spreadsheet(format!("sheet {}: {}", sheet_name, e)))?;

        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let mut rows = range.rows().enumerate();

        let header: Vec<String> = match rows.next() {
            Some((_, cells)) => cells.iter().map(header_text).collect(),
            None => continue,
        };
        if header.iter().all(|h| h.is_empty()) {
            continue;
        }

        let body = rows
            .filter(|(_, cells)| cells.iter().any(|c| !matches!(c, Data::Empty)))
            .map(|(idx, cells)| (first_row + idx + 1, cells.iter().map(cell_value).collect()))
            .collect();

        sheets.push(Sheet::new(&sheet_name, header, body));
    }

    Ok(sheets)
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Convert a cell to JSON keeping its native scalar type.
///
/// Whole floats become integers since spreadsheets store every number as a
/// float. Dates become ISO-8601 text.
pub fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => float_value(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) => Value::String(datetime_text(dt)),
            None => Value::String(cell.to_string()),
        },
        Data::DateTimeIso(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn datetime_text(dt: NaiveDateTime) -> String {
    if dt.time().num_seconds_from_midnight() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}
