//! Workbook reader.
//!
//! Opens a multi-sheet tabular file and yields each sheet as a header plus a
//! lazy sequence of records (column name to raw cell value). Cells keep their
//! native scalar type; nothing is validated here.
//!
//! Supported formats:
//! - `.xlsx`, `.xlsm`, `.xls`, `.ods` - one sheet per worksheet
//! - `.csv`, `.tsv`, `.txt` - a single sheet named after the file stem

pub mod delimited;
pub mod spreadsheet;

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{WorkbookError, WorkbookResult};
use crate::models::is_blank;

pub use delimited::{decode_content, detect_delimiter, detect_encoding, read_delimited_bytes};
pub use spreadsheet::cell_value;

/// One worksheet: header row plus data rows tagged with their row numbers.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    rows: Vec<(usize, Vec<Value>)>,
}

impl Sheet {
    pub fn new(name: &str, header: Vec<String>, rows: Vec<(usize, Vec<Value>)>) -> Self {
        Self {
            name: name.to_string(),
            header: header.into_iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    /// Records as `(row number, column -> value)`.
    ///
    /// Blank cells and columns with an empty header are left out.
    pub fn records(&self) -> impl Iterator<Item = (usize, Map<String, Value>)> + '_ {
        self.rows.iter().map(move |(row, cells)| {
            let values = self
                .header
                .iter()
                .zip(cells.iter())
                .filter(|(column, value)| !column.is_empty() && !is_blank(value))
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect();
            (*row, values)
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A workbook opened from disk.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Open a workbook, dispatching on the file extension.
    ///
    /// Fails when the file cannot be read or no sheet has a header row.
    pub fn open<P: AsRef<Path>>(path: P) -> WorkbookResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let sheets = match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => spreadsheet::read_spreadsheet(path)?,
            "csv" | "tsv" | "txt" => delimited::read_delimited_file(path)?,
            other => return Err(WorkbookError::UnsupportedFormat(other.to_string())),
        };

        Self::from_sheets(sheets)
    }

    pub fn from_sheets(sheets: Vec<Sheet>) -> WorkbookResult<Self> {
        if sheets.is_empty() {
            return Err(WorkbookError::NoSheets);
        }
        Ok(Self { sheets })
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}
