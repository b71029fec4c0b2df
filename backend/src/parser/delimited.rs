//! Delimited text (CSV/TSV) as a one-sheet workbook.
//!
//! Encoding and delimiter are auto-detected; every cell is read as a string.

use serde_json::Value;
use std::path::Path;

use super::Sheet;
use crate::error::{WorkbookError, WorkbookResult};

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding.
///
/// Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [b',', b';', b'\t', b'|'];
    let mut best_sep = b',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep as char).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Read a delimited text file as a single sheet named after the file stem.
pub fn read_delimited_file(path: &Path) -> WorkbookResult<Vec<Sheet>> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Sheet1")
        .to_string();
    read_delimited_bytes(&name, &bytes)
}

/// Parse delimited bytes with auto-detection of encoding and delimiter.
pub fn read_delimited_bytes(name: &str, bytes: &[u8]) -> WorkbookResult<Vec<Sheet>> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = detect_delimiter(content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    // The reader's positions point before any skipped blank lines, and its
    // line counter ignores them; count newlines up to the record's first byte.
    let text = content.as_bytes();
    let mut scanned = 0usize;
    let mut line = 1usize;

    for result in reader.records() {
        let record = result.map_err(|e| WorkbookError::Delimited(e.to_string()))?;
        let mut start = record
            .position()
            .map(|p| (p.byte() as usize).min(text.len()))
            .unwrap_or(scanned);
        while start < text.len() && matches!(text[start], b'\r' | b'\n') {
            start += 1;
        }
        if start > scanned {
            line += text[scanned..start].iter().filter(|b| **b == b'\n').count();
            scanned = start;
        }

        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        match header {
            None => header = Some(record.iter().map(str::to_string).collect()),
            Some(_) => {
                let cells = record
                    .iter()
                    .map(|cell| Value::String(cell.to_string()))
                    .collect();
                rows.push((line, cells));
            }
        }
    }

    Ok(header
        .map(|header| vec![Sheet::new(name, header, rows)])
        .unwrap_or_default())
}
