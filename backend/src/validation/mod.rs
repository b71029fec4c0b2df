//! Submission validation.
//!
//! - [`registry`] - per-column, per-sheet and finish hook tables
//! - [`rules`] - the built-in rules
//! - [`unreferenced`] - terminal sweep for records nothing links to
//!
//! This module also checks records against JSON Schema (Draft 7) documents
//! derived from the cached type schemas.
//!
//! # Example
//!
//! ```rust,ignore
//! use submitr::validation::conformance_errors;
//!
//! let donor = cache.get("Donor").unwrap();
//! for (row, message) in conformance_errors(donor, &records)? {
//!     println!("row {}: {}", row, message);
//! }
//! ```

pub mod registry;
pub mod rules;
pub mod unreferenced;

use serde_json::Value;

use crate::models::Record;
use crate::schema::TypeSchema;

pub use registry::{ColumnValidator, FinishValidator, SheetValidator, ValidatorRegistry};
pub use unreferenced::{unreferenced_items, ALLOWED_UNREFERENCED};

/// Check records of one type against its conformance schema.
///
/// Returns `(row, message)` for each violation, in record order. The
/// schema is compiled once for all records.
pub fn conformance_errors(schema: &TypeSchema, records: &[Record]) -> Result<Vec<(usize, String)>, String> {
    let document = schema.conformance_schema();
    let validator = jsonschema::draft7::new(&document)
        .map_err(|e| format!("Invalid schema for {}: {}", schema.name, e))?;

    let mut errors = Vec::new();
    for record in records {
        let instance = Value::Object(record.values.clone());
        for error in validator.iter_errors(&instance) {
            errors.push((record.row, error.to_string()));
        }
    }
    Ok(errors)
}
