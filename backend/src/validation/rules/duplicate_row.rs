//! Identical rows in sheets describing shared, reusable items.

use serde_json::Value;
use std::collections::HashMap;

use super::super::registry::ValidatorRegistry;
use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::models::{IssueKind, Record};

/// Types whose sheets may not repeat a row
pub const TYPES: &[&str] = &[
    "AnalytePreparation",
    "Basecalling",
    "LibraryPreparation",
    "PreparationKit",
    "Sequencing",
    "Software",
    "Treatment",
];

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_sheet(TYPES, check)
}

/// Report every row identical to an earlier one.
fn check(ds: &mut StructuredDataset, type_name: &str, records: &mut Vec<Record>) {
    let mut first_rows: HashMap<String, usize> = HashMap::new();
    for record in records.iter() {
        let key = canonical(&Value::Object(record.values.clone()));
        match first_rows.get(&key) {
            Some(first) => ds.note_validation_error(
                IssueKind::DuplicateRow,
                format!("rows {} and {} are identical", first, record.row),
                Some(type_name),
                Some(record.row),
            ),
            None => {
                first_rows.insert(key, record.row);
            }
        }
    }
}

/// JSON text with object keys sorted at every level.
fn canonical(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}
