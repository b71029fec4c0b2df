//! Validator registry: per-column, per-sheet and finish hooks.
//!
//! Rules register themselves through a `register` function in their module;
//! [`ValidatorRegistry::builtin`] calls them in a fixed order, which is also
//! the order finish validators run in.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;

use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::models::Record;

/// `(dataset, type, column, row, value) -> value'`; the returned value
/// replaces the cell.
pub type ColumnValidator = fn(&mut StructuredDataset, &str, &str, usize, Value) -> Value;

/// `(dataset, type, records)`, run once per sheet with that sheet's records.
pub type SheetValidator = fn(&mut StructuredDataset, &str, &mut Vec<Record>);

/// Run once every sheet is loaded.
pub type FinishValidator = for<'a> fn(&'a mut StructuredDataset) -> BoxFuture<'a, ()>;

#[derive(Default)]
pub struct ValidatorRegistry {
    columns: HashMap<String, ColumnValidator>,
    sheets: HashMap<String, Vec<SheetValidator>>,
    finish: Vec<(&'static str, FinishValidator)>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in rule.
    pub fn builtin() -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();
        super::rules::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Register a column validator under `column` (every sheet) or
    /// `Type.column` (one type only).
    pub fn register_column(&mut self, key: &str, validator: ColumnValidator) -> Result<(), ConfigurationError> {
        let valid = match key.split_once('.') {
            Some((type_name, column)) => {
                !type_name.is_empty() && !column.is_empty() && !column.contains('.')
            }
            None => !key.is_empty(),
        };
        if !valid {
            return Err(ConfigurationError::InvalidKey { kind: "column", key: key.to_string() });
        }
        if self.columns.contains_key(key) {
            return Err(ConfigurationError::Duplicate { kind: "column", key: key.to_string() });
        }
        self.columns.insert(key.to_string(), validator);
        Ok(())
    }

    /// Register a sheet validator for each of `type_names`.
    pub fn register_sheet(&mut self, type_names: &[&str], validator: SheetValidator) -> Result<(), ConfigurationError> {
        if type_names.is_empty() || type_names.iter().any(|t| t.is_empty()) {
            return Err(ConfigurationError::InvalidKey {
                kind: "sheet",
                key: type_names.join(","),
            });
        }
        for type_name in type_names {
            self.sheets.entry(type_name.to_string()).or_default().push(validator);
        }
        Ok(())
    }

    /// Append a finish validator; `name` must be unique.
    pub fn register_finish(&mut self, name: &'static str, validator: FinishValidator) -> Result<(), ConfigurationError> {
        if self.finish.iter().any(|(n, _)| *n == name) {
            return Err(ConfigurationError::Duplicate { kind: "finish", key: name.to_string() });
        }
        self.finish.push((name, validator));
        Ok(())
    }

    /// Validator for `column` on a sheet of `type_name`; the type-specific
    /// one wins.
    pub fn column_validator(&self, type_name: &str, column: &str) -> Option<ColumnValidator> {
        self.columns
            .get(&format!("{}.{}", type_name, column))
            .or_else(|| self.columns.get(column))
            .copied()
    }

    pub fn sheet_validators(&self, type_name: &str) -> &[SheetValidator] {
        self.sheets.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Finish validators in registration order.
    pub fn finish_validators(&self) -> impl Iterator<Item = (&'static str, FinishValidator)> + '_ {
        self.finish.iter().copied()
    }
}
