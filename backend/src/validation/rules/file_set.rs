//! `FileSet.expected_file_count`: how many files the submission should
//! attach to a file set.
//!
//! The column is not part of the schema. The sheet hook moves it off the
//! records onto the dataset, and the finish hook counts files once every
//! sheet is loaded, so sheet order does not matter.

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use super::super::registry::ValidatorRegistry;
use crate::dataset::{ExpectedFileCount, StructuredDataset};
use crate::error::ConfigurationError;
use crate::models::{scalar_text, IssueKind, Record};

pub const TYPE: &str = "FileSet";
pub const COLUMN: &str = "expected_file_count";

/// Types counted as files of a file set
pub const FILE_TYPES: &[&str] = &["AlignedReads", "UnalignedReads", "VariantCalls"];

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_sheet(&[TYPE], capture)?;
    registry.register_finish("file_set_count", finish)
}

fn capture(ds: &mut StructuredDataset, type_name: &str, records: &mut Vec<Record>) {
    for record in records.iter_mut() {
        let Some(raw) = record.values.remove(COLUMN) else {
            continue;
        };
        let Some(text) = scalar_text(&raw) else {
            continue;
        };

        let Some(expected) = parse_count(&raw) else {
            ds.note_validation_error(
                IssueKind::TypeCoercion,
                format!("{} must be a whole number, got {}", COLUMN, text),
                Some(type_name),
                Some(record.row),
            );
            continue;
        };

        match record.submitted_id() {
            Some(id) => ds.expected_file_counts.push(ExpectedFileCount {
                file_set: id.to_string(),
                row: record.row,
                expected,
            }),
            None => ds.note_validation_error(
                IssueKind::CrossReference,
                format!("{} given without submitted_id", COLUMN),
                Some(type_name),
                Some(record.row),
            ),
        }
    }
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            let f = n.as_f64()?;
            (f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn finish(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    compare_counts(ds);
    future::ready(()).boxed()
}

fn compare_counts(ds: &mut StructuredDataset) {
    let expectations = std::mem::take(&mut ds.expected_file_counts);
    for expectation in expectations {
        let found = FILE_TYPES
            .iter()
            .flat_map(|t| ds.records(t))
            .filter(|r| r.strings("file_sets").contains(&expectation.file_set))
            .count() as u64;

        if found != expectation.expected {
            ds.note_validation_error(
                IssueKind::CrossReference,
                format!(
                    "expected {} files for FileSet {}, found {}",
                    expectation.expected, expectation.file_set, found
                ),
                Some(TYPE),
                Some(expectation.row),
            );
        }
    }
}
