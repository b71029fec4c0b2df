//! RNA integrity number goes with RNA analytes, and only with them.

use futures::future::{self, BoxFuture, FutureExt};

use super::super::registry::ValidatorRegistry;
use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::models::{IssueKind, Record};

pub const TYPE: &str = "Analyte";
const RIN: &str = "rna_integrity_number";

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_finish("analyte_rin", finish)
}

/// True when any `molecule` value mentions RNA.
pub fn is_rna(molecules: &[String]) -> bool {
    molecules.iter().any(|m| m.contains("RNA"))
}

fn finish(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    check(ds);
    future::ready(()).boxed()
}

fn check(ds: &mut StructuredDataset) {
    let problems: Vec<(usize, String)> = ds
        .records(TYPE)
        .iter()
        .filter_map(|record| problem(record).map(|msg| (record.row, msg)))
        .collect();

    for (row, message) in problems {
        ds.note_validation_error(IssueKind::SchemaViolation, message, Some(TYPE), Some(row));
    }
}

fn problem(record: &Record) -> Option<String> {
    let molecules = record.strings("molecule");
    if molecules.is_empty() {
        return None;
    }

    match (is_rna(&molecules), record.has(RIN)) {
        (true, false) => Some(format!("{} is required for RNA analyte {}", RIN, record.label())),
        (false, true) => Some(format!("{} is not allowed for non-RNA analyte {}", RIN, record.label())),
        _ => None,
    }
}
