//! Donor-specific assembly (DSA) FASTA files must say which haplotype and
//! which assembly they belong to.

use futures::future::{self, BoxFuture, FutureExt};

use super::super::registry::ValidatorRegistry;
use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::models::{IssueKind, Record};

pub const TYPE: &str = "SupplementaryFile";
const FASTA_FORMAT: &str = "fa";
const DSA_DATA_TYPE: &str = "DSA";
const REQUIRED: &[&str] = &["haplotype", "donor_specific_assembly"];

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_finish("dsa_haplotype", finish)
}

fn is_dsa_fasta(record: &Record) -> bool {
    record.get_str("file_format") == Some(FASTA_FORMAT)
        && record.strings("data_type").iter().any(|t| t.contains(DSA_DATA_TYPE))
}

fn finish(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    check(ds);
    future::ready(()).boxed()
}

fn check(ds: &mut StructuredDataset) {
    let mut problems = Vec::new();
    for record in ds.records(TYPE).iter().filter(|r| is_dsa_fasta(r)) {
        for field in REQUIRED {
            if !record.has(field) {
                problems.push((
                    record.row,
                    format!("{} is required for DSA fasta file {}", field, record.label()),
                ));
            }
        }
    }

    for (row, message) in problems {
        ds.note_validation_error(IssueKind::SchemaViolation, message, Some(TYPE), Some(row));
    }
}
