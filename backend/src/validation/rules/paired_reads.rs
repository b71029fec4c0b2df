//! Paired-end FASTQ consistency across `UnalignedReads`.
//!
//! An R2 file names its R1 partner in `paired_with`; both must belong to the
//! same file sets, and no R1 file may be claimed twice. Partners outside
//! the submission are not checked.

use futures::future::{self, BoxFuture, FutureExt};
use std::collections::{BTreeSet, HashMap};

use super::super::registry::ValidatorRegistry;
use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::models::{IssueKind, Record};

pub const TYPE: &str = "UnalignedReads";
const PAIRED_WITH: &str = "paired_with";
const READ_PAIR_NUMBER: &str = "read_pair_number";

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_finish("paired_reads", finish)
}

fn finish(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    check(ds);
    future::ready(()).boxed()
}

fn file_sets(record: &Record) -> BTreeSet<String> {
    record.strings("file_sets").into_iter().collect()
}

fn check(ds: &mut StructuredDataset) {
    let records = ds.records(TYPE);
    let by_id: HashMap<&str, &Record> = records
        .iter()
        .filter_map(|r| r.submitted_id().map(|id| (id, r)))
        .collect();

    let mut problems: Vec<(usize, String)> = Vec::new();
    let mut claimed: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let pair_number = record.get_str(READ_PAIR_NUMBER);
        let Some(partner_id) = record.get_str(PAIRED_WITH) else {
            if pair_number == Some("R2") {
                problems.push((
                    record.row,
                    format!("R2 file {} has no {}", record.label(), PAIRED_WITH),
                ));
            }
            continue;
        };

        if pair_number != Some("R2") {
            problems.push((
                record.row,
                format!(
                    "{} must be R2 when {} is set (file {})",
                    READ_PAIR_NUMBER,
                    PAIRED_WITH,
                    record.label()
                ),
            ));
        }

        match claimed.get(partner_id) {
            Some(first) => problems.push((
                record.row,
                format!("{} {} is used by rows {} and {}", PAIRED_WITH, partner_id, first, record.row),
            )),
            None => {
                claimed.insert(partner_id, record.row);
            }
        }

        let Some(partner) = by_id.get(partner_id) else {
            continue;
        };
        if partner.get_str(READ_PAIR_NUMBER) != Some("R1") {
            problems.push((
                record.row,
                format!("paired file {} must have {} R1", partner_id, READ_PAIR_NUMBER),
            ));
        }

        let own = file_sets(record);
        let theirs = file_sets(partner);
        if own != theirs {
            problems.push((
                record.row,
                format!(
                    "file_sets [{}] of {} differ from file_sets [{}] of paired file {}",
                    own.into_iter().collect::<Vec<_>>().join(", "),
                    record.label(),
                    theirs.into_iter().collect::<Vec<_>>().join(", "),
                    partner_id
                ),
            ));
        }
    }

    for (row, message) in problems {
        ds.note_validation_error(IssueKind::CrossReference, message, Some(TYPE), Some(row));
    }
}
