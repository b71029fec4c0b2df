//! Library preparation details depend on the analyte molecule.
//!
//! RNA libraries need a preparation that records `strand` (and
//! `rna_seq_protocol` for bulk RNA-seq); DNA libraries must not carry
//! either.

use futures::future::BoxFuture;

use super::super::registry::ValidatorRegistry;
use super::analyte::is_rna;
use super::{field_strings, has_field};
use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::models::{IssueKind, Record};

pub const TYPE: &str = "Library";
pub const ANALYTE: &str = "Analyte";
pub const PREPARATION: &str = "LibraryPreparation";

const BULK_RNA_SEQ: &str = "bulk_rna_seq";
const STRAND: &str = "strand";
const PROTOCOL: &str = "rna_seq_protocol";

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_finish("library_preparation", finish)
}

fn finish(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    Box::pin(check(ds))
}

async fn check(ds: &mut StructuredDataset) {
    let libraries: Vec<Record> = ds.records(TYPE).to_vec();
    let mut problems: Vec<(usize, String)> = Vec::new();

    for library in &libraries {
        let mut molecules = Vec::new();
        let mut resolved = 0;
        for analyte_id in library.strings("analytes") {
            if let Some(analyte) = ds.lookup(ANALYTE, &analyte_id).await {
                resolved += 1;
                molecules.extend(field_strings(&analyte, "molecule"));
            }
        }
        if resolved == 0 {
            continue;
        }
        let rna = is_rna(&molecules);
        let label = library.label();

        let preparation = match library.get_str("library_preparation") {
            Some(id) => ds.lookup(PREPARATION, id).await.map(|p| (id.to_string(), p)),
            None => {
                if rna {
                    problems.push((
                        library.row,
                        format!("library_preparation is required for RNA library {}", label),
                    ));
                }
                continue;
            }
        };
        let Some((prep_id, prep)) = preparation else {
            continue;
        };

        if rna {
            if !has_field(&prep, STRAND) {
                problems.push((
                    library.row,
                    format!("{} {} must have {} for RNA library {}", PREPARATION, prep_id, STRAND, label),
                ));
            }
            let bulk = library
                .get_str("assay")
                .map(|a| a.eq_ignore_ascii_case(BULK_RNA_SEQ))
                .unwrap_or(false);
            if bulk && !has_field(&prep, PROTOCOL) {
                problems.push((
                    library.row,
                    format!(
                        "{} {} must have {} for bulk RNA-seq library {}",
                        PREPARATION, prep_id, PROTOCOL, label
                    ),
                ));
            }
        } else {
            for field in [STRAND, PROTOCOL] {
                if has_field(&prep, field) {
                    problems.push((
                        library.row,
                        format!(
                            "{} {} must not have {} for non-RNA library {}",
                            PREPARATION, prep_id, field, label
                        ),
                    ));
                }
            }
        }
    }

    for (row, message) in problems {
        ds.note_validation_error(IssueKind::CrossReference, message, Some(TYPE), Some(row));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::InMemoryPortal;
    use crate::test_support::{dataset_with, empty_dataset, record};
    use serde_json::json;

    fn messages(ds: &StructuredDataset) -> Vec<String> {
        ds.errors().iter().map(|e| e.message.clone()).collect()
    }

    #[tokio::test]
    async fn test_rna_library_requirements() {
        let mut ds = empty_dataset();
        ds.extend_records(ANALYTE, vec![record(2, json!({ "submitted_id": "TEST_ANALYTE_RNA", "molecule": ["RNA"] }))]);
        ds.extend_records(PREPARATION, vec![record(2, json!({ "submitted_id": "TEST_PREP_1" }))]);
        ds.extend_records(
            TYPE,
            vec![
                record(2, json!({
                    "submitted_id": "TEST_LIBRARY_1",
                    "analytes": ["TEST_ANALYTE_RNA"],
                    "library_preparation": "TEST_PREP_1",
                    "assay": "bulk_rna_seq"
                })),
                record(3, json!({ "submitted_id": "TEST_LIBRARY_2", "analytes": ["TEST_ANALYTE_RNA"] })),
            ],
        );
        finish(&mut ds).await;

        assert_eq!(
            messages(&ds),
            vec![
                "LibraryPreparation TEST_PREP_1 must have strand for RNA library TEST_LIBRARY_1",
                "LibraryPreparation TEST_PREP_1 must have rna_seq_protocol for bulk RNA-seq library TEST_LIBRARY_1",
                "library_preparation is required for RNA library TEST_LIBRARY_2",
            ]
        );
    }

    #[tokio::test]
    async fn test_dna_library_forbids_rna_fields() {
        let mut ds = empty_dataset();
        ds.extend_records(ANALYTE, vec![record(2, json!({ "submitted_id": "TEST_ANALYTE_DNA", "molecule": ["DNA"] }))]);
        ds.extend_records(
            PREPARATION,
            vec![record(2, json!({ "submitted_id": "TEST_PREP_1", "strand": "Unstranded" }))],
        );
        ds.extend_records(
            TYPE,
            vec![record(2, json!({
                "submitted_id": "TEST_LIBRARY_1",
                "analytes": ["TEST_ANALYTE_DNA"],
                "library_preparation": "TEST_PREP_1"
            }))],
        );
        finish(&mut ds).await;

        assert_eq!(
            messages(&ds),
            vec!["LibraryPreparation TEST_PREP_1 must not have strand for non-RNA library TEST_LIBRARY_1"]
        );
    }

    #[tokio::test]
    async fn test_preparation_from_portal() {
        let portal = InMemoryPortal::new(json!({})).with_object(
            "/LibraryPreparation/REMOTE_PREP",
            json!({ "strand": "First Stranded", "rna_seq_protocol": "Smart-Seq2" }),
        );
        let mut ds = dataset_with(portal);
        ds.extend_records(ANALYTE, vec![record(2, json!({ "submitted_id": "A", "molecule": ["RNA"] }))]);
        ds.extend_records(
            TYPE,
            vec![record(2, json!({
                "submitted_id": "L",
                "analytes": ["A"],
                "library_preparation": "REMOTE_PREP",
                "assay": "bulk_rna_seq"
            }))],
        );
        finish(&mut ds).await;
        assert!(!ds.has_errors());
    }
}
