//! External identifiers of NDRI tissues follow their donor's.
//!
//! For NDRI submissions a tissue's `external_id` starts with the donor's
//! (`ST001` -> `ST001-1A`), and a tissue sample's starts with its tissue's
//! (`ST001-1A` -> `ST001-1A-001`). Only checked when one side of the link
//! was submitted by NDRI.

use futures::future::BoxFuture;
use serde_json::Value;

use super::super::registry::ValidatorRegistry;
use super::{center_prefix, field_str};
use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::models::{IssueKind, Record};

pub const TISSUE: &str = "Tissue";
pub const TISSUE_SAMPLE: &str = "TissueSample";
pub const DONOR: &str = "Donor";

/// Submission center code of the NDRI tissue bank
pub const NDRI_CENTER: &str = "NDRI";

const EXTERNAL_ID: &str = "external_id";

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_finish("tissue_external_id", finish_tissues)?;
    registry.register_finish("tissue_sample_external_id", finish_tissue_samples)
}

fn is_ndri(submitted_id: Option<&str>) -> bool {
    submitted_id.map(|id| center_prefix(id) == NDRI_CENTER).unwrap_or(false)
}

/// Leading `parts` hyphen-separated components of an external id.
fn external_id_prefix(external_id: &str, parts: usize) -> String {
    external_id
        .splitn(parts + 1, '-')
        .take(parts)
        .collect::<Vec<_>>()
        .join("-")
}

fn finish_tissues(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    Box::pin(check_tissues(ds))
}

async fn check_tissues(ds: &mut StructuredDataset) {
    let tissues: Vec<Record> = ds.records(TISSUE).to_vec();
    let mut problems = Vec::new();

    for tissue in &tissues {
        let (Some(donor_id), Some(external_id)) = (tissue.get_str("donor"), tissue.get_str(EXTERNAL_ID)) else {
            continue;
        };
        let Some(donor) = ds.lookup(DONOR, donor_id).await else {
            continue;
        };
        if let Some(message) = tissue_problem(tissue, external_id, donor_id, &donor) {
            problems.push((tissue.row, message));
        }
    }

    for (row, message) in problems {
        ds.note_validation_error(IssueKind::CrossReference, message, Some(TISSUE), Some(row));
    }
}

fn tissue_problem(tissue: &Record, external_id: &str, donor_id: &str, donor: &Value) -> Option<String> {
    let donor_submitted = field_str(donor, "submitted_id").unwrap_or_else(|| donor_id.to_string());
    if !is_ndri(tissue.submitted_id()) && !is_ndri(Some(&donor_submitted)) {
        return None;
    }
    let donor_external = field_str(donor, EXTERNAL_ID)?;

    let prefix = external_id_prefix(external_id, 1);
    (prefix != donor_external).then(|| {
        format!(
            "external_id {} of tissue {} does not match external_id {} of donor {}",
            external_id,
            tissue.label(),
            donor_external,
            donor_id
        )
    })
}

fn finish_tissue_samples(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    Box::pin(check_tissue_samples(ds))
}

async fn check_tissue_samples(ds: &mut StructuredDataset) {
    let samples: Vec<Record> = ds.records(TISSUE_SAMPLE).to_vec();
    let mut problems = Vec::new();

    for sample in &samples {
        let Some(external_id) = sample.get_str(EXTERNAL_ID) else {
            continue;
        };
        for source in sample.strings("sample_sources") {
            let Some(tissue) = ds.lookup(TISSUE, &source).await else {
                continue;
            };
            let tissue_submitted = field_str(&tissue, "submitted_id").unwrap_or_else(|| source.clone());
            if !is_ndri(sample.submitted_id()) && !is_ndri(Some(&tissue_submitted)) {
                continue;
            }
            let Some(tissue_external) = field_str(&tissue, EXTERNAL_ID) else {
                continue;
            };

            if external_id_prefix(external_id, 2) != tissue_external {
                problems.push((
                    sample.row,
                    format!(
                        "external_id {} of tissue sample {} does not match external_id {} of tissue {}",
                        external_id,
                        sample.label(),
                        tissue_external,
                        source
                    ),
                ));
            }
        }
    }

    for (row, message) in problems {
        ds.note_validation_error(IssueKind::CrossReference, message, Some(TISSUE_SAMPLE), Some(row));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::InMemoryPortal;
    use crate::test_support::{dataset_with, empty_dataset, record};
    use serde_json::json;

    #[test]
    fn test_external_id_prefix() {
        assert_eq!(external_id_prefix("ST001-1A", 1), "ST001");
        assert_eq!(external_id_prefix("ST001-1A-001", 2), "ST001-1A");
        assert_eq!(external_id_prefix("ST001", 2), "ST001");
    }

    #[tokio::test]
    async fn test_ndri_tissue_mismatch() {
        let mut ds = empty_dataset();
        ds.extend_records(DONOR, vec![record(2, json!({ "submitted_id": "TEST_DONOR_1", "external_id": "D-999" }))]);
        ds.extend_records(
            TISSUE,
            vec![record(2, json!({ "submitted_id": "NDRI_X", "external_id": "T-001", "donor": "TEST_DONOR_1" }))],
        );
        finish_tissues(&mut ds).await;

        assert_eq!(ds.errors().len(), 1);
        assert_eq!(ds.errors()[0].kind, IssueKind::CrossReference);
        assert_eq!(
            ds.errors()[0].message,
            "external_id T-001 of tissue NDRI_X does not match external_id D-999 of donor TEST_DONOR_1"
        );
    }

    #[tokio::test]
    async fn test_non_ndri_and_matching_tissues_pass() {
        let mut ds = empty_dataset();
        ds.extend_records(
            DONOR,
            vec![
                record(2, json!({ "submitted_id": "NDRI_DONOR_1", "external_id": "ST001" })),
                record(3, json!({ "submitted_id": "BROAD_DONOR_2", "external_id": "X" })),
            ],
        );
        ds.extend_records(
            TISSUE,
            vec![
                record(2, json!({ "submitted_id": "NDRI_TISSUE_1", "external_id": "ST001-1A", "donor": "NDRI_DONOR_1" })),
                record(3, json!({ "submitted_id": "BROAD_TISSUE_2", "external_id": "Y-1", "donor": "BROAD_DONOR_2" })),
            ],
        );
        finish_tissues(&mut ds).await;
        assert!(!ds.has_errors());
    }

    #[tokio::test]
    async fn test_donor_fetched_from_portal() {
        let portal = InMemoryPortal::new(json!({}))
            .with_object("/Donor/NDRI_DONOR_7", json!({ "submitted_id": "NDRI_DONOR_7", "external_id": "ST007" }));
        let mut ds = dataset_with(portal);
        ds.extend_records(
            TISSUE,
            vec![record(2, json!({ "submitted_id": "OTHER_T", "external_id": "ST008-1A", "donor": "NDRI_DONOR_7" }))],
        );
        finish_tissues(&mut ds).await;
        assert_eq!(ds.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_tissue_sample_prefix() {
        let mut ds = empty_dataset();
        ds.extend_records(
            TISSUE,
            vec![record(2, json!({ "submitted_id": "NDRI_TISSUE_1", "external_id": "ST001-1A" }))],
        );
        ds.extend_records(
            TISSUE_SAMPLE,
            vec![
                record(2, json!({ "submitted_id": "NDRI_SAMPLE_1", "external_id": "ST001-1A-001", "sample_sources": ["NDRI_TISSUE_1"] })),
                record(3, json!({ "submitted_id": "NDRI_SAMPLE_2", "external_id": "ST001-2B-001", "sample_sources": ["NDRI_TISSUE_1"] })),
            ],
        );
        finish_tissue_samples(&mut ds).await;

        assert_eq!(ds.errors().len(), 1);
        assert_eq!(ds.errors()[0].row, Some(3));
        assert_eq!(ds.errors()[0].type_name.as_deref(), Some(TISSUE_SAMPLE));
    }
}
