//! Terminal sweep for records nothing links to.
//!
//! Runs after every finish validator. Findings are advisories, not errors:
//! an unreferenced donor or library is suspicious but may be intended.

use crate::dataset::StructuredDataset;
use crate::models::UnreferencedItem;
use crate::portal::item_path;

/// Types that are leaves of the submission graph and need no referrer
pub const ALLOWED_UNREFERENCED: &[&str] = &[
    "AlignedReads",
    "DeathCircumstances",
    "Demographic",
    "Diagnosis",
    "Exposure",
    "FamilyHistory",
    "HistologyImage",
    "MedicalTreatment",
    "SupplementaryFile",
    "TissueCollection",
    "TissueSample",
    "UnalignedReads",
    "VariantCalls",
];

/// Records whose candidate paths (`/T/id` for the type and each super-type)
/// never appear among the dataset's resolved references.
pub fn unreferenced_items(ds: &StructuredDataset) -> Vec<UnreferencedItem> {
    let mut items = Vec::new();
    for (type_name, records) in ds.data() {
        if ALLOWED_UNREFERENCED.contains(&type_name.as_str()) {
            continue;
        }

        let mut types = vec![type_name.clone()];
        types.extend(ds.schemas().super_types(type_name));

        for record in records {
            let ids = ds.identifiers(type_name, record);
            let paths: Vec<String> = ids
                .iter()
                .flat_map(|id| types.iter().map(move |t| item_path(t, id)))
                .collect();

            if !paths.iter().any(|p| ds.resolved_refs().contains(p)) {
                items.push(UnreferencedItem {
                    type_name: type_name.clone(),
                    row: record.row,
                    identifier: ids.first().cloned().unwrap_or_else(|| record.label()),
                    paths,
                });
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{empty_dataset, record};
    use serde_json::json;

    #[test]
    fn test_sweep_respects_refs_and_allow_list() {
        let mut ds = empty_dataset();
        ds.extend_records(
            "Analyte",
            vec![
                record(2, json!({ "submitted_id": "TEST_ANALYTE_1" })),
                record(3, json!({ "submitted_id": "TEST_ANALYTE_2" })),
            ],
        );
        ds.extend_records("UnalignedReads", vec![record(2, json!({ "submitted_id": "TEST_READS_1" }))]);
        ds.extend_records(
            "Library",
            vec![record(2, json!({ "submitted_id": "TEST_LIBRARY_1", "analytes": ["TEST_ANALYTE_1"] }))],
        );
        let library = ds.records("Library")[0].values.clone();
        ds.resolve_refs("Library", &library);

        let items = unreferenced_items(&ds);
        let found: Vec<(&str, &str)> = items
            .iter()
            .map(|i| (i.type_name.as_str(), i.identifier.as_str()))
            .collect();
        assert_eq!(found, vec![("Analyte", "TEST_ANALYTE_2"), ("Library", "TEST_LIBRARY_1")]);
        assert_eq!(items[0].paths, vec!["/Analyte/TEST_ANALYTE_2"]);
    }

    #[test]
    fn test_reference_through_super_type() {
        let mut ds = empty_dataset();
        ds.extend_records("AlignedReads", vec![record(2, json!({ "submitted_id": "TEST_ALIGNED_1" }))]);
        ds.extend_records("OutputFile", vec![record(2, json!({ "submitted_id": "TEST_OUTPUT_1" }))]);
        ds.resolve_refs(
            "AlignedReads",
            json!({ "derived_from": ["TEST_OUTPUT_1"] }).as_object().unwrap(),
        );

        // OutputFile is a File; a link to SubmittedFile/File covers it.
        assert!(unreferenced_items(&ds).is_empty());
    }
}
