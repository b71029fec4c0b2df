//! Shared fixtures for unit tests: a small schema map shaped like the
//! Portal's, datasets backed by an in-memory Portal, and record builders.

use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::dataset::StructuredDataset;
use crate::models::Record;
use crate::parser::Sheet;
use crate::pipeline::LoadOptions;
use crate::portal::InMemoryPortal;
use crate::schema::{SchemaCache, DEFAULT_IGNORED_TYPES};

/// Properties every submittable type carries.
fn base_properties() -> Map<String, Value> {
    match json!({
        "uuid": { "type": "string" },
        "submitted_id": { "type": "string" },
        "status": { "type": "string", "default": "in review" },
        "display_title": { "type": "string", "calculatedProperty": true },
        "description": { "type": "string" },
        "comments": { "type": "string" }
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn item_type(parent: &str, is_abstract: bool, properties: Value) -> Value {
    let mut all = base_properties();
    if let Value::Object(extra) = properties {
        all.extend(extra);
    }
    json!({
        "rdfs:subClassOf": format!("/profiles/{}.json", parent),
        "isAbstract": is_abstract,
        "identifyingProperties": ["uuid", "submitted_id"],
        "required": ["submitted_id", "status"],
        "properties": all
    })
}

fn qc_values() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "derived_from": { "type": "string" },
                "key": { "type": "string" },
                "value": { "type": "number" }
            }
        }
    })
}

fn file_properties(extra: Value) -> Value {
    let mut properties = json!({
        "file_format": { "type": "string", "linkTo": "FileFormat" },
        "filename": { "type": "string" },
        "file_sets": { "type": "array", "items": { "type": "string", "linkTo": "FileSet" } },
        "derived_from": { "type": "array", "items": { "type": "string", "linkTo": "SubmittedFile" } },
        "software": { "type": "array", "items": { "type": "string", "linkTo": "Software" } },
        "qc_values": qc_values()
    });
    if let (Some(base), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        base.extend(extra);
    }
    properties
}

/// Schema map keyed by type name, as served by the schema endpoint.
pub(crate) fn fixture_schemas() -> Value {
    json!({
        "Item": { "isAbstract": true, "properties": { "uuid": { "type": "string" } } },
        "AccessKey": item_type("Item", false, json!({})),
        "File": item_type("Item", true, file_properties(json!({}))),
        "SubmittedFile": item_type("File", true, file_properties(json!({}))),
        "OutputFile": item_type("File", false, file_properties(json!({}))),
        "UnalignedReads": item_type("SubmittedFile", false, file_properties(json!({
            "paired_with": { "type": "string", "linkTo": "UnalignedReads" },
            "read_pair_number": { "type": "string", "enum": ["R1", "R2", "Not Applicable"] }
        }))),
        "AlignedReads": item_type("SubmittedFile", false, file_properties(json!({}))),
        "VariantCalls": item_type("SubmittedFile", false, file_properties(json!({}))),
        "SupplementaryFile": item_type("SubmittedFile", false, file_properties(json!({
            "data_type": { "type": "array", "items": { "type": "string" } },
            "haplotype": { "type": "string" },
            "donor_specific_assembly": { "type": "string" }
        }))),
        "Donor": item_type("Item", false, json!({
            "external_id": { "type": "string" },
            "sex": { "type": "string", "enum": ["Male", "Female"] },
            "age": { "type": "integer", "minimum": 0 }
        })),
        "Tissue": item_type("Item", false, json!({
            "external_id": { "type": "string" },
            "donor": { "type": "string", "linkTo": "Donor" }
        })),
        "TissueSample": item_type("Item", false, json!({
            "external_id": { "type": "string" },
            "category": { "type": "string" },
            "sample_sources": { "type": "array", "items": { "type": "string", "linkTo": "Tissue" } }
        })),
        "Analyte": item_type("Item", false, json!({
            "molecule": { "type": "array", "items": { "type": "string" } },
            "rna_integrity_number": { "type": "number" },
            "samples": { "type": "array", "items": { "type": "string", "linkTo": "TissueSample" } }
        })),
        "AnalytePreparation": item_type("Item", false, json!({ "extraction_method": { "type": "string" } })),
        "Library": item_type("Item", false, json!({
            "analytes": { "type": "array", "items": { "type": "string", "linkTo": "Analyte" } },
            "library_preparation": { "type": "string", "linkTo": "LibraryPreparation" },
            "assay": { "type": "string" }
        })),
        "LibraryPreparation": item_type("Item", false, json!({
            "strand": { "type": "string" },
            "rna_seq_protocol": { "type": "string" },
            "preparation_kits": { "type": "array", "items": { "type": "string", "linkTo": "PreparationKit" } }
        })),
        "PreparationKit": item_type("Item", false, json!({ "vendor": { "type": "string" } })),
        "Sequencing": item_type("Item", false, json!({
            "sequencer": { "type": "string", "linkTo": "Sequencer" },
            "read_type": { "type": "string" },
            "target_read_length": { "type": "integer" }
        })),
        "Sequencer": item_type("Item", false, json!({
            "identifier": { "type": "string" },
            "platform": { "type": "string" }
        })),
        "Basecalling": item_type("Item", false, json!({ "model": { "type": "string" } })),
        "Software": item_type("Item", false, json!({
            "name": { "type": "string" },
            "version": { "type": "string" },
            "model": { "type": "string" },
            "gpu_architecture": { "type": "string" },
            "modification_tags": { "type": "array", "items": { "type": "string" } }
        })),
        "Treatment": item_type("Item", false, json!({ "agent": { "type": "string" } })),
        "FileSet": item_type("Item", false, json!({
            "libraries": { "type": "array", "items": { "type": "string", "linkTo": "Library" } },
            "sequencing": { "type": "string", "linkTo": "Sequencing" },
            "qc_values": qc_values()
        }))
    })
}

fn ignored_types() -> Vec<String> {
    DEFAULT_IGNORED_TYPES.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn fixture_cache() -> SchemaCache {
    SchemaCache::from_value(&fixture_schemas(), &ignored_types()).expect("fixture schemas")
}

/// In-memory Portal serving the fixture schemas.
pub(crate) fn fixture_portal() -> InMemoryPortal {
    InMemoryPortal::new(fixture_schemas())
}

pub(crate) fn record(row: usize, values: Value) -> Record {
    match values {
        Value::Object(map) => Record::new(row, map),
        other => panic!("record fixture must be an object, got {}", other),
    }
}

pub(crate) fn dataset_on(portal: Arc<InMemoryPortal>) -> StructuredDataset {
    StructuredDataset::new(portal, Arc::new(fixture_cache()), LoadOptions::default())
}

pub(crate) fn dataset_with(portal: InMemoryPortal) -> StructuredDataset {
    dataset_on(Arc::new(portal))
}

pub(crate) fn empty_dataset() -> StructuredDataset {
    dataset_with(fixture_portal())
}

/// A sheet from a header and data rows; rows are numbered from 2.
pub(crate) fn sheet(name: &str, header: &[&str], rows: Vec<Vec<Value>>) -> Sheet {
    Sheet::new(
        name,
        header.iter().map(|h| h.to_string()).collect(),
        rows.into_iter().enumerate().map(|(i, cells)| (i + 2, cells)).collect(),
    )
}
