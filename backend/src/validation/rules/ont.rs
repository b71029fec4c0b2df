//! Oxford Nanopore (ONT) unaligned reads need provenance and basecaller
//! details.
//!
//! A read file is ONT when one of its file sets points to a sequencing
//! whose sequencer is an ONT instrument. Such files must name their
//! `software`, FASTQ files must name what they were `derived_from`, and the
//! software must describe the basecalling model.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeSet;

use super::super::registry::ValidatorRegistry;
use super::{field_str, field_strings, has_field, path_tail};
use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::logs::log_warning;
use crate::models::{IssueKind, Record};

pub const TYPE: &str = "UnalignedReads";
pub const SEQUENCER: &str = "Sequencer";

/// Portal search listing every ONT sequencer
pub const ONT_SEQUENCER_SEARCH: &str = "/search/?type=Sequencer&platform=ONT";

const ONT_PLATFORM: &str = "ONT";
const FASTQ_GZ: &str = "fastq_gz";
const SOFTWARE_FIELDS: &[&str] = &["gpu_architecture", "model", "modification_tags"];

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_finish("ont_unaligned_reads", finish)
}

fn finish(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    Box::pin(check(ds))
}

/// Identifiers an item can be named by: `identifier`, `submitted_id`,
/// `uuid` and the last segment of `@id`.
fn item_identifiers(item: &Value) -> Vec<String> {
    let mut ids: Vec<String> = ["identifier", "submitted_id", "uuid"]
        .iter()
        .filter_map(|k| field_str(item, k))
        .collect();
    if let Some(tail) = item.get("@id").and_then(|v| v.as_str()).and_then(path_tail) {
        ids.push(tail.to_string());
    }
    ids
}

/// Identifiers of ONT sequencers, from the submission and the Portal.
async fn ont_sequencers(ds: &StructuredDataset) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for sequencer in ds.records(SEQUENCER) {
        if sequencer.get_str("platform") == Some(ONT_PLATFORM) {
            ids.extend(item_identifiers(&Value::Object(sequencer.values.clone())));
        }
    }

    if ds.options().skip_remote {
        return ids;
    }
    match ds.portal().get_metadata(ONT_SEQUENCER_SEARCH).await {
        Ok(Some(found)) => {
            if let Some(graph) = found.get("@graph").and_then(|g| g.as_array()) {
                for item in graph {
                    ids.extend(item_identifiers(item));
                }
            }
        }
        Ok(None) => {}
        Err(e) => log_warning(format!("ONT sequencer search failed: {}", e)),
    }
    ids
}

/// Follow `file_sets -> sequencing -> sequencer` for one read file.
async fn is_ont(ds: &StructuredDataset, reads: &Record, ont: &BTreeSet<String>) -> bool {
    for file_set_id in reads.strings("file_sets") {
        let Some(file_set) = ds.lookup("FileSet", &file_set_id).await else {
            continue;
        };
        for sequencing_id in field_strings(&file_set, "sequencing") {
            let Some(sequencing) = ds.lookup("Sequencing", &sequencing_id).await else {
                continue;
            };
            if field_strings(&sequencing, "sequencer").iter().any(|s| ont.contains(s)) {
                return true;
            }
        }
    }
    false
}

async fn check(ds: &mut StructuredDataset) {
    let reads: Vec<Record> = ds.records(TYPE).to_vec();
    if reads.is_empty() {
        return;
    }
    let ont = ont_sequencers(ds).await;
    if ont.is_empty() {
        return;
    }

    let mut problems: Vec<(usize, String)> = Vec::new();
    for file in &reads {
        if !is_ont(ds, file, &ont).await {
            continue;
        }
        let label = file.label();

        if file.get_str("file_format") == Some(FASTQ_GZ) && !file.has("derived_from") {
            problems.push((file.row, format!("derived_from is required for ONT FASTQ file {}", label)));
        }

        let software = file.strings("software");
        if software.is_empty() {
            problems.push((file.row, format!("software is required for ONT file {}", label)));
        }
        for software_id in software {
            let Some(item) = ds.lookup("Software", &software_id).await else {
                continue;
            };
            for field in SOFTWARE_FIELDS {
                if !has_field(&item, field) {
                    problems.push((
                        file.row,
                        format!("Software {} must have {} for ONT file {}", software_id, field, label),
                    ));
                }
            }
        }
    }

    for (row, message) in problems {
        ds.note_validation_error(IssueKind::CrossReference, message, Some(TYPE), Some(row));
    }
}
