//! Submitted identifier checks.
//!
//! The column hook collects every `submitted_id` per type; the finish hook
//! reports values used by more than one row and asks the Portal whether
//! each distinct value is legal for the submission centers.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;

use super::super::registry::ValidatorRegistry;
use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::logs::log_info;
use crate::models::{scalar_text, IssueKind};
use crate::portal::{PortalValidator, SubmittedIdCheck};

pub const COLUMN: &str = "submitted_id";

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_column(COLUMN, collect)?;
    registry.register_finish("submitted_id", finish)
}

fn collect(ds: &mut StructuredDataset, type_name: &str, _: &str, row: usize, value: Value) -> Value {
    if let Some(id) = scalar_text(&value) {
        ds.submitted_ids
            .entry(type_name.to_string())
            .or_default()
            .push((row, id.clone()));
        return Value::String(id);
    }
    value
}

fn finish(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    Box::pin(validate(ds))
}

async fn validate(ds: &mut StructuredDataset) {
    let collected = std::mem::take(&mut ds.submitted_ids);

    let mut checks = Vec::new();
    for (type_name, entries) in &collected {
        let mut first_rows: BTreeMap<&str, usize> = BTreeMap::new();
        for (row, value) in entries {
            match first_rows.get(value.as_str()) {
                Some(first) => ds.note_validation_error(
                    IssueKind::DuplicateIdentifier,
                    format!("submitted_id {} is used by rows {} and {}", value, first, row),
                    Some(type_name.as_str()),
                    Some(*row),
                ),
                None => {
                    first_rows.insert(value.as_str(), *row);
                    checks.push(SubmittedIdCheck {
                        type_name: type_name.clone(),
                        row: *row,
                        value: value.clone(),
                    });
                }
            }
        }
    }

    if ds.options().skip_remote || checks.is_empty() {
        return;
    }

    log_info(format!("Validating {} submitted identifiers with the Portal", checks.len()));
    let validator = PortalValidator::new(ds.portal(), ds.options().portal_concurrency);
    let centers = ds.options().submission_centers.clone();
    let results = validator.validate_submitted_ids(checks, &centers).await;

    for (check, verdict) in results {
        if let Some(reason) = verdict {
            ds.note_validation_error(
                IssueKind::RemoteRejected,
                format!("submitted_id {} rejected: {}", check.value, reason),
                Some(check.type_name.as_str()),
                Some(check.row),
            );
        }
    }
}
