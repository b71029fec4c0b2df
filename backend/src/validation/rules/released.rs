//! Released Portal items are immutable: any submitted change to one is an
//! error, whichever field it touches.

use futures::future::BoxFuture;

use super::super::registry::ValidatorRegistry;
use crate::dataset::StructuredDataset;
use crate::error::ConfigurationError;
use crate::models::IssueKind;

pub const RELEASED_STATUS: &str = "released";

pub fn register(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    registry.register_finish("released_items", finish)
}

fn finish(ds: &mut StructuredDataset) -> BoxFuture<'_, ()> {
    Box::pin(check(ds))
}

async fn check(ds: &mut StructuredDataset) {
    if ds.options().skip_remote {
        return;
    }
    let compared = ds.compare().await;

    for (type_name, entries) in compared {
        for entry in entries {
            if entry.status.as_deref() != Some(RELEASED_STATUS) || entry.diffs.is_empty() {
                continue;
            }
            let fields: Vec<&str> = entry.diffs.iter().map(|d| d.field.as_str()).collect();
            ds.note_validation_error(
                IssueKind::ReleasedModification,
                format!("cannot modify released item {} (changed: {})", entry.path, fields.join(", ")),
                Some(type_name.as_str()),
                Some(entry.row),
            );
        }
    }
}
