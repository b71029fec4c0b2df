//! Schema cache.
//!
//! A read-only snapshot of the Portal's type schemas, fetched once and shared
//! by every stage of a load. Type names are resolved tolerantly since
//! workbook authors rarely use canonical names: case, underscores, hyphens,
//! spaces and singular/plural variants all match.

pub mod property;

use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::SchemaError;
use crate::portal::Portal;

pub use property::{PropertySchema, SemanticType, TypeSchema, ROOT_TYPE};

/// Infrastructure types hidden from enumeration and sheet matching by default.
pub const DEFAULT_IGNORED_TYPES: &[&str] = &[
    "AccessKey",
    "Consortium",
    "FilterSet",
    "HiglassViewConfig",
    "IngestionSubmission",
    "Item",
    "MetaWorkflow",
    "MetaWorkflowRun",
    "OntologyTerm",
    "Page",
    "StaticSection",
    "SubmissionCenter",
    "SubmittedItem",
    "TestingDependencies",
    "TestingLinkedSchemaField",
    "TrackingItem",
    "User",
];

/// Memoised snapshot of all type schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    types: BTreeMap<String, TypeSchema>,
    ignored: HashSet<String>,
    by_normalized: HashMap<String, String>,
}

impl SchemaCache {
    /// Fetch every schema from the Portal.
    pub async fn fetch(portal: &dyn Portal, ignored: &[String]) -> Result<Self, SchemaError> {
        let schemas = portal.get_schemas().await?;
        Self::from_value(&schemas, ignored)
    }

    /// Build from a `type name -> schema` map.
    pub fn from_value(schemas: &Value, ignored: &[String]) -> Result<Self, SchemaError> {
        let map = schemas
            .as_object()
            .ok_or_else(|| SchemaError::Malformed("expected an object keyed by type name".into()))?;

        let mut types = BTreeMap::new();
        for (name, schema) in map {
            if !schema.is_object() {
                continue;
            }
            types.insert(name.clone(), TypeSchema::from_value(name, schema)?);
        }

        let ignored: HashSet<String> = ignored.iter().cloned().collect();
        let by_normalized = types
            .keys()
            .filter(|name| !ignored.contains(*name))
            .map(|name| (normalize_type_name(name), name.clone()))
            .collect();

        Ok(Self { types, ignored, by_normalized })
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.get(type_name)
    }

    /// Type names available to submissions, in sorted order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types
            .keys()
            .filter(|name| !self.ignored.contains(*name))
            .map(String::as_str)
    }

    pub fn identifying_properties(&self, type_name: &str) -> &[String] {
        self.get(type_name)
            .map(|s| s.identifying_properties.as_slice())
            .unwrap_or(&[])
    }

    pub fn required(&self, type_name: &str) -> &[String] {
        self.get(type_name).map(|s| s.required.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, type_name: &str) -> Option<&str> {
        self.get(type_name).and_then(|s| s.parent.as_deref())
    }

    /// Transitive parents, nearest first, without the synthetic root.
    pub fn super_types(&self, type_name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([type_name.to_string()]);
        let mut current = self.parent(type_name);

        while let Some(parent) = current {
            if parent == ROOT_TYPE || !seen.insert(parent.to_string()) {
                break;
            }
            chain.push(parent.to_string());
            current = self.parent(parent);
        }
        chain
    }

    pub fn is_abstract(&self, type_name: &str) -> bool {
        self.get(type_name).map(|s| s.is_abstract).unwrap_or(false)
    }

    pub fn property(&self, type_name: &str, name: &str) -> Option<&PropertySchema> {
        self.get(type_name).and_then(|s| s.property(name))
    }

    /// Canonical type name for a sheet name, if any.
    pub fn resolve_type_name(&self, name: &str) -> Option<&str> {
        let normalized = normalize_type_name(name);
        name_variants(&normalized)
            .iter()
            .find_map(|candidate| self.by_normalized.get(candidate))
            .map(String::as_str)
    }
}

/// Lowercase and strip separators: `"unaligned_reads"` -> `"unalignedreads"`.
pub fn normalize_type_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Singular/plural spellings of an already normalized name, exact first.
fn name_variants(normalized: &str) -> Vec<String> {
    let mut variants = vec![normalized.to_string()];
    if let Some(stem) = normalized.strip_suffix("ies") {
        variants.push(format!("{}y", stem));
    }
    if let Some(stem) = normalized.strip_suffix("es") {
        variants.push(stem.to_string());
    }
    if let Some(stem) = normalized.strip_suffix('s') {
        variants.push(stem.to_string());
    }
    variants.push(format!("{}s", normalized));
    variants
}
