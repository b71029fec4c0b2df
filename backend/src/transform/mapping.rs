//! Column mapping catalog.
//!
//! Lets a workbook use compact columns that expand into the nested shape
//! the schemas expect. The catalog is a JSON document:
//!
//! ```text
//! { "sheet_mappings":  { <sheet> -> <column mapping> | <alias> },
//!   "column_mappings": { <alias> -> <column mapping> } }
//! ```
//!
//! A column mapping is `source column -> { target path -> template }`, where
//! a template is `{name}` (the source column name), `{value}` (the cell
//! value) or any other constant.
//!
//! The catalog is acquired once: remote URL first, then the copy bundled
//! with the crate, then an empty catalog (every column passes through).

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CatalogError, CatalogResult};
use crate::logs::{log_success, log_warning};
use crate::schema::normalize_type_name;

/// Published location of the mapping catalog
pub const DEFAULT_MAPPING_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/smaht-dac/submitr/master/submitr/config/column_mappings.json";

/// Catalog bundled with the crate
const BUNDLED_CATALOG: &str = include_str!("../../mappings/column_mappings.json");

/// Template substituting the source column name
pub const NAME_TEMPLATE: &str = "{name}";
/// Template substituting the cell value
pub const VALUE_TEMPLATE: &str = "{value}";

/// `target path -> template` for one source column
pub type TargetMap = BTreeMap<String, Value>;

/// `source column -> targets` for one sheet
pub type ColumnMapping = BTreeMap<String, TargetMap>;

/// Resolved mapping catalog: every sheet entry is a concrete mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MappingCatalog {
    pub sheet_mappings: BTreeMap<String, ColumnMapping>,
}

impl MappingCatalog {
    /// Parse and resolve a catalog document.
    ///
    /// Alias entries are replaced by their column mapping; entries whose
    /// alias is missing, or that are not mappings, are dropped.
    pub fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let aliases = value
            .get("column_mappings")
            .and_then(|v| v.as_object())
            .unwrap_or(&empty);
        let sheets = value
            .get("sheet_mappings")
            .and_then(|v| v.as_object())
            .unwrap_or(&empty);

        let mut sheet_mappings = BTreeMap::new();
        for (sheet, entry) in sheets {
            let resolved = match entry {
                Value::String(alias) => aliases.get(alias),
                other => Some(other),
            };
            if let Some(Value::Object(columns)) = resolved {
                sheet_mappings.insert(sheet.clone(), column_mapping(columns));
            }
        }

        Self { sheet_mappings }
    }

    pub fn from_json(text: &str) -> CatalogResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }

    /// The catalog bundled with the crate.
    pub fn bundled() -> CatalogResult<Self> {
        Self::from_json(BUNDLED_CATALOG)
    }

    /// Acquire the catalog: `source` (URL or local file) first, the bundled
    /// copy next, and an empty catalog when both fail.
    pub async fn acquire(source: Option<&str>) -> Self {
        let source = source.unwrap_or(DEFAULT_MAPPING_CATALOG_URL);
        match fetch(source).await {
            Ok(catalog) => {
                log_success(format!(
                    "Loaded column mappings for {} sheets from {}",
                    catalog.sheet_mappings.len(),
                    source
                ));
                return catalog;
            }
            Err(e) => log_warning(format!("{}; using bundled column mappings", e)),
        }

        match Self::bundled() {
            Ok(catalog) => catalog,
            Err(e) => {
                log_warning(format!("{}; columns will not be remapped", e));
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sheet_mappings.is_empty()
    }

    /// Mapping for a sheet, matched exactly or by normalized name.
    pub fn for_sheet(&self, sheet_name: &str) -> Option<&ColumnMapping> {
        if let Some(mapping) = self.sheet_mappings.get(sheet_name) {
            return Some(mapping);
        }
        let wanted = normalize_type_name(sheet_name);
        self.sheet_mappings
            .iter()
            .find(|(name, _)| normalize_type_name(name) == wanted)
            .map(|(_, mapping)| mapping)
    }
}

fn column_mapping(columns: &Map<String, Value>) -> ColumnMapping {
    columns
        .iter()
        .filter_map(|(source, targets)| {
            let targets = targets.as_object()?;
            let targets: TargetMap = targets.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            Some((source.clone(), targets))
        })
        .collect()
}

async fn fetch(source: &str) -> CatalogResult<MappingCatalog> {
    let fetch_error = |message: String| CatalogError::Fetch {
        url: source.to_string(),
        message,
    };

    let text = if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source)
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status().as_u16())));
        }
        response.text().await.map_err(|e| fetch_error(e.to_string()))?
    } else {
        let path = source.strip_prefix("file://").unwrap_or(source);
        tokio::fs::read_to_string(Path::new(path))
            .await
            .map_err(|e| fetch_error(e.to_string()))?
    };

    MappingCatalog::from_json(&text)
}

// =============================================================================
// Applying a sheet mapping
// =============================================================================

/// Replace each mapped source column by its target paths.
///
/// Applying this to an already expanded header changes nothing.
pub fn map_header(header: &[String], mapping: &ColumnMapping) -> Vec<String> {
    let mut mapped = Vec::with_capacity(header.len());
    for column in header {
        match mapping.get(column) {
            Some(targets) => {
                for target in targets.keys() {
                    if !mapped.contains(target) {
                        mapped.push(target.clone());
                    }
                }
            }
            None => {
                if !mapped.contains(column) {
                    mapped.push(column.clone());
                }
            }
        }
    }
    mapped
}

/// Expand the mapped source columns of one record.
pub fn map_record(record: Map<String, Value>, mapping: &ColumnMapping) -> Map<String, Value> {
    if mapping.is_empty() {
        return record;
    }

    let mut mapped = Map::new();
    let mut expanded = Vec::new();
    for (column, value) in record {
        match mapping.get(&column) {
            Some(targets) => {
                for (target, template) in targets {
                    expanded.push((target.clone(), expand(template, &column, &value)));
                }
            }
            None => {
                mapped.insert(column, value);
            }
        }
    }
    mapped.extend(expanded);
    mapped
}

fn expand(template: &Value, column: &str, value: &Value) -> Value {
    match template.as_str() {
        Some(NAME_TEMPLATE) => Value::String(column.to_string()),
        Some(VALUE_TEMPLATE) => value.clone(),
        _ => template.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> MappingCatalog {
        MappingCatalog::from_value(&json!({
            "sheet_mappings": {
                "FileSet": "qc",
                "Orphan": "missing_alias",
                "Broken": 42,
                "Inline": { "a": { "x.y": "{value}" } }
            },
            "column_mappings": {
                "qc": {
                    "total_raw_reads_sequenced": {
                        "qc_values#0.derived_from": "{name}",
                        "qc_values#0.value": "{value}",
                        "qc_values#0.key": "Total Raw Reads Sequenced"
                    }
                }
            }
        }))
    }

    #[test]
    fn test_alias_resolution_drops_unusable_entries() {
        let catalog = catalog();
        let names: Vec<&str> = catalog.sheet_mappings.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["FileSet", "Inline"]);
        assert!(catalog.for_sheet("file_set").is_some());
        assert!(catalog.for_sheet("Orphan").is_none());
    }

    #[test]
    fn test_header_expansion_is_idempotent() {
        let catalog = catalog();
        let mapping = catalog.for_sheet("FileSet").unwrap();
        let header = vec!["submitted_id".to_string(), "total_raw_reads_sequenced".to_string()];

        let once = map_header(&header, mapping);
        assert_eq!(
            once,
            vec![
                "submitted_id",
                "qc_values#0.derived_from",
                "qc_values#0.key",
                "qc_values#0.value"
            ]
        );
        assert_eq!(map_header(&once, mapping), once);
    }

    #[test]
    fn test_record_templates() {
        let catalog = catalog();
        let mapping = catalog.for_sheet("FileSet").unwrap();
        let record = json!({ "submitted_id": "FS_1", "total_raw_reads_sequenced": 11870183 });

        let mapped = map_record(record.as_object().cloned().unwrap(), mapping);
        assert_eq!(mapped["submitted_id"], "FS_1");
        assert_eq!(mapped["qc_values#0.derived_from"], "total_raw_reads_sequenced");
        assert_eq!(mapped["qc_values#0.value"], 11870183);
        assert_eq!(mapped["qc_values#0.key"], "Total Raw Reads Sequenced");
        assert!(!mapped.contains_key("total_raw_reads_sequenced"));

        let again = map_record(mapped.clone(), mapping);
        assert_eq!(again, mapped);
    }

    #[test]
    fn test_bundled_catalog_parses() {
        let catalog = MappingCatalog::bundled().unwrap();
        assert!(catalog.for_sheet("FileSet").is_some());
    }

    #[tokio::test]
    async fn test_acquire_falls_back_to_bundled() {
        let catalog = MappingCatalog::acquire(Some("/nonexistent/column_mappings.json")).await;
        assert_eq!(catalog, MappingCatalog::bundled().unwrap());
    }

    #[tokio::test]
    async fn test_acquire_from_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        std::fs::write(
            &path,
            r#"{"sheet_mappings": {"Donor": {"age_years": {"age": "{value}"}}}, "column_mappings": {}}"#,
        )
        .unwrap();

        let catalog = MappingCatalog::acquire(path.to_str()).await;
        assert_eq!(catalog.sheet_mappings.len(), 1);
        assert!(catalog.for_sheet("Donor").unwrap().contains_key("age_years"));
    }
}
