//! Structured dataset: everything known about one submission.
//!
//! Records grouped by type in workbook order, the reference paths found
//! while parsing, and the validation problems recorded so far. Validators
//! only ever add to it through [`StructuredDataset::note_validation_error`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use crate::models::{scalar_text, CompareEntry, FieldDiff, IssueKind, Record, ValidationIssue};
use crate::pipeline::LoadOptions;
use crate::portal::{item_path, item_request_path, Portal, PortalValidator};
use crate::schema::SchemaCache;

/// Fields tried, after the schema's identifying properties, to name a record
const FALLBACK_IDENTIFIERS: &[&str] = &["submitted_id", "uuid", "accession", "identifier"];

/// Expected file count captured from a `FileSet` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFileCount {
    pub file_set: String,
    pub row: usize,
    pub expected: u64,
}

#[derive(Serialize)]
pub struct StructuredDataset {
    data: BTreeMap<String, Vec<Record>>,
    resolved_refs: BTreeSet<String>,
    errors: Vec<ValidationIssue>,

    /// Mirrors `errors` for constant-time duplicate checks
    #[serde(skip)]
    seen_errors: HashSet<ValidationIssue>,
    #[serde(skip)]
    portal: Arc<dyn Portal>,
    #[serde(skip)]
    schemas: Arc<SchemaCache>,
    #[serde(skip)]
    options: LoadOptions,

    /// `submitted_id` values seen per type, as `(row, value)`
    #[serde(skip)]
    pub(crate) submitted_ids: BTreeMap<String, Vec<(usize, String)>>,
    #[serde(skip)]
    pub(crate) expected_file_counts: Vec<ExpectedFileCount>,
}

impl StructuredDataset {
    pub fn new(portal: Arc<dyn Portal>, schemas: Arc<SchemaCache>, options: LoadOptions) -> Self {
        Self {
            data: BTreeMap::new(),
            resolved_refs: BTreeSet::new(),
            errors: Vec::new(),
            seen_errors: HashSet::new(),
            portal,
            schemas,
            options,
            submitted_ids: BTreeMap::new(),
            expected_file_counts: Vec::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn data(&self) -> &BTreeMap<String, Vec<Record>> {
        &self.data
    }

    pub fn resolved_refs(&self) -> &BTreeSet<String> {
        &self.resolved_refs
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn portal(&self) -> Arc<dyn Portal> {
        Arc::clone(&self.portal)
    }

    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    #[cfg(test)]
    pub(crate) fn options_mut(&mut self) -> &mut LoadOptions {
        &mut self.options
    }

    /// Records of one type, in workbook order.
    pub fn records(&self, type_name: &str) -> &[Record] {
        self.data.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of records across all types.
    pub fn record_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    // =========================================================================
    // Building
    // =========================================================================

    pub(crate) fn extend_records(&mut self, type_name: &str, records: Vec<Record>) {
        self.data.entry(type_name.to_string()).or_default().extend(records);
    }

    /// Record a problem. Recording the same problem twice keeps one copy.
    pub fn note_validation_error(
        &mut self,
        kind: IssueKind,
        message: impl Into<String>,
        type_name: Option<&str>,
        row: Option<usize>,
    ) {
        let issue = ValidationIssue {
            kind,
            message: message.into(),
            type_name: type_name.map(String::from),
            row,
        };
        if self.seen_errors.insert(issue.clone()) {
            self.errors.push(issue);
        }
    }

    /// Add `/T/v` and `/S/v` (every super-type `S` of `T`) for each linking
    /// field of a record.
    pub fn resolve_refs(&mut self, type_name: &str, values: &Map<String, Value>) {
        let mut found = Vec::new();
        for (name, value) in values {
            let Some(target) = self
                .schemas
                .property(type_name, name)
                .and_then(|p| p.link_target())
            else {
                continue;
            };

            let identifiers: Vec<String> = match value {
                Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
                other => scalar_text(other).into_iter().collect(),
            };
            if identifiers.is_empty() {
                continue;
            }

            let mut targets = vec![target.to_string()];
            targets.extend(self.schemas.super_types(target));
            for id in &identifiers {
                for t in &targets {
                    found.push(item_path(t, id));
                }
            }
        }
        self.resolved_refs.extend(found);
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Identifier values a record can be referenced by.
    pub fn identifiers(&self, type_name: &str, record: &Record) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        let properties = self.schemas.identifying_properties(type_name);
        let fields = properties
            .iter()
            .map(String::as_str)
            .chain(FALLBACK_IDENTIFIERS.iter().copied());

        for field in fields {
            for id in record.strings(field) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Find a submitted record of `type_name` (or one of its sub-types).
    pub fn find_record(&self, type_name: &str, identifier: &str) -> Option<&Record> {
        self.data
            .iter()
            .filter(|(t, _)| {
                t.as_str() == type_name || self.schemas.super_types(t).iter().any(|s| s == type_name)
            })
            .find_map(|(t, records)| {
                records
                    .iter()
                    .find(|r| self.identifiers(t, r).iter().any(|id| id == identifier))
            })
    }

    /// Look up an item in the submission, then on the Portal.
    ///
    /// Portal failures count as "not found".
    pub async fn lookup(&self, type_name: &str, identifier: &str) -> Option<Value> {
        if let Some(record) = self.find_record(type_name, identifier) {
            return Some(Value::Object(record.values.clone()));
        }
        if self.options.skip_remote {
            return None;
        }
        self.portal
            .get_metadata(&item_request_path(type_name, identifier))
            .await
            .ok()
            .flatten()
    }

    // =========================================================================
    // Compare
    // =========================================================================

    /// Compare each record that already exists on the Portal with its
    /// remote object. Returns per-type entries in workbook order.
    pub async fn compare(&self) -> BTreeMap<String, Vec<CompareEntry>> {
        let mut candidates: Vec<(String, String, &Record)> = Vec::new();
        let mut paths = Vec::new();
        for (type_name, records) in &self.data {
            for record in records {
                if let Some(id) = self.identifiers(type_name, record).into_iter().next() {
                    paths.push(item_request_path(type_name, &id));
                    candidates.push((type_name.clone(), item_path(type_name, &id), record));
                }
            }
        }

        let mut result: BTreeMap<String, Vec<CompareEntry>> = BTreeMap::new();
        if self.options.skip_remote || paths.is_empty() {
            return result;
        }

        let validator = PortalValidator::new(self.portal(), self.options.portal_concurrency);
        let fetched = validator.fetch_all(paths).await;

        for ((type_name, path, record), (_, response)) in candidates.into_iter().zip(fetched) {
            let Ok(Some(remote)) = response else {
                continue;
            };
            let entry = CompareEntry {
                path,
                row: record.row,
                uuid: remote.get("uuid").and_then(|v| v.as_str()).map(String::from),
                status: remote.get("status").and_then(|v| v.as_str()).map(String::from),
                diffs: self.diff(&type_name, record, &remote),
            };
            result.entry(type_name).or_default().push(entry);
        }
        result
    }

    fn diff(&self, type_name: &str, record: &Record, remote: &Value) -> Vec<FieldDiff> {
        record
            .values
            .iter()
            .filter_map(|(field, submitted)| {
                let portal = remote.get(field);
                let is_link = self
                    .schemas
                    .property(type_name, field)
                    .and_then(|p| p.link_target())
                    .is_some();

                let same = match portal {
                    Some(p) if is_link => links_match(submitted, p),
                    Some(p) => p == submitted,
                    None => false,
                };
                (!same).then(|| FieldDiff {
                    field: field.clone(),
                    submitted: submitted.clone(),
                    portal: portal.cloned(),
                })
            })
            .collect()
    }
}

/// Linked values match when every submitted identifier names one of the
/// Portal's linked items (by identifier or `@id` path segment).
fn links_match(submitted: &Value, portal: &Value) -> bool {
    let wanted: Vec<String> = match submitted {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    };
    let remote: Vec<&Value> = match portal {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    if wanted.len() != remote.len() {
        return false;
    }
    wanted.iter().all(|id| remote.iter().any(|r| names_item(r, id)))
}

fn names_item(remote: &Value, identifier: &str) -> bool {
    match remote {
        Value::String(s) => s == identifier || s.trim_matches('/').rsplit('/').next() == Some(identifier),
        Value::Object(obj) => ["@id", "uuid", "submitted_id", "accession", "identifier"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .any(|v| names_item(v, identifier)),
        _ => false,
    }
}
