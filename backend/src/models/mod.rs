//! Domain models shared across the engine.
//!
//! - [`Record`] - one workbook row after mapping and normalization
//! - [`IssueKind`] / [`ValidationIssue`] - recorded (non-fatal) problems
//! - [`UnreferencedItem`] - advisory entry from the unreferenced sweep
//! - [`CompareEntry`] / [`FieldDiff`] - submission vs. Portal comparison

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// Record
// =============================================================================

/// A submitted record with its worksheet row number.
///
/// Row 1 is the header, so the first data row is row 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub row: usize,
    pub values: Map<String, Value>,
}

impl Record {
    pub fn new(row: usize, values: Map<String, Value>) -> Self {
        Self { row, values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !is_blank(v))
    }

    /// Non-blank string value of `key`, trimmed.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// True when `key` carries a non-blank value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// String values of `key`, whether stored as a scalar or a list.
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
            Some(v) => scalar_text(v).into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn submitted_id(&self) -> Option<&str> {
        self.get_str("submitted_id")
    }

    /// Identifier used in messages: `submitted_id` when present, else the row.
    pub fn label(&self) -> String {
        match self.submitted_id() {
            Some(id) => id.to_string(),
            None => format!("row {}", self.row),
        }
    }
}

/// Text form of a scalar, `None` for blanks and containers.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Check if a value is "empty" (null, blank string, empty container)
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

// =============================================================================
// Validation Issues
// =============================================================================

/// Category of a recorded problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    /// Sheet name matches no schema type; the sheet is skipped.
    UnknownSheet,
    /// Cell could not be converted to the schema type; raw value kept.
    TypeCoercion,
    /// Required, pattern, enum and similar schema constraints.
    SchemaViolation,
    DuplicateIdentifier,
    DuplicateRow,
    /// Inconsistency between linked records.
    CrossReference,
    /// Portal answered with something other than OK.
    RemoteRejected,
    /// Submission changes an already released Portal object.
    ReleasedModification,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::UnknownSheet => "UnknownSheetError",
            IssueKind::TypeCoercion => "TypeCoercionError",
            IssueKind::SchemaViolation => "SchemaViolation",
            IssueKind::DuplicateIdentifier => "DuplicateIdentifierError",
            IssueKind::DuplicateRow => "DuplicateRowError",
            IssueKind::CrossReference => "CrossReferenceError",
            IssueKind::RemoteRejected => "RemoteRejected",
            IssueKind::ReleasedModification => "ReleasedModificationError",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded validation problem.
///
/// `type_name` and `row` are absent for problems that span sheets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.type_name, self.row) {
            (Some(t), Some(row)) => write!(f, "{} {} row {}: {}", self.kind, t, row, self.message),
            (Some(t), None) => write!(f, "{} {}: {}", self.kind, t, self.message),
            _ => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

// =============================================================================
// Advisories
// =============================================================================

/// A record nothing else in the submission links to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreferencedItem {
    #[serde(rename = "type")]
    pub type_name: String,
    pub row: usize,
    pub identifier: String,
    /// Candidate paths that were looked up in the resolved references
    pub paths: Vec<String>,
}

impl fmt::Display for UnreferencedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (row {}) is not referenced", self.type_name, self.identifier, self.row)
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// A field whose submitted value differs from the Portal's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub submitted: Value,
    /// `None` when the Portal object lacks the field
    pub portal: Option<Value>,
}

/// Comparison of one submitted record against its existing Portal object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareEntry {
    pub path: String,
    pub row: usize,
    pub uuid: Option<String>,
    pub status: Option<String>,
    pub diffs: Vec<FieldDiff>,
}
