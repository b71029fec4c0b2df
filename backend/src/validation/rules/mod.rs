//! Built-in validation rules.
//!
//! Each module exposes `register`, wiring its hooks into the registry.
//! Registration order below is the order finish validators run in.

pub mod analyte;
pub mod duplicate_row;
pub mod file_set;
pub mod identifier;
pub mod library;
pub mod ont;
pub mod paired_reads;
pub mod released;
pub mod supplementary;
pub mod tissue;

use serde_json::Value;

use super::registry::ValidatorRegistry;
use crate::error::ConfigurationError;
use crate::models::{is_blank, scalar_text};

/// Register every built-in rule.
pub fn register_all(registry: &mut ValidatorRegistry) -> Result<(), ConfigurationError> {
    identifier::register(registry)?;
    duplicate_row::register(registry)?;
    file_set::register(registry)?;
    analyte::register(registry)?;
    library::register(registry)?;
    paired_reads::register(registry)?;
    tissue::register(registry)?;
    supplementary::register(registry)?;
    ont::register(registry)?;
    released::register(registry)?;
    Ok(())
}

// =============================================================================
// Helpers for items that come from the submission or the Portal
// =============================================================================

/// Trimmed, non-empty scalar value of `key`.
pub(crate) fn field_str(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(scalar_text)
}

/// Values of `key` as strings, whether stored as a scalar or a list.
pub(crate) fn field_strings(item: &Value, key: &str) -> Vec<String> {
    match item.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(v) => scalar_text(v).into_iter().collect(),
        None => Vec::new(),
    }
}

pub(crate) fn has_field(item: &Value, key: &str) -> bool {
    item.get(key).map(|v| !is_blank(v)).unwrap_or(false)
}

/// Submission center code of a submitted identifier: the text before the
/// first `_`.
pub(crate) fn center_prefix(submitted_id: &str) -> &str {
    submitted_id.split('_').next().unwrap_or(submitted_id)
}

/// Last segment of a Portal `@id` such as `/sequencers/ont_promethion_24/`.
pub(crate) fn path_tail(path: &str) -> Option<&str> {
    path.trim_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_helpers() {
        let item = json!({ "a": " x ", "b": ["p", "q"], "c": "", "d": 7 });
        assert_eq!(field_str(&item, "a").as_deref(), Some("x"));
        assert_eq!(field_str(&item, "c"), None);
        assert_eq!(field_strings(&item, "b"), vec!["p", "q"]);
        assert_eq!(field_strings(&item, "d"), vec!["7"]);
        assert!(has_field(&item, "b"));
        assert!(!has_field(&item, "c"));
    }

    #[test]
    fn test_center_prefix_and_path_tail() {
        assert_eq!(center_prefix("NDRI_TISSUE_1"), "NDRI");
        assert_eq!(center_prefix("PLAIN"), "PLAIN");
        assert_eq!(path_tail("/sequencers/ont_promethion_24/"), Some("ont_promethion_24"));
        assert_eq!(path_tail("/"), None);
    }
}
