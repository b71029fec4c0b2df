//! Coerce cell values toward the types their schema declares.
//!
//! Workbook cells arrive as text or spreadsheet numbers. Where the schema
//! asks for something else and the conversion is unambiguous, the value is
//! converted; otherwise the raw value is kept and a failure is reported.

use serde_json::{Map, Number, Value};

use crate::schema::{PropertySchema, SemanticType, TypeSchema};

/// Separator for list values written in a single cell
pub const ARRAY_SEPARATOR: char = '|';

const TRUE_VALUES: &[&str] = &["true", "yes", "y", "1"];
const FALSE_VALUES: &[&str] = &["false", "no", "n", "0"];

/// A value that could not be converted.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionFailure {
    /// Dotted location within the record, e.g. `qc_values[0].value`
    pub field: String,
    pub value: Value,
    pub expected: &'static str,
}

impl CoercionFailure {
    pub fn message(&self) -> String {
        format!(
            "cannot convert {} to {} for {}",
            self.value, self.expected, self.field
        )
    }
}

/// Coerce every property of `values` the schema knows about.
///
/// Unknown columns are left untouched.
pub fn coerce_record(schema: &TypeSchema, values: &mut Map<String, Value>) -> Vec<CoercionFailure> {
    let mut failures = Vec::new();
    for (name, value) in values.iter_mut() {
        if let Some(prop) = schema.property(name) {
            let raw = std::mem::take(value);
            *value = coerce_value(prop, raw, name, &mut failures);
        }
    }
    failures
}

fn coerce_value(
    prop: &PropertySchema,
    value: Value,
    field: &str,
    failures: &mut Vec<CoercionFailure>,
) -> Value {
    let Some(kind) = prop.semantic_type() else {
        return value;
    };
    if value.is_null() {
        return value;
    }

    let converted = match kind {
        SemanticType::String => to_string(&value),
        SemanticType::Integer => to_integer(&value),
        SemanticType::Number => to_number(&value),
        SemanticType::Boolean => to_boolean(&value),
        SemanticType::Array => return coerce_array(prop, value, field, failures),
        SemanticType::Object => return coerce_object(prop, value, field, failures),
    };

    match converted {
        Some(v) => v,
        None => {
            failures.push(CoercionFailure {
                field: field.to_string(),
                value: value.clone(),
                expected: type_label(kind),
            });
            value
        }
    }
}

fn coerce_array(
    prop: &PropertySchema,
    value: Value,
    field: &str,
    failures: &mut Vec<CoercionFailure>,
) -> Value {
    let items = match value {
        Value::Array(items) => items,
        Value::String(s) => split_list(&s),
        other => vec![other],
    };

    let Some(item_schema) = prop.items.as_deref() else {
        return Value::Array(items);
    };
    Value::Array(
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| coerce_value(item_schema, item, &format!("{}[{}]", field, i), failures))
            .collect(),
    )
}

fn coerce_object(
    prop: &PropertySchema,
    value: Value,
    field: &str,
    failures: &mut Vec<CoercionFailure>,
) -> Value {
    let Value::Object(mut map) = value else {
        return value;
    };
    for (name, nested) in map.iter_mut() {
        if let Some(nested_prop) = prop.properties.get(name) {
            let raw = std::mem::take(nested);
            *nested = coerce_value(nested_prop, raw, &format!("{}.{}", field, name), failures);
        }
    }
    Value::Object(map)
}

/// Split a `|`-separated cell, dropping empty parts.
pub fn split_list(text: &str) -> Vec<Value> {
    text.split(ARRAY_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
        .collect()
}

fn to_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => whole(n.as_f64()?),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Some(Value::from(i)),
                Err(_) => whole(s.parse::<f64>().ok()?),
            }
        }
        _ => None,
    }
}

fn whole(f: f64) -> Option<Value> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            let f = s.parse::<f64>().ok()?;
            Number::from_f64(f).map(Value::Number)
        }
        _ => None,
    }
}

fn to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => match n.as_i64()? {
            1 => Some(Value::Bool(true)),
            0 => Some(Value::Bool(false)),
            _ => None,
        },
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            if TRUE_VALUES.contains(&s.as_str()) {
                Some(Value::Bool(true))
            } else if FALSE_VALUES.contains(&s.as_str()) {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn type_label(kind: SemanticType) -> &'static str {
    match kind {
        SemanticType::String => "string",
        SemanticType::Number => "number",
        SemanticType::Integer => "integer",
        SemanticType::Boolean => "boolean",
        SemanticType::Array => "array",
        SemanticType::Object => "object",
    }
}
