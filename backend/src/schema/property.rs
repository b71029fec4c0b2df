//! Per-type schema and property descriptors as served by the Portal.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::error::SchemaError;

/// Synthetic root every Portal type inherits from.
pub const ROOT_TYPE: &str = "Item";

/// JSON type of a property, as declared by its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl SemanticType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

/// A property descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    /// `"type"`: a name or a list of names (`["string", "null"]`)
    #[serde(rename = "type", default)]
    pub kind: Option<Value>,
    #[serde(default)]
    pub items: Option<Box<PropertySchema>>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    /// Target type name (some schemas list several)
    #[serde(default)]
    pub link_to: Option<Value>,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub min_length: Option<u64>,
    #[serde(default)]
    pub max_length: Option<u64>,
    #[serde(default)]
    pub unique_items: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub calculated_property: bool,
}

impl PropertySchema {
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match &self.kind {
            Some(Value::String(name)) => SemanticType::parse(name),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(|n| n.as_str())
                .filter(|n| *n != "null")
                .find_map(SemanticType::parse),
            _ => None,
        }
    }

    /// Link target of this property, or of its items when it is an array.
    pub fn link_target(&self) -> Option<&str> {
        first_link(self.link_to.as_ref())
            .or_else(|| self.items.as_ref().and_then(|i| first_link(i.link_to.as_ref())))
    }
}

fn first_link(link: Option<&Value>) -> Option<&str> {
    match link? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(list) => list.iter().find_map(|v| v.as_str()),
        _ => None,
    }
}

/// A cached type schema.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    pub name: String,
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: Vec<String>,
    pub identifying_properties: Vec<String>,
    pub parent: Option<String>,
    pub is_abstract: bool,
    pub any_of: Vec<Value>,
    pub additional_properties: Option<bool>,
    raw_properties: Map<String, Value>,
}

impl TypeSchema {
    pub fn from_value(name: &str, value: &Value) -> Result<Self, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::Malformed(format!("schema for {} is not an object", name)))?;

        let raw_properties = obj
            .get("properties")
            .and_then(|p| p.as_object())
            .cloned()
            .unwrap_or_default();

        let mut properties = BTreeMap::new();
        for (prop_name, prop) in &raw_properties {
            let descriptor: PropertySchema = serde_json::from_value(prop.clone()).map_err(|e| {
                SchemaError::Malformed(format!("{}.{}: {}", name, prop_name, e))
            })?;
            properties.insert(prop_name.clone(), descriptor);
        }

        Ok(Self {
            name: name.to_string(),
            properties,
            required: string_list(obj.get("required")),
            identifying_properties: string_list(obj.get("identifyingProperties")),
            parent: parent_name(obj),
            is_abstract: obj.get("isAbstract").and_then(|v| v.as_bool()).unwrap_or(false),
            any_of: obj
                .get("anyOf")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
            additional_properties: obj.get("additionalProperties").and_then(|v| v.as_bool()),
            raw_properties,
        })
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    /// JSON Schema (draft 7) used for record conformance checks.
    ///
    /// Calculated and defaulted properties are filled in by the Portal, so
    /// they are not required of the submitter.
    pub fn conformance_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .raw_properties
            .iter()
            .filter(|(name, _)| !self.is_calculated(name))
            .map(|(name, prop)| (name.clone(), prop.clone()))
            .collect();

        let required: Vec<&String> = self
            .required
            .iter()
            .filter(|name| !self.is_server_filled(name))
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "required": required,
        });
        if !self.any_of.is_empty() {
            schema["anyOf"] = Value::Array(self.any_of.clone());
        }
        if let Some(additional) = self.additional_properties {
            schema["additionalProperties"] = Value::Bool(additional);
        }
        schema
    }

    fn is_calculated(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .map(|p| p.calculated_property)
            .unwrap_or(false)
    }

    fn is_server_filled(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .map(|p| p.calculated_property || p.default.is_some())
            .unwrap_or(false)
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|list| list.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

/// `parent`, or the type named by `rdfs:subClassOf` (`/profiles/<Type>.json`).
fn parent_name(obj: &Map<String, Value>) -> Option<String> {
    if let Some(parent) = obj.get("parent").and_then(|v| v.as_str()) {
        return Some(parent.to_string());
    }
    obj.get("rdfs:subClassOf")
        .and_then(|v| v.as_str())
        .and_then(|s| s.rsplit('/').next())
        .map(|s| s.trim_end_matches(".json").to_string())
        .filter(|s| !s.is_empty())
}
