//! Schema types

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// JSON Schema type tag observed for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    /// Type tag of a JSON value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    JsonType::Integer
                } else {
                    JsonType::Number
                }
            }
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    /// Check if this type can be merged with another
    pub fn can_merge_with(&self, other: &JsonType) -> bool {
        self.merge_with(other).is_some()
    }

    /// Merge two types, returning the more general type
    ///
    /// Returns `None` when the types are incompatible. A null observation
    /// widens an integer field to number and leaves any other type as is.
    pub fn merge_with(&self, other: &JsonType) -> Option<JsonType> {
        match (self, other) {
            (a, b) if a == b => Some(*a),
            (JsonType::Null, JsonType::Integer) | (JsonType::Integer, JsonType::Null) => {
                Some(JsonType::Number)
            }
            (JsonType::Null, other) | (other, JsonType::Null) => Some(*other),
            (JsonType::Integer, JsonType::Number) | (JsonType::Number, JsonType::Integer) => {
                Some(JsonType::Number)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonType::String => write!(f, "string"),
            JsonType::Number => write!(f, "number"),
            JsonType::Integer => write!(f, "integer"),
            JsonType::Boolean => write!(f, "boolean"),
            JsonType::Object => write!(f, "object"),
            JsonType::Array => write!(f, "array"),
            JsonType::Null => write!(f, "null"),
        }
    }
}

/// Field-to-type mapping inferred for a file or a whole stream
///
/// Schemas are values: merging produces a new schema and leaves the
/// inputs untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamSchema {
    fields: BTreeMap<String, JsonType>,
}

impl StreamSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from `(field, type)` pairs
    ///
    /// Later pairs overwrite earlier ones with the same name; use
    /// [`SchemaInferrer`](super::SchemaInferrer) to merge instead.
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, JsonType)>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, t)| (k.into(), t)).collect(),
        }
    }

    /// Add a field, returning the updated schema
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, json_type: JsonType) -> Self {
        self.fields.insert(name.into(), json_type);
        self
    }

    /// Get the type of a field
    pub fn get(&self, name: &str) -> Option<JsonType> {
        self.fields.get(name).copied()
    }

    /// Iterate over fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, JsonType)> {
        self.fields.iter().map(|(k, t)| (k.as_str(), *t))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn set(&mut self, name: &str, json_type: JsonType) {
        self.fields.insert(name.to_string(), json_type);
    }

    /// Render as a draft-07 JSON Schema document
    ///
    /// Every property is nullable since a field may be absent from any
    /// given record.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, json_type)| {
                let property = if *json_type == JsonType::Null {
                    json!({ "type": "null" })
                } else {
                    json!({ "type": [json_type, "null"] })
                };
                (name.clone(), property)
            })
            .collect();

        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": properties,
            "additionalProperties": true
        })
    }
}

/// An irreconcilable pair of types observed for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConflict {
    /// Field name
    pub field: String,
    /// Type already recorded for the field
    pub existing: JsonType,
    /// Type that could not be merged into it
    pub observed: JsonType,
}

impl std::fmt::Display for SchemaConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "field '{}' observed as both {} and {}",
            self.field, self.existing, self.observed
        )
    }
}

impl From<SchemaConflict> for crate::error::Error {
    fn from(conflict: SchemaConflict) -> Self {
        crate::error::Error::schema_conflict(conflict.field, conflict.existing, conflict.observed)
    }
}
