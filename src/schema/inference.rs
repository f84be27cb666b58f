//! Schema inference and merging
//!
//! Field types are folded pairwise with [`merge_field_type`]. The fold is
//! associative, so the merged schema does not depend on the order in which
//! files or records arrive.

use super::types::{JsonType, SchemaConflict, StreamSchema};
use crate::error::{Error, Result};
use crate::types::Record;
use std::collections::BTreeSet;

/// Merge an observed type into the type already recorded for a field
pub fn merge_field_type(field: &str, existing: JsonType, observed: JsonType) -> Result<JsonType> {
    existing
        .merge_with(&observed)
        .ok_or_else(|| Error::schema_conflict(field, existing, observed))
}

/// Infer a schema from a full pass over records
///
/// Fails on the first field observed with incompatible types.
pub fn infer_schema<'a, I>(records: I) -> Result<StreamSchema>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut inferrer = SchemaInferrer::new();
    for record in records {
        inferrer.observe(record);
    }
    inferrer.finish().into_result()
}

/// Merge schemas left to right
///
/// An empty input yields the empty schema.
pub fn merge_schemas<'a, I>(schemas: I) -> Result<StreamSchema>
where
    I: IntoIterator<Item = &'a StreamSchema>,
{
    let mut inferrer = SchemaInferrer::new();
    for schema in schemas {
        inferrer.merge(schema);
    }
    inferrer.finish().into_result()
}

/// Result of an inference pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferredSchema {
    /// Merged schema. A conflicting field keeps the first type recorded for it.
    pub schema: StreamSchema,
    /// Conflicts hit while merging, at most one per field
    pub conflicts: Vec<SchemaConflict>,
}

impl InferredSchema {
    /// Check if every field merged cleanly
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Convert into the schema, or the first conflict as an error
    pub fn into_result(self) -> Result<StreamSchema> {
        match self.conflicts.into_iter().next() {
            Some(conflict) => Err(conflict.into()),
            None => Ok(self.schema),
        }
    }
}

/// Accumulates field type observations from records or whole schemas
///
/// Conflicts do not stop accumulation: they are collected so that a
/// stream can keep emitting records while its schema is reported invalid.
#[derive(Debug, Clone, Default)]
pub struct SchemaInferrer {
    schema: StreamSchema,
    conflicts: Vec<SchemaConflict>,
    conflicted: BTreeSet<String>,
    record_count: usize,
}

impl SchemaInferrer {
    /// Create a new schema inferrer
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe every field of a record
    pub fn observe(&mut self, record: &Record) {
        self.record_count += 1;
        for (name, value) in record {
            self.observe_field(name, JsonType::of(value));
        }
    }

    /// Merge every field of an already inferred schema
    pub fn merge(&mut self, schema: &StreamSchema) {
        for (name, json_type) in schema.fields() {
            self.observe_field(name, json_type);
        }
    }

    /// Record conflicts found by an earlier pass
    pub fn extend_conflicts(&mut self, conflicts: impl IntoIterator<Item = SchemaConflict>) {
        for conflict in conflicts {
            if self.conflicted.insert(conflict.field.clone()) {
                self.conflicts.push(conflict);
            }
        }
    }

    /// Observe one field type
    pub fn observe_field(&mut self, name: &str, observed: JsonType) {
        let Some(existing) = self.schema.get(name) else {
            self.schema.set(name, observed);
            return;
        };

        match existing.merge_with(&observed) {
            Some(merged) => {
                if merged != existing {
                    self.schema.set(name, merged);
                }
            }
            None => {
                if self.conflicted.insert(name.to_string()) {
                    self.conflicts.push(SchemaConflict {
                        field: name.to_string(),
                        existing,
                        observed,
                    });
                }
            }
        }
    }

    /// Number of records observed
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Check if any conflict was recorded so far
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Finish the pass
    pub fn finish(self) -> InferredSchema {
        InferredSchema {
            schema: self.schema,
            conflicts: self.conflicts,
        }
    }
}
