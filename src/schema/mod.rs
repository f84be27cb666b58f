//! Schema inference module
//!
//! Infers a flat field-to-type schema per file and merges them into one
//! schema per stream.
//!
//! # Merge rules
//!
//! - **Equal types**: kept as is
//! - **Integer + Number**: widened to number
//! - **Null + Integer**: widened to number
//! - **Null + anything else**: the concrete type wins
//! - **Anything else**: a [`SchemaConflict`], never a silent coercion
//!
//! A field missing from some records or files is not a conflict.

mod inference;
mod types;

pub use inference::{infer_schema, merge_field_type, merge_schemas, InferredSchema, SchemaInferrer};
pub use types::{JsonType, SchemaConflict, StreamSchema};
