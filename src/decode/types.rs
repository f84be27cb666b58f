//! Parser types and traits
//!
//! Defines the format parser abstraction and the per-format options.

use crate::error::{Error, Result};
use crate::schema::{InferredSchema, SchemaInferrer, StreamSchema};
use crate::types::Record;
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// Plain (already decompressed) byte stream handed to a parser
pub type ByteReader = Box<dyn BufRead + Send>;

/// Lazy, single-pass sequence of parsed records
pub type RecordIter = Box<dyn Iterator<Item = Result<Record>> + Send>;

/// One opened file, ready to yield records
pub struct OpenedFile {
    /// Fields known before any record is read
    pub schema: StreamSchema,
    /// Whether `schema` is complete, as for formats with an embedded schema
    ///
    /// When false, the schema of the file is `schema` widened by the
    /// records themselves.
    pub self_describing: bool,
    /// Records in file order
    pub records: RecordIter,
}

impl OpenedFile {
    /// A file whose schema comes entirely from its records
    pub fn scanned(records: RecordIter) -> Self {
        Self {
            schema: StreamSchema::new(),
            self_describing: false,
            records,
        }
    }

    /// Start an inference pass seeded with the fields known up front
    pub fn inferrer(&self) -> SchemaInferrer {
        let mut inferrer = SchemaInferrer::new();
        inferrer.merge(&self.schema);
        inferrer
    }
}

/// Trait for parsing one file format into records
///
/// Every operation consumes the byte stream; a file has to be reopened to
/// be read again.
pub trait FormatParser: Send + Sync {
    /// Format name used in logs
    fn name(&self) -> &'static str;

    /// Open one file, reading its header or embedded schema
    ///
    /// The record iterator stops after the first error it yields.
    fn open(&self, path: &str, reader: ByteReader) -> Result<OpenedFile>;

    /// Infer the schema of one file, keeping conflicts alongside the
    /// fields that merged cleanly
    ///
    /// Self-describing formats read their embedded schema. Text formats
    /// scan the records.
    fn infer(&self, path: &str, reader: ByteReader) -> Result<InferredSchema> {
        scan(self.open(path, reader)?)
    }

    /// Infer the schema of one file
    ///
    /// A field observed with incompatible types inside one file fails with
    /// a schema conflict.
    fn infer_schema(&self, path: &str, reader: ByteReader) -> Result<StreamSchema> {
        self.infer(path, reader)?.into_result()
    }

    /// Parse one file into records, in file order
    fn parse_records(&self, path: &str, reader: ByteReader) -> Result<RecordIter> {
        Ok(self.open(path, reader)?.records)
    }
}

/// Infer the schema of an opened file
///
/// Records are only read when the file does not describe itself.
pub fn scan(file: OpenedFile) -> Result<InferredSchema> {
    let mut inferrer = file.inferrer();
    if !file.self_describing {
        for record in file.records {
            inferrer.observe(&record?);
        }
    }
    Ok(inferrer.finish())
}

// ============================================================================
// Format Options
// ============================================================================

/// Options for the CSV parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field delimiter (single ASCII character)
    pub delimiter: char,
    /// Whether the first row is a header
    pub has_header: bool,
    /// Coerce integers, floats, booleans and empty values instead of
    /// keeping every value as a string
    pub infer_types: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
            infer_types: false,
        }
    }
}

impl CsvOptions {
    /// Delimiter as a byte, if it is a single ASCII character
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                Error::invalid_value(
                    "format.csv.delimiter",
                    format!("'{}' is not a single ASCII character", self.delimiter),
                )
            })
    }
}

/// Options for the JSONL parser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlOptions {
    /// Allow a JSON value to span several lines
    pub newlines_in_values: bool,
}

/// Options for every built-in parser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// CSV options
    pub csv: CsvOptions,
    /// JSONL options
    pub jsonl: JsonlOptions,
}
