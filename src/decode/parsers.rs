//! Text format parsers
//!
//! JSONL and CSV are read one record at a time and never hold a whole file
//! in memory. Neither format embeds a schema, so inference scans the
//! records.

use super::types::{ByteReader, CsvOptions, FormatParser, JsonlOptions, OpenedFile, RecordIter};
use crate::error::{Error, Result};
use crate::schema::{JsonType, StreamSchema};
use crate::types::Record;
use serde_json::{Number, Value};
use std::io::BufRead;

/// Iterator adapter that ends after the first error
pub(crate) struct StopOnError<I> {
    inner: I,
    failed: bool,
}

impl<I> StopOnError<I> {
    pub(crate) fn new(inner: I) -> Self {
        Self {
            inner,
            failed: false,
        }
    }
}

impl<I: Iterator<Item = Result<Record>>> Iterator for StopOnError<I> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?;
        self.failed = item.is_err();
        Some(item)
    }
}

// ============================================================================
// JSONL Parser
// ============================================================================

/// JSON Lines parser (one JSON object per line)
#[derive(Debug, Clone, Default)]
pub struct JsonlParser {
    options: JsonlOptions,
}

impl JsonlParser {
    /// Create a new JSONL parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSONL parser with options
    pub fn with_options(options: JsonlOptions) -> Self {
        Self { options }
    }
}

impl FormatParser for JsonlParser {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn open(&self, path: &str, reader: ByteReader) -> Result<OpenedFile> {
        let path = path.to_string();

        if self.options.newlines_in_values {
            let values = serde_json::Deserializer::from_reader(reader).into_iter::<Value>();
            let mut index = 0usize;
            let records = values.map(move |value| {
                index += 1;
                let value = value
                    .map_err(|e| Error::record_parse(&path, format!("value {index}: {e}")))?;
                into_record(&path, value, &format!("value {index}"))
            });
            return Ok(OpenedFile::scanned(Box::new(StopOnError::new(records))));
        }

        let records = reader
            .lines()
            .enumerate()
            .filter_map(move |(index, line)| {
                let line_num = index + 1;
                let line = match line {
                    Ok(line) => line,
                    Err(e) => return Some(Err(line_error(&path, line_num, e))),
                };
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }
                let record = serde_json::from_str::<Value>(line)
                    .map_err(|e| Error::record_parse(&path, format!("line {line_num}: {e}")))
                    .and_then(|value| into_record(&path, value, &format!("line {line_num}")));
                Some(record)
            });

        Ok(OpenedFile::scanned(Box::new(StopOnError::new(records))))
    }
}

/// Accept only JSON objects as records
fn into_record(path: &str, value: Value, location: &str) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::record_parse(
            path,
            format!(
                "{location}: expected a JSON object, found {}",
                JsonType::of(&other)
            ),
        )),
    }
}

/// Invalid UTF-8 is malformed content, anything else is an I/O failure
fn line_error(path: &str, line_num: usize, error: std::io::Error) -> Error {
    if error.kind() == std::io::ErrorKind::InvalidData {
        Error::record_parse(path, format!("line {line_num}: {error}"))
    } else {
        Error::Io(error)
    }
}

// ============================================================================
// CSV Parser
// ============================================================================

/// CSV parser with configurable delimiter and header handling
#[derive(Debug, Clone)]
pub struct CsvParser {
    options: CsvOptions,
    delimiter: u8,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            options: CsvOptions::default(),
            delimiter: b',',
        }
    }
}

impl CsvParser {
    /// Create a new CSV parser with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a CSV parser with custom settings
    pub fn with_options(options: CsvOptions) -> Result<Self> {
        let delimiter = options.delimiter_byte()?;
        Ok(Self { options, delimiter })
    }

    /// Open a reader and return the header names with the row iterator
    ///
    /// Without a header row the names are empty and generated per column.
    fn rows(&self, path: &str, reader: ByteReader) -> Result<(Vec<String>, RecordIter)> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.options.has_header)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = if self.options.has_header {
            csv_reader
                .headers()
                .map_err(|e| csv_error(path, &[], e))?
                .iter()
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        let path = path.to_string();
        let names = headers.clone();
        let infer_types = self.options.infer_types;
        let records = csv_reader.into_records().map(move |row| {
            let row = row.map_err(|e| csv_error(&path, &names, e))?;
            Ok(row
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    let value = if infer_types {
                        parse_csv_value(value)
                    } else {
                        Value::String(value.to_string())
                    };
                    (column_name(&names, i), value)
                })
                .collect())
        });

        Ok((headers, Box::new(StopOnError::new(records))))
    }
}

impl FormatParser for CsvParser {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn open(&self, path: &str, reader: ByteReader) -> Result<OpenedFile> {
        let (headers, records) = self.rows(path, reader)?;

        // Untyped header columns are strings even when the file has no rows
        let schema = if self.options.infer_types {
            StreamSchema::new()
        } else {
            StreamSchema::from_fields(headers.into_iter().map(|h| (h, JsonType::String)))
        };

        Ok(OpenedFile {
            schema,
            self_describing: false,
            records,
        })
    }
}

fn column_name(headers: &[String], index: usize) -> String {
    headers
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("column_{index}"))
}

/// Convert a CSV error into the file-level error taxonomy
fn csv_error(path: &str, headers: &[String], error: csv::Error) -> Error {
    let message = error.to_string();
    match error.into_kind() {
        csv::ErrorKind::Io(e) => Error::Io(e),
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let line = pos.map_or(0, |p| p.line());
            Error::record_parse(
                path,
                format!("line {line}: found {len} fields, expected {expected_len}"),
            )
        }
        csv::ErrorKind::Utf8 { pos, err } => {
            let line = pos.map_or(0, |p| p.line());
            Error::field_parse(
                path,
                column_name(headers, err.field()),
                format!("line {line}: invalid UTF-8"),
            )
        }
        _ => Error::record_parse(path, message),
    }
}

/// Parse a CSV value into a JSON value
///
/// Empty and `null` become null, then integer, float and boolean are
/// tried in that order. Anything else stays a string.
pub fn parse_csv_value(value: &str) -> Value {
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return Value::Null;
    }

    if let Ok(n) = value.parse::<i64>() {
        return Value::Number(n.into());
    }

    if let Ok(n) = value.parse::<f64>() {
        if let Some(num) = Number::from_f64(n) {
            return Value::Number(num);
        }
    }

    match value.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(value.to_string()),
    }
}
