//! Decode module
//!
//! Turns a remote file's raw bytes into records:
//!
//! 1. [`compression`] unwraps gzip or zstd based on the outer suffix
//! 2. [`ParserRegistry`] picks a [`FormatParser`] from the inner suffix
//! 3. The parser opens the file, exposing any embedded or header schema,
//!    and yields records lazily
//!
//! # Supported formats
//!
//! - **JSONL** (`jsonl`, `ndjson`): one object per line, or concatenated
//!   values when `newlines_in_values` is set
//! - **CSV** (`csv`): header row or generated `column_N` names
//! - **Parquet** (`parquet`): embedded schema
//! - **Arrow IPC** (`arrow`, `arrows`, `feather`): embedded schema, file or
//!   stream encoding

mod columnar;
pub mod compression;
mod convert;
mod parsers;
mod registry;
mod types;

pub use columnar::{ArrowIpcParser, ParquetParser, DEFAULT_BATCH_SIZE};
pub use compression::{split_suffixes, Compression, DecodeWatch, DecodedStream};
pub use convert::{arrow_type_to_json_type, batch_to_records, schema_from_arrow};
pub use parsers::{parse_csv_value, CsvParser, JsonlParser};
pub use registry::ParserRegistry;
pub use types::{
    scan, ByteReader, CsvOptions, FormatOptions, FormatParser, JsonlOptions, OpenedFile,
    RecordIter,
};
