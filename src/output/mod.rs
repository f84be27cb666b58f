//! Output module
//!
//! Hands records to a downstream consumer.
//!
//! # Overview
//!
//! This module provides:
//! - [`RecordMessage`] - a record tagged with stream, source file and
//!   emission time
//! - [`RecordSink`] - the async destination the pipeline forwards to
//! - [`StdoutSink`] / [`JsonLinesSink`] - protocol `RECORD` lines
//! - [`MemorySink`] - in-memory collection
//! - [`protocol`] - `LOG`, `CATALOG` and `CONNECTION_STATUS` messages

pub mod protocol;
mod sink;
mod types;

pub use sink::{JsonLinesSink, MemorySink, RecordSink, StdoutSink};
pub use types::{RecordMessage, SOURCE_FILE_LAST_MODIFIED_FIELD, SOURCE_FILE_URL_FIELD};

#[cfg(test)]
mod tests;
