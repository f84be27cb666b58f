//! Self-describing columnar parsers
//!
//! Parquet and Arrow IPC carry an embedded Arrow schema, so opening a file
//! yields its full schema and inference never decodes a batch. Records are
//! decoded batch by batch.

use super::convert::{batch_to_records, schema_from_arrow};
use super::parsers::StopOnError;
use super::types::{ByteReader, FormatParser, OpenedFile, RecordIter};
use crate::error::{Error, Result};
use crate::types::Record;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::ipc::reader::{FileReader, StreamReader};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::io::{Cursor, Read};

/// Default number of rows per decoded batch
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Leading magic of the Arrow IPC file encoding
const ARROW_FILE_MAGIC: &[u8] = b"ARROW1";

type BatchIter = Box<dyn Iterator<Item = std::result::Result<RecordBatch, ArrowError>> + Send>;

/// Flattens record batches into records
struct BatchRecords {
    path: String,
    batches: BatchIter,
    pending: std::vec::IntoIter<Record>,
}

impl Iterator for BatchRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(Ok(record));
            }
            let batch = match self.batches.next()? {
                Ok(batch) => batch,
                Err(e) => return Some(Err(Error::record_parse(&self.path, e.to_string()))),
            };
            match batch_to_records(&batch) {
                Ok(records) => self.pending = records.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn batch_records(path: &str, batches: BatchIter) -> RecordIter {
    Box::new(StopOnError::new(BatchRecords {
        path: path.to_string(),
        batches,
        pending: Vec::new().into_iter(),
    }))
}

fn embedded(path: &str, schema: &SchemaRef, batches: BatchIter) -> OpenedFile {
    OpenedFile {
        schema: schema_from_arrow(schema),
        self_describing: true,
        records: batch_records(path, batches),
    }
}

fn read_all(reader: &mut ByteReader) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

// ============================================================================
// Parquet Parser
// ============================================================================

/// Parquet parser
///
/// The footer sits at the end of the file, so the whole (decompressed)
/// file is buffered before decoding.
#[derive(Debug, Clone)]
pub struct ParquetParser {
    batch_size: usize,
}

impl Default for ParquetParser {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ParquetParser {
    /// Create a new Parquet parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of rows per decoded batch
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn builder(
        &self,
        path: &str,
        mut reader: ByteReader,
    ) -> Result<ParquetRecordBatchReaderBuilder<Bytes>> {
        let bytes = Bytes::from(read_all(&mut reader)?);
        ParquetRecordBatchReaderBuilder::try_new(bytes)
            .map_err(|e| Error::record_parse(path, e.to_string()))
    }
}

impl FormatParser for ParquetParser {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn open(&self, path: &str, reader: ByteReader) -> Result<OpenedFile> {
        let builder = self.builder(path, reader)?;
        let schema = builder.schema().clone();
        let batches = builder
            .with_batch_size(self.batch_size)
            .build()
            .map_err(|e| Error::record_parse(path, e.to_string()))?;
        Ok(embedded(path, &schema, Box::new(batches)))
    }
}

// ============================================================================
// Arrow IPC Parser
// ============================================================================

/// Arrow IPC parser for both the file and the stream encoding
///
/// The file encoding is detected by its magic and buffered, since its
/// footer is read first. The stream encoding is decoded as it arrives.
#[derive(Debug, Clone, Default)]
pub struct ArrowIpcParser;

impl ArrowIpcParser {
    /// Create a new Arrow IPC parser
    pub fn new() -> Self {
        Self
    }

    fn batches(&self, path: &str, mut reader: ByteReader) -> Result<(SchemaRef, BatchIter)> {
        let ipc_error = |e: ArrowError| Error::record_parse(path, e.to_string());

        let mut head = Vec::with_capacity(ARROW_FILE_MAGIC.len());
        (&mut reader)
            .take(ARROW_FILE_MAGIC.len() as u64)
            .read_to_end(&mut head)?;

        if head == ARROW_FILE_MAGIC {
            reader.read_to_end(&mut head)?;
            let file = FileReader::try_new(Cursor::new(head), None).map_err(ipc_error)?;
            Ok((file.schema(), Box::new(file)))
        } else {
            let stream =
                StreamReader::try_new(Cursor::new(head).chain(reader), None).map_err(ipc_error)?;
            Ok((stream.schema(), Box::new(stream)))
        }
    }
}

impl FormatParser for ArrowIpcParser {
    fn name(&self) -> &'static str {
        "arrow"
    }

    fn open(&self, path: &str, reader: ByteReader) -> Result<OpenedFile> {
        let (schema, batches) = self.batches(path, reader)?;
        Ok(embedded(path, &schema, batches))
    }
}
