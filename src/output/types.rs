//! Output message types

use crate::catalog::RemoteFile;
use crate::types::{JsonValue, Record};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Record field holding the source file path
pub const SOURCE_FILE_URL_FIELD: &str = "_ab_source_file_url";

/// Record field holding the source file modification time
pub const SOURCE_FILE_LAST_MODIFIED_FIELD: &str = "_ab_source_file_last_modified";

/// A record tagged with its stream and source file
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMessage {
    /// Stream name
    pub stream: Arc<str>,
    /// File the record was parsed from
    pub file: Arc<RemoteFile>,
    /// Record payload
    pub data: Record,
    /// Emission time, epoch milliseconds
    pub emitted_at: i64,
}

impl RecordMessage {
    /// Create a record message stamped with the current time
    pub fn new(stream: Arc<str>, file: Arc<RemoteFile>, data: Record) -> Self {
        Self {
            stream,
            file,
            data,
            emitted_at: Utc::now().timestamp_millis(),
        }
    }

    /// Record payload with the source file fields added
    pub fn data_with_source(&self) -> Record {
        let mut data = self.data.clone();
        data.insert(
            SOURCE_FILE_URL_FIELD.to_string(),
            JsonValue::String(self.file.path().to_string()),
        );
        data.insert(
            SOURCE_FILE_LAST_MODIFIED_FIELD.to_string(),
            self.file
                .last_modified()
                .map_or(JsonValue::Null, |t| JsonValue::String(t.to_rfc3339())),
        );
        data
    }

    /// Render as a protocol `RECORD` message
    pub fn to_protocol(&self) -> JsonValue {
        json!({
            "type": "RECORD",
            "record": {
                "stream": &*self.stream,
                "data": self.data_with_source(),
                "emitted_at": self.emitted_at
            }
        })
    }
}
