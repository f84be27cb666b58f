//! Protocol messages other than records

use crate::schema::StreamSchema;
use crate::types::{JsonValue, LogLevel};
use serde_json::json;

use super::types::{SOURCE_FILE_LAST_MODIFIED_FIELD, SOURCE_FILE_URL_FIELD};

/// `LOG` message
pub fn log_message(level: LogLevel, message: impl Into<String>) -> JsonValue {
    json!({
        "type": "LOG",
        "log": {
            "level": level,
            "message": message.into()
        }
    })
}

/// `CONNECTION_STATUS` message
pub fn connection_status(succeeded: bool, message: impl Into<String>) -> JsonValue {
    json!({
        "type": "CONNECTION_STATUS",
        "connectionStatus": {
            "status": if succeeded { "SUCCEEDED" } else { "FAILED" },
            "message": message.into()
        }
    })
}

/// JSON schema of a stream as emitted records carry it
///
/// Adds the source file fields to the inferred schema.
pub fn record_json_schema(schema: &StreamSchema) -> JsonValue {
    let mut doc = schema.to_json_schema();
    if let Some(properties) = doc
        .get_mut("properties")
        .and_then(JsonValue::as_object_mut)
    {
        properties.insert(
            SOURCE_FILE_URL_FIELD.to_string(),
            json!({ "type": "string" }),
        );
        properties.insert(
            SOURCE_FILE_LAST_MODIFIED_FIELD.to_string(),
            json!({ "type": ["string", "null"], "format": "date-time" }),
        );
    }
    doc
}

/// One stream entry of a `CATALOG` message
pub fn catalog_stream(name: &str, schema: &StreamSchema) -> JsonValue {
    json!({
        "name": name,
        "json_schema": record_json_schema(schema),
        "supported_sync_modes": ["full_refresh"],
        "source_defined_cursor": false
    })
}

/// `CATALOG` message
pub fn catalog_message(streams: Vec<JsonValue>) -> JsonValue {
    json!({
        "type": "CATALOG",
        "catalog": {
            "streams": streams
        }
    })
}
