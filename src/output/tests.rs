//! Tests for output module

use super::*;
use crate::catalog::RemoteFile;
use crate::schema::{JsonType, StreamSchema};
use crate::types::{LogLevel, Record};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn message(stream: &str, path: &str, data: Value) -> RecordMessage {
    let file = RemoteFile::new(path)
        .with_last_modified(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap());
    RecordMessage::new(Arc::from(stream), Arc::new(file), record(data))
}

// ============================================================================
// Record Message Tests
// ============================================================================

#[test]
fn test_record_message_protocol() {
    let msg = message("users", "raw/users.csv", json!({"id": 1}));
    let protocol = msg.to_protocol();

    assert_eq!(protocol["type"], "RECORD");
    assert_eq!(protocol["record"]["stream"], "users");
    assert_eq!(protocol["record"]["data"]["id"], 1);
    assert_eq!(
        protocol["record"]["data"][SOURCE_FILE_URL_FIELD],
        "raw/users.csv"
    );
    assert_eq!(
        protocol["record"]["data"][SOURCE_FILE_LAST_MODIFIED_FIELD],
        "2024-05-01T08:30:00+00:00"
    );
    assert_eq!(protocol["record"]["emitted_at"], msg.emitted_at);
}

#[test]
fn test_record_message_without_last_modified() {
    let msg = RecordMessage::new(
        Arc::from("s"),
        Arc::new(RemoteFile::new("a.jsonl")),
        record(json!({"a": true})),
    );
    let data = msg.data_with_source();
    assert_eq!(data[SOURCE_FILE_LAST_MODIFIED_FIELD], Value::Null);
    // The payload itself is left untouched
    assert!(!msg.data.contains_key(SOURCE_FILE_URL_FIELD));
}

#[test]
fn test_emitted_at_is_milliseconds() {
    let before = Utc::now().timestamp_millis();
    let msg = message("s", "a.csv", json!({}));
    let after = Utc::now().timestamp_millis();
    assert!(msg.emitted_at >= before && msg.emitted_at <= after);
}

// ============================================================================
// Sink Tests
// ============================================================================

#[tokio::test]
async fn test_json_lines_sink_writes_one_line_per_record() {
    let mut sink = JsonLinesSink::new(Vec::new());
    sink.emit(message("a", "x.csv", json!({"id": 1}))).await.unwrap();
    sink.emit(message("b", "y.csv", json!({"id": 2}))).await.unwrap();
    sink.flush().await.unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["record"]["stream"], "a");
    assert_eq!(lines[1]["record"]["data"]["id"], 2);
}

#[tokio::test]
async fn test_memory_sink() {
    let mut sink = MemorySink::new();
    assert!(sink.is_empty());

    sink.emit(message("a", "x.csv", json!({"id": 1}))).await.unwrap();
    sink.emit(message("b", "y.csv", json!({"id": 2}))).await.unwrap();
    sink.emit(message("a", "z.csv", json!({"id": 3}))).await.unwrap();
    sink.flush().await.unwrap();

    assert_eq!(sink.len(), 3);
    assert_eq!(sink.stream_messages("a").count(), 2);
    assert_eq!(sink.into_messages()[1].data["id"], 2);
}

// ============================================================================
// Protocol Message Tests
// ============================================================================

#[test]
fn test_log_message() {
    let msg = protocol::log_message(LogLevel::Warn, "careful");
    assert_eq!(msg["type"], "LOG");
    assert_eq!(msg["log"]["level"], "WARN");
    assert_eq!(msg["log"]["message"], "careful");
}

#[test]
fn test_connection_status() {
    let msg = protocol::connection_status(false, "access denied");
    assert_eq!(msg["connectionStatus"]["status"], "FAILED");
}

#[test]
fn test_catalog_adds_source_file_fields() {
    let schema = StreamSchema::from_fields([("id", JsonType::Integer)]);
    let msg = protocol::catalog_message(vec![protocol::catalog_stream("users", &schema)]);

    let stream = &msg["catalog"]["streams"][0];
    assert_eq!(stream["name"], "users");
    let properties = &stream["json_schema"]["properties"];
    assert_eq!(properties["id"]["type"], json!(["integer", "null"]));
    assert_eq!(properties[SOURCE_FILE_URL_FIELD]["type"], "string");
    assert_eq!(
        properties[SOURCE_FILE_LAST_MODIFIED_FIELD]["format"],
        "date-time"
    );
}
