//! Tests for engine module

use super::*;
use crate::output::MemorySink;
use crate::schema::JsonType;
use crate::storage::{ObjectEntry, ObjectStoreClient, StorageClient};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncRead;

async fn memory_store(files: &[(&str, Vec<u8>)]) -> Arc<InMemory> {
    let store = Arc::new(InMemory::new());
    for (path, content) in files {
        store
            .put(
                &ObjectPath::from(*path),
                PutPayload::from(Bytes::from(content.clone())),
            )
            .await
            .unwrap();
    }
    store
}

async fn pipeline(files: &[(&str, Vec<u8>)]) -> StreamPipeline {
    let store = memory_store(files).await;
    let client = ObjectStoreClient::new(store);
    StreamPipeline::new(
        RemoteFileCatalog::new(Arc::new(client)),
        ParserRegistry::with_defaults(),
    )
}

fn jsonl(values: &[&str]) -> Vec<u8> {
    values.iter().map(|v| format!("{v}\n")).collect::<String>().into_bytes()
}

fn numbered(count: usize) -> Vec<u8> {
    (0..count)
        .map(|i| format!("{{\"n\":{i}}}\n"))
        .collect::<String>()
        .into_bytes()
}

fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

fn stream(name: &str, globs: &[&str]) -> Stream {
    Stream::new(name, globs.iter().copied()).unwrap()
}

// ============================================================================
// Config and Report Tests
// ============================================================================

#[test]
fn test_pipeline_config_defaults() {
    let config = PipelineConfig::default();
    assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
    assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    assert_eq!(config.error_strategy, ErrorStrategy::Skip);

    let config = PipelineConfig::new()
        .with_max_concurrency(0)
        .with_channel_capacity(0)
        .with_error_strategy(ErrorStrategy::Fail);
    assert_eq!(config.max_concurrency, 1);
    assert_eq!(config.channel_capacity, 1);
    assert_eq!(config.error_strategy, ErrorStrategy::Fail);
}

#[test]
fn test_run_report_status() {
    let mut stream = StreamReport::new("s");
    stream.files.push(FileReport::ok("a.csv", 3));
    let mut report = RunReport {
        streams: vec![stream],
        cancelled: false,
        sink_error: None,
        duration: std::time::Duration::ZERO,
    };
    assert_eq!(report.status(), RunStatus::Completed);
    assert!(report.error().is_none());

    report.streams[0]
        .files
        .push(FileReport::failed("b.csv", 1, Error::record_parse("b.csv", "bad")));
    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(report.records(), 4);
    assert!(matches!(
        report.error(),
        Some(Error::SyncFailed {
            failed_files: 1,
            failed_streams: 0
        })
    ));

    report.cancelled = true;
    assert_eq!(report.status(), RunStatus::Cancelled);
    assert!(matches!(report.error(), Some(Error::Cancelled)));
}

// ============================================================================
// Read Tests
// ============================================================================

#[tokio::test]
async fn test_read_emits_records_with_source_file() {
    let pipeline = pipeline(&[
        ("users/a.jsonl", jsonl(&[r#"{"id":1}"#, r#"{"id":2}"#])),
        ("users/b.csv", b"id,name\n3,carol\n".to_vec()),
        ("orders/x.jsonl", jsonl(&[r#"{"order":1}"#])),
    ])
    .await;

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(
            &[stream("users", &["users/*"])],
            &mut sink,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(report.records(), 3);
    assert_eq!(sink.len(), 3);

    let mut sources: Vec<&str> = sink.messages().iter().map(|m| m.file.path()).collect();
    sources.sort_unstable();
    assert_eq!(sources, vec!["users/a.jsonl", "users/a.jsonl", "users/b.csv"]);
    assert!(sink.messages().iter().all(|m| &*m.stream == "users"));

    let users = report.stream("users").unwrap();
    assert_eq!(users.files.len(), 2);
    assert_eq!(users.files[0].path, "users/a.jsonl");
    assert_eq!(users.files[0].records, 2);
}

#[tokio::test]
async fn test_read_gzip_jsonl() {
    let pipeline = pipeline(&[(
        "events.jsonl.gz",
        gzip(b"{\"event\":\"click\"}\n{\"event\":\"view\"}\n"),
    )])
    .await;

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(&[stream("events", &["*.gz"])], &mut sink, &CancellationToken::new())
        .await;

    assert_eq!(report.status(), RunStatus::Completed);
    let events: Vec<&str> = sink
        .messages()
        .iter()
        .filter_map(|m| m.data["event"].as_str())
        .collect();
    assert_eq!(events, vec!["click", "view"]);
}

/// A failing file neither stops nor loses records of its siblings
#[tokio::test]
async fn test_failed_file_is_isolated() {
    let pipeline = pipeline(&[
        ("a.jsonl", numbered(5)),
        ("b.jsonl", jsonl(&[r#"{"n":1}"#, "not json", r#"{"n":3}"#])),
        ("c.jsonl", numbered(7)),
    ])
    .await
    .with_config(PipelineConfig::new().with_max_concurrency(2));

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(&[stream("s", &["*.jsonl"])], &mut sink, &CancellationToken::new())
        .await;

    assert_eq!(report.status(), RunStatus::Failed);
    let files = &report.stream("s").unwrap().files;
    assert_eq!(files.len(), 3);
    assert!(files[0].is_ok());
    assert_eq!(files[0].records, 5);
    assert!(matches!(files[1].error, Some(Error::RecordParse { .. })));
    assert_eq!(files[1].records, 1);
    assert!(files[2].is_ok());
    assert_eq!(files[2].records, 7);

    // Records before the failure stay emitted
    assert_eq!(sink.len(), 13);
    assert_eq!(report.records(), 13);
    assert!(report.stream("s").unwrap().error.is_none());
}

#[tokio::test]
async fn test_bad_csv_does_not_abort_run() {
    let pipeline = pipeline(&[
        ("good.csv", b"id,name\n1,a\n2,b\n".to_vec()),
        ("bad.csv", b"id,name\n1,a,extra\n".to_vec()),
    ])
    .await;

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(&[stream("s", &["*.csv"])], &mut sink, &CancellationToken::new())
        .await;

    let s = report.stream("s").unwrap();
    assert_eq!(s.failed_files().count(), 1);
    assert!(matches!(
        s.files[0].error,
        Some(Error::RecordParse { ref path, .. }) if path == "bad.csv"
    ));
    assert_eq!(s.files[1].records, 2);
    assert_eq!(sink.len(), 2);
    assert!(s.error.is_none());
}

#[tokio::test]
async fn test_empty_file_set_is_not_an_error() {
    let pipeline = pipeline(&[("a.jsonl", numbered(2))]).await;

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(&[stream("s", &["*.csv"])], &mut sink, &CancellationToken::new())
        .await;

    assert_eq!(report.status(), RunStatus::Completed);
    let s = report.stream("s").unwrap();
    assert!(s.files.is_empty());
    assert!(s.schema.is_empty());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_corrupt_compressed_file_is_a_decode_failure() {
    let pipeline = pipeline(&[
        ("good.jsonl", numbered(2)),
        ("bad.jsonl.gz", b"definitely not gzip".to_vec()),
    ])
    .await;

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(&[stream("s", &["*"])], &mut sink, &CancellationToken::new())
        .await;

    let files = &report.stream("s").unwrap().files;
    assert!(matches!(files[0].error, Some(Error::Decode { ref path, .. }) if path == "bad.jsonl.gz"));
    assert!(files[1].is_ok());
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn test_unsupported_format_fails_only_that_file() {
    let pipeline = pipeline(&[
        ("data.xml", b"<a/>".to_vec()),
        ("data.jsonl", numbered(1)),
    ])
    .await;

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(&[stream("s", &["data.*"])], &mut sink, &CancellationToken::new())
        .await;

    let files = &report.stream("s").unwrap().files;
    assert!(files[0].is_ok());
    assert!(matches!(
        files[1].error,
        Some(Error::UnsupportedFormat { ref suffix, .. }) if suffix == "xml"
    ));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn test_fail_strategy_aborts_only_its_stream() {
    let pipeline = pipeline(&[
        ("bad/a.jsonl", jsonl(&["[1]"])),
        ("bad/b.jsonl", numbered(3)),
        ("bad/c.jsonl", numbered(3)),
        ("good/a.jsonl", numbered(4)),
    ])
    .await
    .with_config(
        PipelineConfig::new()
            .with_max_concurrency(1)
            .with_error_strategy(ErrorStrategy::Fail),
    );

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(
            &[stream("bad", &["bad/*"]), stream("good", &["good/*"])],
            &mut sink,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.status(), RunStatus::Failed);
    assert!(!report.cancelled);

    let bad = report.stream("bad").unwrap();
    assert!(matches!(
        bad.error,
        Some(Error::StreamAborted { ref path, .. }) if path == "bad/a.jsonl"
    ));
    assert!(matches!(bad.files[0].error, Some(Error::RecordParse { .. })));

    let good = report.stream("good").unwrap();
    assert!(good.is_ok());
    assert_eq!(good.records(), 4);
    assert_eq!(sink.stream_messages("good").count(), 4);
}

#[tokio::test]
async fn test_listing_failure_is_a_stream_error() {
    struct DeniedStorage;

    #[async_trait]
    impl StorageClient for DeniedStorage {
        async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectEntry>> {
            Err(Error::listing(prefix.unwrap_or_default(), "access denied"))
        }

        async fn open(&self, path: &str) -> Result<ByteStream> {
            Err(Error::storage(path, "access denied"))
        }

        fn location(&self) -> String {
            "denied://".to_string()
        }
    }

    let pipeline = StreamPipeline::new(
        RemoteFileCatalog::new(Arc::new(DeniedStorage)),
        ParserRegistry::with_defaults(),
    );

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(&[stream("s", &["*"])], &mut sink, &CancellationToken::new())
        .await;

    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(report.failed_streams(), 1);
    assert!(matches!(
        report.stream("s").unwrap().error,
        Some(Error::Listing { .. })
    ));
}

#[tokio::test]
async fn test_schema_conflict_keeps_emitting() {
    let pipeline = pipeline(&[
        ("a.jsonl", jsonl(&[r#"{"v":1}"#])),
        ("b.jsonl", jsonl(&[r#"{"v":"one"}"#])),
    ])
    .await;

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(&[stream("s", &["*.jsonl"])], &mut sink, &CancellationToken::new())
        .await;

    assert_eq!(sink.len(), 2);
    let s = report.stream("s").unwrap();
    assert!(!s.is_schema_valid());
    assert_eq!(s.schema_conflicts.len(), 1);
    assert_eq!(s.schema_conflicts[0].field, "v");
    assert_eq!(s.schema.get("v"), Some(JsonType::Integer));
    assert_eq!(report.status(), RunStatus::Completed);
}

// ============================================================================
// Sink Tests
// ============================================================================

struct RejectingSink;

#[async_trait]
impl RecordSink for RejectingSink {
    async fn emit(&mut self, _message: RecordMessage) -> Result<()> {
        Err(Error::sink("destination closed"))
    }
}

#[tokio::test]
async fn test_sink_failure_stops_run() {
    let pipeline = pipeline(&[("a.jsonl", numbered(50)), ("b.jsonl", numbered(50))])
        .await
        .with_config(PipelineConfig::new().with_channel_capacity(1));

    let report = pipeline
        .read(
            &[stream("s", &["*.jsonl"])],
            &mut RejectingSink,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.status(), RunStatus::Failed);
    assert!(!report.cancelled);
    assert!(matches!(report.sink_error, Some(Error::Sink { .. })));
    assert!(matches!(report.error(), Some(Error::Sink { .. })));
}

// ============================================================================
// Cancellation Tests
// ============================================================================

/// Sink that cancels the run after a number of records
struct CancellingSink {
    inner: MemorySink,
    after: usize,
    token: CancellationToken,
}

#[async_trait]
impl RecordSink for CancellingSink {
    async fn emit(&mut self, message: RecordMessage) -> Result<()> {
        self.inner.emit(message).await?;
        if self.inner.len() == self.after {
            self.token.cancel();
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_cancel_stops_emission_and_reports_cancelled_files() {
    let files: Vec<(String, Vec<u8>)> = (0..6)
        .map(|i| (format!("f{i}.jsonl"), numbered(200)))
        .collect();
    let files: Vec<(&str, Vec<u8>)> = files.iter().map(|(p, c)| (p.as_str(), c.clone())).collect();

    let pipeline = pipeline(&files).await.with_config(
        PipelineConfig::new()
            .with_max_concurrency(1)
            .with_channel_capacity(1),
    );

    let token = CancellationToken::new();
    let mut sink = CancellingSink {
        inner: MemorySink::new(),
        after: 10,
        token: token.clone(),
    };

    let report = pipeline
        .read(&[stream("s", &["*.jsonl"])], &mut sink, &token)
        .await;

    assert_eq!(report.status(), RunStatus::Cancelled);
    assert!(sink.inner.len() < 1200);

    // Every forwarded record is accounted to a file
    assert_eq!(report.records(), sink.inner.len());

    let files = &report.stream("s").unwrap().files;
    assert_eq!(files.len(), 6);
    assert!(files.iter().any(|f| matches!(f.error, Some(Error::Cancelled))));
    assert!(files
        .iter()
        .filter(|f| f.is_ok())
        .all(|f| f.records == 200));
}

#[tokio::test]
async fn test_cancel_before_start() {
    let pipeline = pipeline(&[("a.jsonl", numbered(3))]).await;
    let token = CancellationToken::new();
    token.cancel();

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(&[stream("s", &["*.jsonl"])], &mut sink, &token)
        .await;

    assert_eq!(report.status(), RunStatus::Cancelled);
    assert!(sink.is_empty());
    assert!(matches!(report.error(), Some(Error::Cancelled)));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

/// Storage that tracks how many opened files are alive at once
struct CountingStorage {
    inner: ObjectStoreClient,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

struct CountedStream {
    inner: ByteStream,
    open: Arc<AtomicUsize>,
}

impl AsyncRead for CountedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl Drop for CountedStream {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageClient for CountingStorage {
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectEntry>> {
        self.inner.list(prefix).await
    }

    async fn open(&self, path: &str) -> Result<ByteStream> {
        let inner = self.inner.open(path).await?;
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        // Hold the file long enough for others to overlap
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        Ok(Box::new(CountedStream {
            inner,
            open: Arc::clone(&self.open),
        }))
    }

    fn location(&self) -> String {
        self.inner.location()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_open_files_never_exceed_limit() {
    let files: Vec<(String, Vec<u8>)> = (0..12)
        .map(|i| (format!("{}/f{i}.jsonl", if i % 2 == 0 { "x" } else { "y" }), numbered(20)))
        .collect();
    let files: Vec<(&str, Vec<u8>)> = files.iter().map(|(p, c)| (p.as_str(), c.clone())).collect();

    let store = memory_store(&files).await;
    let peak = Arc::new(AtomicUsize::new(0));
    let storage = CountingStorage {
        inner: ObjectStoreClient::new(store),
        open: Arc::new(AtomicUsize::new(0)),
        peak: Arc::clone(&peak),
    };

    let pipeline = StreamPipeline::new(
        RemoteFileCatalog::new(Arc::new(storage)),
        ParserRegistry::with_defaults(),
    )
    .with_config(PipelineConfig::new().with_max_concurrency(3));

    let mut sink = MemorySink::new();
    let report = pipeline
        .read(
            &[stream("x", &["x/*"]), stream("y", &["y/*"])],
            &mut sink,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(sink.len(), 240);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak open files was {peak}");
}

// ============================================================================
// Discover Tests
// ============================================================================

#[tokio::test]
async fn test_discover_merges_file_schemas() {
    let pipeline = pipeline(&[
        ("a.jsonl", jsonl(&[r#"{"id":1,"name":"a"}"#])),
        ("b.jsonl", jsonl(&[r#"{"id":2.5,"active":true}"#])),
        ("c.csv", b"id,name\n1,x\n".to_vec()),
    ])
    .await;

    let reports = pipeline
        .discover(
            &[stream("json", &["*.jsonl"]), stream("csv", &["*.csv"])],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(reports.len(), 2);
    let json = &reports[0];
    assert_eq!(json.stream, "json");
    assert!(json.is_ok());
    assert_eq!(json.schema.get("id"), Some(JsonType::Number));
    assert_eq!(json.schema.get("name"), Some(JsonType::String));
    assert_eq!(json.schema.get("active"), Some(JsonType::Boolean));

    let csv = &reports[1];
    assert_eq!(csv.schema.get("id"), Some(JsonType::String));
    assert_eq!(csv.records(), 0);
}

#[tokio::test]
async fn test_discover_reports_conflicts_and_failures() {
    let pipeline = pipeline(&[
        ("a.jsonl", jsonl(&[r#"{"v":1}"#, r#"{"v":"x"}"#])),
        ("b.jsonl", jsonl(&["nope"])),
    ])
    .await;

    let reports = pipeline
        .discover(&[stream("s", &["*.jsonl"])], &CancellationToken::new())
        .await;

    let report = &reports[0];
    assert_eq!(report.schema_conflicts.len(), 1);
    assert_eq!(report.schema_conflicts[0].field, "v");
    assert!(report.files[0].is_ok());
    assert!(matches!(report.files[1].error, Some(Error::RecordParse { .. })));
}

#[tokio::test]
async fn test_discover_keeps_clean_fields_of_conflicting_file() {
    let pipeline = pipeline(&[(
        "a.jsonl",
        jsonl(&[r#"{"a":"x","b":1}"#, r#"{"a":true,"b":2}"#]),
    )])
    .await;
    let streams = [stream("s", &["*.jsonl"])];

    let discovered = pipeline.discover(&streams, &CancellationToken::new()).await;
    let mut sink = MemorySink::new();
    let report = pipeline.read(&streams, &mut sink, &CancellationToken::new()).await;

    let discovered = &discovered[0];
    let read = report.stream("s").unwrap();
    assert_eq!(discovered.schema.get("a"), Some(JsonType::String));
    assert_eq!(discovered.schema.get("b"), Some(JsonType::Integer));
    assert_eq!(discovered.schema, read.schema);
    assert_eq!(discovered.schema_conflicts, read.schema_conflicts);
    assert_eq!(discovered.schema_conflicts[0].field, "a");
}

// ============================================================================
// Schema Agreement Tests
// ============================================================================

#[tokio::test]
async fn test_read_and_discover_schemas_agree() {
    use arrow::array::{ArrayRef, FixedSizeListArray, Int64Array};
    use arrow::datatypes::Int32Type;
    use arrow::record_batch::RecordBatch;

    let ids: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None]));
    let ids = RecordBatch::try_from_iter([("id", ids)]).unwrap();
    let mut parquet = Vec::new();
    let mut writer =
        parquet::arrow::ArrowWriter::try_new(&mut parquet, ids.schema(), None).unwrap();
    writer.write(&ids).unwrap();
    writer.close().unwrap();

    let pair: ArrayRef = Arc::new(FixedSizeListArray::from_iter_primitive::<Int32Type, _, _>(
        vec![Some(vec![Some(1), Some(2)])],
        2,
    ));
    let pairs = RecordBatch::try_from_iter([("pair", pair)]).unwrap();
    let mut ipc = Vec::new();
    {
        let mut writer =
            arrow::ipc::writer::StreamWriter::try_new(&mut ipc, &pairs.schema()).unwrap();
        writer.write(&pairs).unwrap();
        writer.finish().unwrap();
    }

    let pipeline = pipeline(&[
        ("a.parquet", parquet),
        ("b.arrows", ipc),
        ("c.csv", b"city,name\n".to_vec()),
    ])
    .await;
    let streams = [stream("s", &["*"])];

    let discovered = pipeline.discover(&streams, &CancellationToken::new()).await;
    let mut sink = MemorySink::new();
    let report = pipeline.read(&streams, &mut sink, &CancellationToken::new()).await;

    let read = report.stream("s").unwrap();
    assert!(read.is_ok());
    assert!(read.is_schema_valid());
    assert_eq!(read.schema, discovered[0].schema);
    assert_eq!(read.schema.get("id"), Some(JsonType::Integer));
    assert_eq!(read.schema.get("pair"), Some(JsonType::Array));
    assert_eq!(read.schema.get("city"), Some(JsonType::String));

    let emitted: Vec<serde_json::Value> = sink
        .messages()
        .iter()
        .filter_map(|m| m.data.get("pair").cloned())
        .collect();
    assert_eq!(emitted, vec![serde_json::json!([1, 2])]);
}
