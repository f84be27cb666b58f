//! Execution engine module
//!
//! Turns configured streams into records handed to a sink.
//!
//! # Overview
//!
//! The engine module provides:
//! - [`StreamPipeline`] - resolves each stream's files, decodes and parses
//!   them with bounded concurrency and forwards records to a sink
//! - [`PipelineConfig`] - concurrency, buffering and error strategy
//! - [`RunReport`] / [`StreamReport`] / [`FileReport`] - run outcome
//!
//! # Execution model
//!
//! Every file is one unit of work. Opening the remote object is async; the
//! decompress and parse chain is synchronous and runs on the blocking pool,
//! reading the remote bytes through [`SyncIoBridge`]. A semaphore shared by
//! all streams bounds the number of files open at once. Parsed records are
//! sent over a bounded channel to a single forwarder that owns the sink, so
//! a slow sink back-pressures every file task.
//!
//! A failing file never takes its siblings down. With
//! [`ErrorStrategy::Fail`] the first failure cancels the rest of that
//! stream only.

mod types;

pub use types::{
    FileReport, PipelineConfig, RunReport, RunStatus, StreamReport, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_MAX_CONCURRENCY,
};

use crate::catalog::{RemoteFile, RemoteFileCatalog, Stream};
use crate::decode::{compression, FormatParser, ParserRegistry};
use crate::error::{Error, Result};
use crate::output::{RecordMessage, RecordSink};
use crate::schema::{InferredSchema, SchemaInferrer};
use crate::storage::ByteStream;
use crate::types::ErrorStrategy;
use futures::{future, StreamExt};
use std::future::Future;
use std::io::Read;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, warn};

/// Reads configured streams into a sink
#[derive(Debug, Clone)]
pub struct StreamPipeline {
    catalog: RemoteFileCatalog,
    registry: Arc<ParserRegistry>,
    config: PipelineConfig,
    permits: Arc<Semaphore>,
}

/// Work done on one file once its bytes are open
#[derive(Clone)]
enum FileTask {
    /// Parse records and send them downstream
    Read {
        stream: Arc<str>,
        tx: mpsc::Sender<RecordMessage>,
    },
    /// Infer the file schema only
    Infer,
}

/// Result of one file task
struct FileOutcome {
    report: FileReport,
    inferred: InferredSchema,
}

impl FileOutcome {
    fn failed(path: &str, error: Error) -> Self {
        Self {
            report: FileReport::failed(path, 0, error),
            inferred: InferredSchema::default(),
        }
    }
}

impl StreamPipeline {
    /// Create a new pipeline with default configuration
    pub fn new(catalog: RemoteFileCatalog, registry: ParserRegistry) -> Self {
        let config = PipelineConfig::default();
        Self {
            catalog,
            registry: Arc::new(registry),
            permits: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
        }
    }

    /// Set pipeline configuration
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        self.config = config;
        self
    }

    /// Get the file catalog
    pub fn catalog(&self) -> &RemoteFileCatalog {
        &self.catalog
    }

    /// Get the parser registry
    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Read every stream into the sink
    ///
    /// Streams run concurrently. The sink is flushed once all file tasks
    /// are done. Cancelling `cancel` stops new files from starting and
    /// interrupts in-flight ones; records already buffered are still
    /// forwarded, and every file that did not finish is reported with
    /// [`Error::Cancelled`].
    pub async fn read(
        &self,
        streams: &[Stream],
        sink: &mut dyn RecordSink,
        cancel: &CancellationToken,
    ) -> RunReport {
        let started = Instant::now();
        let run = cancel.child_token();
        let (tx, mut rx) = mpsc::channel::<RecordMessage>(self.config.channel_capacity.max(1));

        info!(
            streams = streams.len(),
            max_concurrency = self.config.max_concurrency,
            "Starting read"
        );

        let producer = async {
            let reports = future::join_all(streams.iter().map(|stream| {
                let task = FileTask::Read {
                    stream: Arc::from(stream.name()),
                    tx: tx.clone(),
                };
                self.run_stream(stream, task, &run)
            }))
            .await;
            drop(tx);
            reports
        };

        let forwarder = async {
            let mut sink_error = None;
            while let Some(message) = rx.recv().await {
                if sink_error.is_some() {
                    continue;
                }
                if let Err(e) = sink.emit(message).await {
                    warn!(error = %e, "Sink failed, stopping run");
                    sink_error = Some(e);
                    run.cancel();
                }
            }
            if sink_error.is_none() {
                if let Err(e) = sink.flush().await {
                    sink_error = Some(e);
                }
            }
            sink_error
        };

        let (streams, sink_error) = tokio::join!(producer, forwarder);

        let report = RunReport {
            streams,
            cancelled: cancel.is_cancelled(),
            sink_error,
            duration: started.elapsed(),
        };

        info!(
            status = %report.status(),
            records = report.records(),
            failed_files = report.failed_files(),
            duration_ms = report.duration.as_millis() as u64,
            "Read finished"
        );

        report
    }

    /// Read a single stream into the sink
    pub async fn read_stream(
        &self,
        stream: &Stream,
        sink: &mut dyn RecordSink,
        cancel: &CancellationToken,
    ) -> StreamReport {
        let mut report = self.read(std::slice::from_ref(stream), sink, cancel).await;
        report
            .streams
            .pop()
            .unwrap_or_else(|| StreamReport::new(stream.name()))
    }

    // ========================================================================
    // Discover
    // ========================================================================

    /// Infer the schema of every stream without emitting records
    ///
    /// Each file is inferred on its own and the results are merged per
    /// stream. Files that fail are reported and left out of the schema.
    pub async fn discover(&self, streams: &[Stream], cancel: &CancellationToken) -> Vec<StreamReport> {
        let run = cancel.child_token();
        future::join_all(
            streams
                .iter()
                .map(|stream| self.run_stream(stream, FileTask::Infer, &run)),
        )
        .await
    }

    // ========================================================================
    // Stream
    // ========================================================================

    async fn run_stream(
        &self,
        stream: &Stream,
        task: FileTask,
        run: &CancellationToken,
    ) -> StreamReport {
        let name = stream.name();

        let files = tokio::select! {
            biased;
            _ = run.cancelled() => return StreamReport::failed(name, Error::Cancelled),
            files = self.catalog.resolve(stream) => files,
        };
        let files = match files {
            Ok(files) => files,
            Err(e) => {
                warn!(stream = name, error = %e, "Failed to resolve stream files");
                return StreamReport::failed(name, e);
            }
        };

        info!(stream = name, files = files.len(), "Reading stream");

        let token = run.child_token();
        let fail_fast = self.config.error_strategy == ErrorStrategy::Fail;

        let outcomes: Vec<FileOutcome> = futures::stream::iter(files)
            .map(|file| {
                let task = task.clone();
                let token = token.clone();
                async move {
                    let outcome = self.process_file(file, task, &token).await;
                    if fail_fast
                        && outcome
                            .report
                            .error
                            .as_ref()
                            .is_some_and(|e| !e.is_cancelled())
                    {
                        token.cancel();
                    }
                    outcome
                }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;
        drop(task);

        let mut report = StreamReport::new(name);

        if fail_fast {
            // First failure in completion order is the one that aborted
            report.error = outcomes
                .iter()
                .find(|o| o.report.error.as_ref().is_some_and(|e| !e.is_cancelled()))
                .map(|o| Error::StreamAborted {
                    stream: name.to_string(),
                    path: o.report.path.clone(),
                });
        }

        let mut outcomes = outcomes;
        outcomes.sort_by(|a, b| a.report.path.cmp(&b.report.path));

        let mut merger = SchemaInferrer::new();
        for outcome in outcomes {
            merger.merge(&outcome.inferred.schema);
            merger.extend_conflicts(outcome.inferred.conflicts);
            report.files.push(outcome.report);
        }
        let merged = merger.finish();
        report.schema = merged.schema;
        report.schema_conflicts = merged.conflicts;

        for conflict in &report.schema_conflicts {
            warn!(stream = name, %conflict, "Schema conflict");
        }

        info!(
            stream = name,
            records = report.records(),
            failed_files = report.failed_files().count(),
            "Stream finished"
        );

        report
    }

    // ========================================================================
    // File
    // ========================================================================

    async fn process_file(
        &self,
        file: RemoteFile,
        task: FileTask,
        token: &CancellationToken,
    ) -> FileOutcome {
        let path = file.path().to_string();

        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => return FileOutcome::failed(&path, Error::Cancelled),
            permit = Arc::clone(&self.permits).acquire_owned() => permit,
        };
        let permit = match permit {
            Ok(permit) => permit,
            Err(_) => return FileOutcome::failed(&path, Error::Cancelled),
        };

        let parser = match self.registry.get(&path, file.format()) {
            Ok(parser) => parser,
            Err(e) => return self.file_failed(FileOutcome::failed(&path, e)),
        };

        let raw = tokio::select! {
            biased;
            _ = token.cancelled() => return FileOutcome::failed(&path, Error::Cancelled),
            raw = self.catalog.client().open(&path) => raw,
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => return self.file_failed(FileOutcome::failed(&path, e)),
        };

        debug!(
            path = %path,
            format = parser.name(),
            compression = file.compression().name(),
            "Opened file"
        );

        let bridge = SyncIoBridge::new(Interruptible::new(raw, token));
        let token = token.clone();
        let file = Arc::new(file);

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            match task {
                FileTask::Read { stream, tx } => {
                    read_records(stream, file, parser.as_ref(), bridge, &tx, &token)
                }
                FileTask::Infer => infer_file(&file, parser.as_ref(), bridge, &token),
            }
        });

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => FileOutcome::failed(&path, Error::Other(format!("File task failed: {e}"))),
        };

        if outcome.report.is_ok() {
            debug!(path = %path, records = outcome.report.records, "File done");
            outcome
        } else {
            self.file_failed(outcome)
        }
    }

    fn file_failed(&self, outcome: FileOutcome) -> FileOutcome {
        if let Some(error) = &outcome.report.error {
            if error.is_cancelled() {
                debug!(path = %outcome.report.path, "File cancelled");
            } else {
                warn!(
                    path = %outcome.report.path,
                    records = outcome.report.records,
                    error = %error,
                    "File failed"
                );
            }
        }
        outcome
    }
}

// ============================================================================
// Blocking file work
// ============================================================================

/// Parse one file and send its records downstream
fn read_records<R: Read + Send + 'static>(
    stream: Arc<str>,
    file: Arc<RemoteFile>,
    parser: &dyn FormatParser,
    raw: R,
    tx: &mpsc::Sender<RecordMessage>,
    token: &CancellationToken,
) -> FileOutcome {
    let mut inferrer = SchemaInferrer::new();
    let mut records = 0;

    let result = send_records(&stream, &file, parser, raw, tx, token, &mut inferrer, &mut records);
    let path = file.path();

    let report = match result {
        Ok(()) => FileReport::ok(path, records),
        Err(e) => FileReport::failed(path, records, settle(e, token)),
    };

    FileOutcome {
        report,
        inferred: inferrer.finish(),
    }
}

#[allow(clippy::too_many_arguments)]
fn send_records<R: Read + Send + 'static>(
    stream: &Arc<str>,
    file: &Arc<RemoteFile>,
    parser: &dyn FormatParser,
    raw: R,
    tx: &mpsc::Sender<RecordMessage>,
    token: &CancellationToken,
    inferrer: &mut SchemaInferrer,
    records: &mut usize,
) -> Result<()> {
    let path = file.path();
    let decoded = compression::decompress(path, file.compression(), raw)?;
    let watch = decoded.watch.clone();

    let opened = parser
        .open(path, decoded.reader)
        .map_err(|e| watch.classify(path, e))?;

    // Embedded schemas are taken as declared; other files widen by value
    *inferrer = opened.inferrer();
    let scan_values = !opened.self_describing;

    for record in opened.records {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let record = record.map_err(|e| watch.classify(path, e))?;
        if scan_values {
            inferrer.observe(&record);
        }

        let message = RecordMessage::new(Arc::clone(stream), Arc::clone(file), record);
        if tx.blocking_send(message).is_err() {
            // Forwarder is gone; nothing downstream will see this record
            return Err(Error::Cancelled);
        }
        *records += 1;
    }

    Ok(())
}

/// Infer the schema of one file
fn infer_file<R: Read + Send + 'static>(
    file: &RemoteFile,
    parser: &dyn FormatParser,
    raw: R,
    token: &CancellationToken,
) -> FileOutcome {
    let path = file.path();

    let result = compression::decompress(path, file.compression(), raw).and_then(|decoded| {
        let watch = decoded.watch.clone();
        parser
            .infer(path, decoded.reader)
            .map_err(|e| watch.classify(path, e))
    });

    match result {
        // Conflicts inside one file are schema findings, not read failures
        Ok(inferred) => FileOutcome {
            report: FileReport::ok(path, 0),
            inferred,
        },
        Err(e) => FileOutcome::failed(path, settle(e, token)),
    }
}

/// Report a transport failure caused by cancellation as a cancellation
fn settle(error: Error, token: &CancellationToken) -> Error {
    match error {
        Error::Storage { .. } | Error::Io(_) if token.is_cancelled() => Error::Cancelled,
        other => other,
    }
}

// ============================================================================
// Cancellation-aware reader
// ============================================================================

/// Byte stream that fails pending and future reads once cancelled
///
/// Lets a blocked remote read inside a file task return as soon as the run
/// is cancelled instead of waiting for the transport.
struct Interruptible {
    inner: ByteStream,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl Interruptible {
    fn new(inner: ByteStream, token: &CancellationToken) -> Self {
        Self {
            inner,
            cancelled: Box::pin(token.clone().cancelled_owned()),
        }
    }
}

impl AsyncRead for Interruptible {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        if this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "read cancelled",
            )));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests;
