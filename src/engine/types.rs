//! Engine types
//!
//! Configuration and run reports for the stream pipeline.

use crate::error::Error;
use crate::schema::{SchemaConflict, StreamSchema};
use crate::types::ErrorStrategy;
use std::time::Duration;

/// Default bound on files processed at once across a run
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Default bound on records in flight between file tasks and the sink
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration for a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum number of files open at once, across all streams
    pub max_concurrency: usize,
    /// Maximum number of records buffered ahead of the sink
    pub channel_capacity: usize,
    /// What a stream does when one of its files fails
    pub error_strategy: ErrorStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            error_strategy: ErrorStrategy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the file concurrency bound
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Set the record channel capacity
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the error strategy
    #[must_use]
    pub fn with_error_strategy(mut self, strategy: ErrorStrategy) -> Self {
        self.error_strategy = strategy;
        self
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of one file
#[derive(Debug)]
pub struct FileReport {
    /// Remote path
    pub path: String,
    /// Records emitted from this file
    pub records: usize,
    /// Why the file failed, if it did
    ///
    /// Records emitted before the failure are not retracted.
    pub error: Option<Error>,
}

impl FileReport {
    /// Report for a file that was read to the end
    pub fn ok(path: impl Into<String>, records: usize) -> Self {
        Self {
            path: path.into(),
            records,
            error: None,
        }
    }

    /// Report for a failed file
    pub fn failed(path: impl Into<String>, records: usize, error: Error) -> Self {
        Self {
            path: path.into(),
            records,
            error: Some(error),
        }
    }

    /// Check if the file was read to the end
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one stream
#[derive(Debug)]
pub struct StreamReport {
    /// Stream name
    pub stream: String,
    /// Per-file outcomes, sorted by path
    pub files: Vec<FileReport>,
    /// Schema merged from every file that produced one
    pub schema: StreamSchema,
    /// Field type conflicts; a non-empty list makes the schema invalid
    pub schema_conflicts: Vec<SchemaConflict>,
    /// Stream-level failure: listing error or abort on a failed file
    pub error: Option<Error>,
}

impl StreamReport {
    /// Empty report for a stream
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            files: Vec::new(),
            schema: StreamSchema::new(),
            schema_conflicts: Vec::new(),
            error: None,
        }
    }

    /// Report for a stream that failed before reading any file
    pub fn failed(stream: impl Into<String>, error: Error) -> Self {
        Self {
            error: Some(error),
            ..Self::new(stream)
        }
    }

    /// Total records emitted
    pub fn records(&self) -> usize {
        self.files.iter().map(|f| f.records).sum()
    }

    /// Files that failed
    pub fn failed_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.is_ok())
    }

    /// Check if the merged schema is free of conflicts
    pub fn is_schema_valid(&self) -> bool {
        self.schema_conflicts.is_empty()
    }

    /// Check if the stream and all its files succeeded
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.files.iter().all(FileReport::is_ok)
    }
}

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every stream and file succeeded
    Completed,
    /// At least one file or stream failed, or the sink failed
    Failed,
    /// The run was cancelled before it finished
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of a whole run
#[derive(Debug)]
pub struct RunReport {
    /// One report per stream, in configuration order
    pub streams: Vec<StreamReport>,
    /// Whether the caller cancelled the run
    pub cancelled: bool,
    /// Sink failure that stopped the run
    pub sink_error: Option<Error>,
    /// Wall-clock duration
    pub duration: Duration,
}

impl RunReport {
    /// Final status
    pub fn status(&self) -> RunStatus {
        if self.cancelled {
            RunStatus::Cancelled
        } else if self.sink_error.is_some() || self.streams.iter().any(|s| !s.is_ok()) {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }

    /// Report of a stream by name
    pub fn stream(&self, name: &str) -> Option<&StreamReport> {
        self.streams.iter().find(|s| s.stream == name)
    }

    /// Total records emitted
    pub fn records(&self) -> usize {
        self.streams.iter().map(StreamReport::records).sum()
    }

    /// Number of failed files across all streams
    pub fn failed_files(&self) -> usize {
        self.streams.iter().map(|s| s.failed_files().count()).sum()
    }

    /// Number of streams with a stream-level failure
    pub fn failed_streams(&self) -> usize {
        self.streams.iter().filter(|s| s.error.is_some()).count()
    }

    /// Error summarising a run that did not complete
    pub fn error(&self) -> Option<Error> {
        match self.status() {
            RunStatus::Completed => None,
            RunStatus::Cancelled => Some(Error::Cancelled),
            RunStatus::Failed => match &self.sink_error {
                Some(e) => Some(Error::sink(e.to_string())),
                None => Some(Error::SyncFailed {
                    failed_files: self.failed_files(),
                    failed_streams: self.failed_streams(),
                }),
            },
        }
    }
}
