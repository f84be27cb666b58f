//! Error types for filestream CDK
//!
//! This module defines the error hierarchy for the entire CDK.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Errors fall in three scopes: file-level errors are isolated by the
//! pipeline and reported per file, stream-level errors abort a single
//! stream, and everything else is fatal to the caller.

use crate::schema::JsonType;
use thiserror::Error;

/// The main error type for filestream CDK
///
/// Variants are described by their display messages.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Storage Errors
    // ============================================================================
    #[error("Failed to list files under '{prefix}': {message}")]
    Listing { prefix: String, message: String },

    #[error("Failed to open '{path}': {message}")]
    Storage { path: String, message: String },

    // ============================================================================
    // File Errors
    // ============================================================================
    #[error("Unsupported file format '{suffix}' for '{path}'")]
    UnsupportedFormat { path: String, suffix: String },

    #[error("Failed to decompress '{path}': {message}")]
    Decode { path: String, message: String },

    #[error("Failed to parse record in '{path}'{}: {message}", field_suffix(.field))]
    RecordParse {
        path: String,
        field: Option<String>,
        message: String,
    },

    // ============================================================================
    // Schema Errors
    // ============================================================================
    #[error("Schema conflict for field '{field}': observed both {existing} and {observed}")]
    SchemaConflict {
        field: String,
        existing: JsonType,
        observed: JsonType,
    },

    // ============================================================================
    // Run Errors
    // ============================================================================
    #[error("Stream '{stream}' aborted after file '{path}' failed")]
    StreamAborted { stream: String, path: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Output error: {message}")]
    Sink { message: String },

    #[error("Sync finished with errors: {failed_files} failed file(s), {failed_streams} failed stream(s)")]
    SyncFailed {
        failed_files: usize,
        failed_streams: usize,
    },

    // ============================================================================
    // Arrow/Parquet Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a listing error
    pub fn listing(prefix: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Listing {
            prefix: prefix.into(),
            message: message.into(),
        }
    }

    /// Create a storage (open/read) error
    pub fn storage(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported format error
    pub fn unsupported_format(path: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            path: path.into(),
            suffix: suffix.into(),
        }
    }

    /// Create a decode error
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a record parse error without field information
    pub fn record_parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordParse {
            path: path.into(),
            field: None,
            message: message.into(),
        }
    }

    /// Create a record parse error pointing at a field
    pub fn field_parse(
        path: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RecordParse {
            path: path.into(),
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Create a schema conflict error
    pub fn schema_conflict(field: impl Into<String>, existing: JsonType, observed: JsonType) -> Self {
        Self::SchemaConflict {
            field: field.into(),
            existing,
            observed,
        }
    }

    /// Create a sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Check if this error is confined to the file that produced it
    ///
    /// File-level errors are recorded in the run report and the stream
    /// moves on to its remaining files.
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            Error::Storage { .. }
                | Error::UnsupportedFormat { .. }
                | Error::Decode { .. }
                | Error::RecordParse { .. }
                | Error::Io(_)
                | Error::Arrow(_)
                | Error::Parquet(_)
        )
    }

    /// Check if this error comes from run cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Render the optional field part of a record parse error
fn field_suffix(field: &Option<String>) -> String {
    field
        .as_ref()
        .map(|f| format!(" (field '{f}')"))
        .unwrap_or_default()
}

/// Result type alias for filestream CDK
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
