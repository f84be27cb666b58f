// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Filestream Connector Development Kit (CDK)
//!
//! Reads structured records out of files in a remote object store.
//!
//! ## Features
//!
//! - **Glob-selected streams**: each stream is the union of files matching
//!   any of its glob patterns, every file exactly once
//! - **Transparent decompression**: `.gz` and `.zst` files are decoded on the
//!   fly before the inner format is parsed
//! - **Format registry**: JSONL, CSV, Parquet and Arrow IPC out of the box
//! - **Schema inference**: per-file schemas merged into one stream schema,
//!   with conflicts reported instead of coerced
//! - **Isolated, bounded reads**: a failing file never takes its siblings
//!   down; concurrency and buffering are bounded; runs are cancellable
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filestream_cdk::config::SourceConfig;
//! use filestream_cdk::output::MemorySink;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> filestream_cdk::Result<()> {
//!     let config = SourceConfig::load("source.yaml")?;
//!     let pipeline = config.pipeline()?;
//!
//!     let mut sink = MemorySink::new();
//!     let report = pipeline
//!         .read(&config.streams()?, &mut sink, &CancellationToken::new())
//!         .await;
//!
//!     println!("{} records, status {}", report.records(), report.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        StreamPipeline                           │
//! │  resolve files → open → decompress → parse → infer → emit       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Storage  │  Catalog  │    Decode     │  Schema   │   Output    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ S3 / R2  │ Globs     │ gzip / zstd   │ Inference │ RecordSink  │
//! │ GCS      │ Dedup     │ JSONL / CSV   │ Merge     │ Stdout      │
//! │ Azure    │ Listing   │ Parquet       │ Conflicts │ Memory      │
//! │ Local    │           │ Arrow IPC     │           │             │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the CDK
pub mod error;

/// Common types and type aliases
pub mod types;

/// Source configuration loading and validation
pub mod config;

/// Remote storage access
pub mod storage;

/// Remote files and glob-selected streams
pub mod catalog;

/// Decompression and format parsers
pub mod decode;

/// Schema inference and merging
pub mod schema;

/// Record sinks and protocol messages
pub mod output;

/// Stream pipeline
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use catalog::{RemoteFile, RemoteFileCatalog, Stream};
pub use config::SourceConfig;
pub use engine::{PipelineConfig, RunReport, RunStatus, StreamPipeline};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
