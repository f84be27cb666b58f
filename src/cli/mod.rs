//! CLI module
//!
//! Command-line interface for running a file-based source.
//!
//! # Commands
//!
//! - `check` - Test access to the storage root
//! - `discover` - Infer stream schemas and emit the catalog
//! - `read` - Emit records from streams
//! - `files` - Show the files each stream resolves to
//! - `validate` - Validate the configuration

mod commands;
mod runner;
mod signal;

pub use commands::{parse_stream_filter, Cli, Commands, OutputFormat};
pub use runner::Runner;
pub use signal::{cancel_on_signal, shutdown_signal};
