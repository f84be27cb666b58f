//! Storage module
//!
//! Boundary to the remote file store: listing objects under a root and
//! opening them for sequential reads.
//!
//! # Supported stores
//!
//! - AWS S3 and Cloudflare R2 (`s3://`, `r2://`)
//! - Google Cloud Storage (`gs://`)
//! - Azure Blob Storage (`az://`)
//! - Local filesystem and in-memory stores

mod client;
mod types;

pub use client::ObjectStoreClient;
pub use types::{ByteStream, ObjectEntry, StorageClient};

#[cfg(test)]
mod tests;
