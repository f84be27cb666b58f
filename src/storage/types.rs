//! Storage types and traits

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

/// Sequential byte stream of one remote object
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// One entry of a remote listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Path relative to the storage root
    pub path: String,
    /// Last modification time, when the store reports one
    pub last_modified: Option<DateTime<Utc>>,
    /// Object size in bytes
    pub size: u64,
}

impl ObjectEntry {
    /// Create an entry with no metadata
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
            size: 0,
        }
    }

    /// Set the last modification time
    #[must_use]
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }
}

/// Remote file store the catalog lists and the pipeline reads from
///
/// Authentication, sessions and retries belong to the implementation.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// List every object under `prefix` (or the whole root)
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectEntry>>;

    /// Open an object for a sequential read
    async fn open(&self, path: &str) -> Result<ByteStream>;

    /// Human-readable location of the storage root, for logs
    fn location(&self) -> String;
}
