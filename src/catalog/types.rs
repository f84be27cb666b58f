//! Catalog types

use crate::decode::{split_suffixes, Compression};
use crate::error::{Error, Result};
use crate::storage::ObjectEntry;
use chrono::{DateTime, Utc};
use glob::Pattern;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

// ============================================================================
// Remote File
// ============================================================================

/// A file in the remote store
///
/// Identity is the path alone: two values with the same path are equal and
/// hash the same regardless of their metadata.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    path: String,
    last_modified: Option<DateTime<Utc>>,
    compression: Compression,
    format: String,
}

impl RemoteFile {
    /// Create a remote file, resolving compression and format from its path
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let (compression, format) = split_suffixes(&path);
        Self {
            path,
            last_modified: None,
            compression,
            format,
        }
    }

    /// Set the last modification time
    #[must_use]
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Remote path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last modification time, metadata only
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    /// Compression named by the outer suffix
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Lowercased format suffix, after stripping any compression suffix
    pub fn format(&self) -> &str {
        &self.format
    }
}

impl From<ObjectEntry> for RemoteFile {
    fn from(entry: ObjectEntry) -> Self {
        let file = RemoteFile::new(entry.path);
        match entry.last_modified {
            Some(last_modified) => file.with_last_modified(last_modified),
            None => file,
        }
    }
}

impl PartialEq for RemoteFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for RemoteFile {}

impl Hash for RemoteFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for RemoteFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RemoteFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

impl std::fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

// ============================================================================
// Stream
// ============================================================================

/// A named output stream and the glob patterns selecting its files
///
/// Patterns use shell-glob syntax (`*`, `?`, `[...]`) and match the full
/// remote path. `*` also crosses `/`, so `*.csv` matches `data/a.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    name: String,
    globs: Vec<Pattern>,
}

impl Stream {
    /// Create a stream, compiling its glob patterns
    pub fn new<I, S>(name: impl Into<String>, globs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        let globs = globs
            .into_iter()
            .map(|glob| {
                let glob = glob.as_ref();
                Pattern::new(glob).map_err(|e| {
                    Error::invalid_value(
                        format!("streams.{name}"),
                        format!("invalid glob '{glob}': {e}"),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if globs.is_empty() {
            return Err(Error::invalid_value(
                format!("streams.{name}"),
                "at least one glob pattern is required",
            ));
        }

        Ok(Self { name, globs })
    }

    /// Stream name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Glob patterns as written
    pub fn globs(&self) -> impl Iterator<Item = &str> {
        self.globs.iter().map(Pattern::as_str)
    }

    /// Check if a path matches any of the stream's patterns
    pub fn matches(&self, path: &str) -> bool {
        self.globs.iter().any(|glob| glob.matches(path))
    }

    pub(crate) fn patterns(&self) -> &[Pattern] {
        &self.globs
    }
}
