//! Remote file catalog
//!
//! Every resolve lists the store again. Nothing is cached, so files added
//! or removed during a run are seen by the next resolve.

use super::types::{RemoteFile, Stream};
use crate::error::{Error, Result};
use crate::storage::StorageClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Lists remote files and resolves the file set of each stream
#[derive(Clone)]
pub struct RemoteFileCatalog {
    client: Arc<dyn StorageClient>,
    prefix: Option<String>,
}

impl std::fmt::Debug for RemoteFileCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFileCatalog")
            .field("location", &self.client.location())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl RemoteFileCatalog {
    /// Create a catalog over a storage client
    pub fn new(client: Arc<dyn StorageClient>) -> Self {
        Self {
            client,
            prefix: None,
        }
    }

    /// Only list files under `prefix`
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Storage client the catalog lists from
    pub fn client(&self) -> &Arc<dyn StorageClient> {
        &self.client
    }

    /// List every file visible under the configured root, once per path
    ///
    /// Any storage failure is returned as a listing error. It is never
    /// turned into an empty listing.
    pub async fn list(&self) -> Result<Vec<RemoteFile>> {
        let prefix = self.prefix.as_deref();
        let entries = self.client.list(prefix).await.map_err(|e| match e {
            Error::Listing { .. } => e,
            other => Error::listing(prefix.unwrap_or_default(), other.to_string()),
        })?;

        let mut files: BTreeMap<String, RemoteFile> = BTreeMap::new();
        for entry in entries {
            files
                .entry(entry.path.clone())
                .or_insert_with(|| RemoteFile::from(entry));
        }

        debug!(
            location = %self.client.location(),
            files = files.len(),
            "Listed remote files"
        );

        Ok(files.into_values().collect())
    }

    /// Resolve the files of a stream: the union of its glob matches
    pub async fn resolve(&self, stream: &Stream) -> Result<Vec<RemoteFile>> {
        let listing = self.list().await?;
        let files = match_files(&listing, stream);

        info!(
            stream = stream.name(),
            listed = listing.len(),
            matched = files.len(),
            "Resolved stream files"
        );

        Ok(files)
    }
}

/// Match a listing snapshot against a stream's patterns
///
/// Each pattern filters the listing on its own and the results are united
/// by path, so a file matched by several patterns appears once. The result
/// is sorted by path.
pub fn match_files(listing: &[RemoteFile], stream: &Stream) -> Vec<RemoteFile> {
    let mut union: BTreeMap<&str, &RemoteFile> = BTreeMap::new();

    for pattern in stream.patterns() {
        for file in listing.iter().filter(|file| pattern.matches(file.path())) {
            union.entry(file.path()).or_insert(file);
        }
    }

    union.into_values().cloned().collect()
}
