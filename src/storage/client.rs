//! Object store client (S3, R2, GCS, Azure, local, memory)

use super::types::{ByteStream, ObjectEntry, StorageClient};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;
use tokio_util::io::StreamReader;
use tracing::debug;

/// Storage client backed by an [`ObjectStore`]
#[derive(Debug, Clone)]
pub struct ObjectStoreClient {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Prefix within the bucket/container that listings start from
    prefix: Option<String>,
    /// Original URL scheme for logging
    scheme: String,
    /// Bucket, container or directory name for logging
    root: String,
}

impl ObjectStoreClient {
    /// Wrap an existing object store
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            prefix: None,
            scheme: "memory".to_string(),
            root: String::new(),
        }
    }

    /// Restrict listings to a prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/');
        self.prefix = if prefix.is_empty() {
            None
        } else {
            Some(prefix.to_string())
        };
        self
    }

    /// Parse a source URL and create the matching object store
    ///
    /// Supported formats:
    /// - `s3://bucket/prefix/` - AWS S3
    /// - `r2://bucket/prefix/` - Cloudflare R2 (S3-compatible)
    /// - `gs://bucket/prefix/` - Google Cloud Storage
    /// - `az://container/prefix/` - Azure Blob Storage
    /// - `memory://` - empty in-memory store
    /// - `/local/path/`, `./path/` or `file:///path` - Local filesystem
    ///
    /// Credentials are read from the environment by the store builders.
    pub fn parse(url: &str) -> Result<Self> {
        if url.starts_with("s3://") {
            Self::parse_s3(url, false)
        } else if url.starts_with("r2://") {
            Self::parse_s3(url, true)
        } else if url.starts_with("gs://") {
            Self::parse_gcs(url)
        } else if url.starts_with("az://") {
            Self::parse_azure(url)
        } else if url.starts_with("memory://") {
            Ok(Self::new(Arc::new(InMemory::new())))
        } else {
            Self::parse_local(url)
        }
    }

    /// Parse S3 or R2 URL
    fn parse_s3(url: &str, is_r2: bool) -> Result<Self> {
        let scheme = if is_r2 { "r2" } else { "s3" };
        let (bucket, prefix) = split_bucket(url, scheme)?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        // AWS_ENDPOINT is read by from_env(); R2 also honors its own variable
        if is_r2 {
            if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                builder = builder.with_endpoint(endpoint);
            }
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: None,
            scheme: scheme.to_string(),
            root: bucket.to_string(),
        }
        .with_prefix(prefix))
    }

    /// Parse GCS URL
    fn parse_gcs(url: &str) -> Result<Self> {
        let (bucket, prefix) = split_bucket(url, "gs")?;

        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: None,
            scheme: "gs".to_string(),
            root: bucket.to_string(),
        }
        .with_prefix(prefix))
    }

    /// Parse Azure Blob URL
    fn parse_azure(url: &str) -> Result<Self> {
        let (container, prefix) = split_bucket(url, "az")?;

        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()
            .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: None,
            scheme: "az".to_string(),
            root: container.to_string(),
        }
        .with_prefix(prefix))
    }

    /// Parse local filesystem path
    fn parse_local(path: &str) -> Result<Self> {
        let path = path.strip_prefix("file://").unwrap_or(path);

        // The source directory must already exist
        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| Error::config(format!("Failed to open local directory {path}: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: None,
            scheme: "file".to_string(),
            root: path.to_string(),
        })
    }

    /// Check if this is a cloud store (not local or memory)
    pub fn is_cloud(&self) -> bool {
        !matches!(self.scheme.as_str(), "file" | "memory")
    }

    /// Get the scheme (s3, r2, gs, az, file, memory)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Get the listing prefix, if any
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

/// Split `scheme://bucket/prefix` into bucket and prefix
fn split_bucket<'a>(url: &'a str, scheme: &str) -> Result<(&'a str, &'a str)> {
    let without_scheme = url
        .strip_prefix(&format!("{scheme}://"))
        .ok_or_else(|| Error::config(format!("Invalid {scheme} URL: {url}")))?;

    let (bucket, prefix) = match without_scheme.find('/') {
        Some(idx) => (&without_scheme[..idx], &without_scheme[idx + 1..]),
        None => (without_scheme, ""),
    };

    if bucket.is_empty() {
        return Err(Error::config(format!("Missing bucket name in URL: {url}")));
    }

    Ok((bucket, prefix))
}

#[async_trait]
impl StorageClient for ObjectStoreClient {
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectEntry>> {
        let prefix = prefix.or(self.prefix.as_deref());
        let location = prefix.map(ObjectPath::from);

        let metas: Vec<_> = self
            .store
            .list(location.as_ref())
            .try_collect()
            .await
            .map_err(|e| Error::listing(prefix.unwrap_or_default(), e.to_string()))?;

        debug!(
            root = %self.location(),
            objects = metas.len(),
            "Listed objects"
        );

        Ok(metas
            .into_iter()
            .map(|meta| ObjectEntry {
                path: meta.location.to_string(),
                last_modified: Some(meta.last_modified),
                size: meta.size as u64,
            })
            .collect())
    }

    async fn open(&self, path: &str) -> Result<ByteStream> {
        let location =
            ObjectPath::parse(path).map_err(|e| Error::storage(path, e.to_string()))?;

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| Error::storage(path, e.to_string()))?;

        let stream = result
            .into_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

        Ok(Box::new(StreamReader::new(stream)))
    }

    fn location(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}://{}/{prefix}", self.scheme, self.root),
            None => format!("{}://{}", self.scheme, self.root),
        }
    }
}
