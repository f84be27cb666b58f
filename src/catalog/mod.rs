//! Catalog module
//!
//! Resolves which remote files belong to which stream.
//!
//! # Overview
//!
//! A [`Stream`] names a set of glob patterns. The [`RemoteFileCatalog`]
//! lists the store and returns, for each stream, the deduplicated union of
//! the files matched by its patterns. A [`RemoteFile`] is identified by its
//! path alone.

mod resolver;
mod types;

pub use resolver::{match_files, RemoteFileCatalog};
pub use types::{RemoteFile, Stream};
