//! Decompression wrapper
//!
//! Compression is chosen from the outermost suffix of a file name and the
//! format from the suffix underneath it, so `events.jsonl.gz` is gunzipped
//! and then parsed as `jsonl`.

use crate::error::{Error, Result};
use serde::Serialize;
use std::io::{BufRead, BufReader, Read};
use std::sync::{Arc, OnceLock};

/// Compression scheme of a remote file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Plain bytes, passed through unchanged
    #[default]
    None,
    /// Gzip (`.gz`), including multi-member files
    Gzip,
    /// Zstandard (`.zst`)
    Zstd,
}

impl Compression {
    /// Compression named by a file suffix, if it is a known scheme
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            "gz" | "gzip" => Some(Compression::Gzip),
            "zst" | "zstd" => Some(Compression::Zstd),
            _ => None,
        }
    }

    /// Human-readable name of this codec
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
        }
    }

    /// Check if the stream has to be decoded
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Compression::None)
    }
}

/// Split a path into its compression and its lowercased format suffix
///
/// Only the outermost suffix is considered for compression. A path without
/// a format suffix yields an empty format.
pub fn split_suffixes(path: &str) -> (Compression, String) {
    let name = path.rsplit('/').next().unwrap_or(path);

    let (compression, stem) = match extension(name) {
        Some(ext) => match Compression::from_suffix(ext) {
            Some(compression) => (compression, &name[..name.len() - ext.len() - 1]),
            None => (Compression::None, name),
        },
        None => (Compression::None, name),
    };

    let format = extension(stem)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    (compression, format)
}

/// Suffix after the last dot, ignoring leading-dot names like `.hidden`
fn extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

// ============================================================================
// Failure Tracking
// ============================================================================

/// Records where a read failure happened inside a decoded stream
///
/// Parsers only see an I/O error. The watch tells the pipeline whether the
/// transport or the decompression layer produced it, so the file can be
/// reported with the right error kind.
#[derive(Debug, Clone, Default)]
pub struct DecodeWatch {
    source: Arc<OnceLock<String>>,
    decode: Arc<OnceLock<String>>,
}

impl DecodeWatch {
    /// First transport failure, if any
    pub fn source_failure(&self) -> Option<&str> {
        self.source.get().map(String::as_str)
    }

    /// First decompression failure not caused by the transport, if any
    pub fn decode_failure(&self) -> Option<&str> {
        if self.source.get().is_some() {
            return None;
        }
        self.decode.get().map(String::as_str)
    }

    /// Reclassify a parse failure as a transport or decode failure
    pub fn classify(&self, path: &str, error: Error) -> Error {
        if let Some(message) = self.source_failure() {
            Error::storage(path, message)
        } else if let Some(message) = self.decode_failure() {
            Error::decode(path, message)
        } else {
            error
        }
    }
}

/// Reader that remembers its first error in a shared slot
struct Watched<R> {
    inner: R,
    slot: Arc<OnceLock<String>>,
}

impl<R: Read> Read for Watched<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf).inspect_err(|e| {
            let _ = self.slot.set(e.to_string());
        })
    }
}

/// Plain byte stream exposed by the decompression wrapper
pub struct DecodedStream {
    /// Decompressed bytes
    pub reader: Box<dyn BufRead + Send>,
    /// Failure tracking for this stream
    pub watch: DecodeWatch,
}

impl std::fmt::Debug for DecodedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedStream")
            .field("watch", &self.watch)
            .finish_non_exhaustive()
    }
}

/// Open a raw byte stream as a plain byte stream
///
/// Decodes on the fly when the path's outer suffix names a known
/// compression scheme and passes the stream through otherwise.
pub fn open<R>(path: &str, raw: R) -> Result<DecodedStream>
where
    R: Read + Send + 'static,
{
    let (compression, _) = split_suffixes(path);
    decompress(path, compression, raw)
}

/// Wrap a raw byte stream with an explicit compression scheme
pub fn decompress<R>(path: &str, compression: Compression, raw: R) -> Result<DecodedStream>
where
    R: Read + Send + 'static,
{
    let watch = DecodeWatch::default();
    let source = Watched {
        inner: raw,
        slot: Arc::clone(&watch.source),
    };

    let reader: Box<dyn BufRead + Send> = match compression {
        Compression::None => Box::new(BufReader::new(source)),
        Compression::Gzip => Box::new(BufReader::new(Watched {
            inner: flate2::read::MultiGzDecoder::new(source),
            slot: Arc::clone(&watch.decode),
        })),
        Compression::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(source).map_err(|e| {
                Error::decode(path, format!("Failed to create zstd decoder: {e}"))
            })?;
            Box::new(BufReader::new(Watched {
                inner: decoder,
                slot: Arc::clone(&watch.decode),
            }))
        }
    };

    Ok(DecodedStream { reader, watch })
}
