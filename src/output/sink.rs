//! Record sinks
//!
//! A sink receives records in the order the pipeline forwards them. `emit`
//! may suspend; the pipeline stops pulling records until it returns.

use super::types::RecordMessage;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Destination for emitted records
#[async_trait]
pub trait RecordSink: Send {
    /// Accept one record
    async fn emit(&mut self, message: RecordMessage) -> Result<()>;

    /// Flush buffered output
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// JSON Lines Sink
// ============================================================================

/// Writes protocol `RECORD` messages, one JSON object per line
pub struct JsonLinesSink<W: AsyncWrite + Unpin + Send> {
    writer: BufWriter<W>,
    pretty: bool,
}

/// Sink writing to the process stdout
pub type StdoutSink = JsonLinesSink<tokio::io::Stdout>;

impl JsonLinesSink<tokio::io::Stdout> {
    /// Create a sink writing to stdout
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    /// Create a sink over a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            pretty: false,
        }
    }

    /// Pretty-print each message
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Unwrap the underlying writer
    ///
    /// Unflushed output is lost; call [`RecordSink::flush`] first.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RecordSink for JsonLinesSink<W> {
    async fn emit(&mut self, message: RecordMessage) -> Result<()> {
        let protocol = message.to_protocol();
        let mut line = if self.pretty {
            serde_json::to_vec_pretty(&protocol)?
        } else {
            serde_json::to_vec(&protocol)?
        };
        line.push(b'\n');

        self.writer
            .write_all(&line)
            .await
            .map_err(|e| Error::sink(format!("Failed to write record: {e}")))
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .await
            .map_err(|e| Error::sink(format!("Failed to flush output: {e}")))
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// Collects records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Vec<RecordMessage>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far
    pub fn messages(&self) -> &[RecordMessage] {
        &self.messages
    }

    /// Records received for one stream
    pub fn stream_messages<'a>(
        &'a self,
        stream: &'a str,
    ) -> impl Iterator<Item = &'a RecordMessage> + 'a {
        self.messages
            .iter()
            .filter(move |m| &*m.stream == stream)
    }

    /// Number of records received
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if no record was received
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Take the received records
    pub fn into_messages(self) -> Vec<RecordMessage> {
        self.messages
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn emit(&mut self, message: RecordMessage) -> Result<()> {
        self.messages.push(message);
        Ok(())
    }
}
