//! CLI runner - executes commands

use crate::catalog::RemoteFile;
use crate::cli::commands::{parse_stream_filter, Cli, Commands, OutputFormat};
use crate::config::SourceConfig;
use crate::engine::{RunReport, StreamReport};
use crate::error::{Error, Result, ResultExt};
use crate::output::{protocol, JsonLinesSink};
use crate::types::LogLevel;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// CLI runner
pub struct Runner {
    cli: Cli,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the running command
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check { config_json } => self.check(config_json.as_deref()).await,
            Commands::Discover {
                streams,
                config_json,
            } => {
                self.discover(streams.as_deref(), config_json.as_deref())
                    .await
            }
            Commands::Read {
                streams,
                config_json,
            } => self.read(streams.as_deref(), config_json.as_deref()).await,
            Commands::Files {
                streams,
                config_json,
            } => self.files(streams.as_deref(), config_json.as_deref()).await,
            Commands::Validate { config_json } => self.validate(config_json.as_deref()),
        }
    }

    /// Load configuration
    fn load_config(&self, inline: Option<&str>) -> Result<SourceConfig> {
        // Inline config takes precedence
        if let Some(json_str) = inline {
            return SourceConfig::from_json(json_str);
        }

        if let Some(path) = &self.cli.config {
            return SourceConfig::load(path);
        }

        Err(Error::config(
            "No configuration given (use -C <file> or --config-json)",
        ))
    }

    /// Check access to the storage root
    async fn check(&self, config_json: Option<&str>) -> Result<()> {
        let config = self.load_config(config_json)?;
        let catalog = config.catalog()?;
        let location = catalog.client().location();

        self.log(LogLevel::Info, format!("Checking access to {location}"));

        match catalog.list().await {
            Ok(files) => self.output_message(&protocol::connection_status(
                true,
                format!("Listed {} files under {location}", files.len()),
            )),
            Err(e) => self.output_message(&protocol::connection_status(
                false,
                format!("Connection check failed: {e}"),
            )),
        }

        Ok(())
    }

    /// Infer schemas and emit the catalog
    async fn discover(&self, streams: Option<&str>, config_json: Option<&str>) -> Result<()> {
        let config = self.load_config(config_json)?;
        let streams = config.select_streams(&parse_stream_filter(streams))?;
        let pipeline = config.pipeline()?;

        let reports = pipeline.discover(&streams, &self.cancel).await;

        let mut catalog = Vec::with_capacity(reports.len());
        let mut failed_streams = 0;
        let mut failed_files = 0;

        for report in &reports {
            self.log_stream_problems(report);
            failed_files += report.failed_files().count();
            if report.error.is_some() {
                failed_streams += 1;
                continue;
            }
            catalog.push(protocol::catalog_stream(&report.stream, &report.schema));
        }

        self.output_message(&protocol::catalog_message(catalog));

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if failed_streams > 0 || failed_files > 0 {
            return Err(Error::SyncFailed {
                failed_files,
                failed_streams,
            });
        }
        Ok(())
    }

    /// Read records to stdout
    async fn read(&self, streams: Option<&str>, config_json: Option<&str>) -> Result<()> {
        let config = self.load_config(config_json)?;
        let streams = config.select_streams(&parse_stream_filter(streams))?;
        let pipeline = config.pipeline()?;

        self.log(
            LogLevel::Info,
            format!(
                "Starting read of {} streams from {}",
                streams.len(),
                pipeline.catalog().client().location()
            ),
        );

        let mut sink =
            JsonLinesSink::stdout().with_pretty(self.cli.format == OutputFormat::Pretty);
        let report = pipeline.read(&streams, &mut sink, &self.cancel).await;

        for stream in &report.streams {
            self.log_stream_problems(stream);
            self.log(
                LogLevel::Info,
                format!(
                    "Stream {}: {} records from {} files",
                    stream.stream,
                    stream.records(),
                    stream.files.len()
                ),
            );
        }
        if let Some(e) = &report.sink_error {
            self.log(LogLevel::Error, format!("Output failed: {e}"));
        }

        self.output_message(&Self::sync_summary(&report));

        match report.error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// List the resolved file set per stream
    async fn files(&self, streams: Option<&str>, config_json: Option<&str>) -> Result<()> {
        let config = self.load_config(config_json)?;
        let streams = config.select_streams(&parse_stream_filter(streams))?;
        let catalog = config.catalog()?;

        for stream in &streams {
            let files = catalog
                .resolve(stream)
                .await
                .with_context(|| format!("Failed to resolve stream '{}'", stream.name()))?;
            self.output_message(&json!({
                "type": "FILES",
                "stream": stream.name(),
                "files": files.iter().map(Self::file_json).collect::<Vec<_>>()
            }));
        }

        Ok(())
    }

    /// Validate configuration
    fn validate(&self, config_json: Option<&str>) -> Result<()> {
        let config = self.load_config(config_json)?;

        self.log(
            LogLevel::Info,
            format!(
                "Config for {} is valid with {} streams",
                config.url,
                config.streams.len()
            ),
        );

        Ok(())
    }

    // ========================================================================
    // Output
    // ========================================================================

    fn log_stream_problems(&self, report: &StreamReport) {
        if let Some(e) = &report.error {
            self.log(
                LogLevel::Error,
                format!("Stream {} failed: {e}", report.stream),
            );
        }
        for file in report.failed_files() {
            match &file.error {
                Some(e) if e.is_file_level() => self.log(
                    LogLevel::Warn,
                    format!("Stream {}: skipped {}: {e}", report.stream, file.path),
                ),
                Some(e) if !e.is_cancelled() => self.log(
                    LogLevel::Error,
                    format!("Stream {}: {} failed: {e}", report.stream, file.path),
                ),
                _ => {}
            }
        }
        for conflict in &report.schema_conflicts {
            self.log(
                LogLevel::Warn,
                format!("Stream {}: {conflict}", report.stream),
            );
        }
    }

    fn sync_summary(report: &RunReport) -> Value {
        let streams: Vec<Value> = report
            .streams
            .iter()
            .map(|s| {
                json!({
                    "stream": s.stream,
                    "status": if s.is_ok() { "SUCCESS" } else { "FAILED" },
                    "records_synced": s.records(),
                    "files": s.files.len(),
                    "failed_files": s.failed_files().count(),
                    "schema_valid": s.is_schema_valid(),
                    "error": s.error.as_ref().map(ToString::to_string)
                })
            })
            .collect();

        json!({
            "type": "SYNC_SUMMARY",
            "summary": {
                "status": report.status().to_string().to_uppercase(),
                "total_records": report.records(),
                "total_streams": report.streams.len(),
                "failed_streams": report.failed_streams(),
                "failed_files": report.failed_files(),
                "duration_ms": report.duration.as_millis() as u64,
                "streams": streams
            }
        })
    }

    fn file_json(file: &RemoteFile) -> Value {
        json!({
            "path": file.path(),
            "last_modified": file.last_modified().map(|t| t.to_rfc3339()),
            "compression": file.compression().name(),
            "format": file.format()
        })
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.output_message(&protocol::log_message(level, message));
    }

    /// Output a message to stdout
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
