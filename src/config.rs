//! Configuration types for file-based sources
//!
//! A source config names the storage root, the streams with their glob
//! patterns, and the format and pipeline options. It is loaded from YAML or
//! JSON and validated before anything touches storage.

use crate::catalog::{RemoteFileCatalog, Stream};
use crate::decode::{FormatOptions, ParserRegistry};
use crate::engine::{PipelineConfig, StreamPipeline, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_CONCURRENCY};
use crate::error::{Error, Result};
use crate::storage::ObjectStoreClient;
use crate::types::ErrorStrategy;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Top-Level Source Config
// ============================================================================

/// Complete source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Storage root URL (`s3://bucket/prefix`, `file:///path`, `memory://`, ...)
    #[serde(alias = "bucket")]
    pub url: String,

    /// Stream definitions
    ///
    /// Accepts either a map of stream name to globs or a list of
    /// `{name, globs}` entries.
    #[serde(deserialize_with = "deserialize_streams")]
    pub streams: Vec<StreamConfig>,

    /// Format options
    #[serde(default)]
    pub format: FormatOptions,

    /// What a stream does when one of its files fails
    #[serde(default)]
    pub error_strategy: ErrorStrategy,

    /// Maximum number of files processed at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Maximum number of records buffered ahead of the output
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// Stream definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Unique stream name
    pub name: String,

    /// Glob patterns matched against full remote paths
    pub globs: Vec<String>,
}

impl StreamConfig {
    /// Create a stream definition
    pub fn new<I, S>(name: impl Into<String>, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            globs: globs.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StreamsDef {
    Map(BTreeMap<String, Vec<String>>),
    List(Vec<StreamConfig>),
}

fn deserialize_streams<'de, D>(deserializer: D) -> std::result::Result<Vec<StreamConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StreamsDef::deserialize(deserializer)? {
        StreamsDef::Map(map) => map
            .into_iter()
            .map(|(name, globs)| StreamConfig { name, globs })
            .collect(),
        StreamsDef::List(list) => list,
    })
}

// ============================================================================
// Loading
// ============================================================================

impl SourceConfig {
    /// Create a config for a storage root with no streams
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            streams: Vec::new(),
            format: FormatOptions::default(),
            error_strategy: ErrorStrategy::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Add a stream
    #[must_use]
    pub fn with_stream<I, S>(mut self, name: impl Into<String>, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams.push(StreamConfig::new(name, globs));
        self
    }

    /// Set format options
    #[must_use]
    pub fn with_format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    /// Set the error strategy
    #[must_use]
    pub fn with_error_strategy(mut self, strategy: ErrorStrategy) -> Self {
        self.error_strategy = strategy;
        self
    }

    /// Set the file concurrency bound
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Load and validate a config file
    ///
    /// `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse and validate a YAML config
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::missing_field("url"));
        }

        if self.streams.is_empty() {
            return Err(Error::config("Config must define at least one stream"));
        }

        let mut names = HashSet::new();
        for stream in &self.streams {
            if stream.name.trim().is_empty() {
                return Err(Error::config("Stream name cannot be empty"));
            }
            if !names.insert(stream.name.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate stream name '{}'",
                    stream.name
                )));
            }
            // Compiles every glob and rejects empty glob lists
            Stream::new(&stream.name, &stream.globs)?;
        }

        if self.max_concurrency == 0 {
            return Err(Error::invalid_value("max_concurrency", "must be positive"));
        }
        if self.channel_capacity == 0 {
            return Err(Error::invalid_value("channel_capacity", "must be positive"));
        }

        self.format.csv.delimiter_byte()?;
        Ok(())
    }

    // ========================================================================
    // Building
    // ========================================================================

    /// Build all configured streams
    pub fn streams(&self) -> Result<Vec<Stream>> {
        self.streams
            .iter()
            .map(|s| Stream::new(&s.name, &s.globs))
            .collect()
    }

    /// Build the named streams, or all of them when `names` is empty
    pub fn select_streams(&self, names: &[String]) -> Result<Vec<Stream>> {
        if names.is_empty() {
            return self.streams();
        }

        names
            .iter()
            .map(|name| {
                let stream = self
                    .streams
                    .iter()
                    .find(|s| &s.name == name)
                    .ok_or_else(|| Error::config(format!("Unknown stream '{name}'")))?;
                Stream::new(&stream.name, &stream.globs)
            })
            .collect()
    }

    /// Pipeline settings
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_max_concurrency(self.max_concurrency)
            .with_channel_capacity(self.channel_capacity)
            .with_error_strategy(self.error_strategy)
    }

    /// Parser registry with the configured format options
    pub fn registry(&self) -> Result<ParserRegistry> {
        ParserRegistry::from_options(&self.format)
    }

    /// Storage client for the configured root
    pub fn storage_client(&self) -> Result<ObjectStoreClient> {
        ObjectStoreClient::parse(&self.url)
    }

    /// File catalog over the configured root
    pub fn catalog(&self) -> Result<RemoteFileCatalog> {
        Ok(RemoteFileCatalog::new(Arc::new(self.storage_client()?)))
    }

    /// Pipeline over the configured root
    pub fn pipeline(&self) -> Result<StreamPipeline> {
        Ok(StreamPipeline::new(self.catalog()?, self.registry()?).with_config(self.pipeline_config()))
    }
}
