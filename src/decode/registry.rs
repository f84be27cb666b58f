//! Format parser registry

use super::columnar::{ArrowIpcParser, ParquetParser};
use super::parsers::{CsvParser, JsonlParser};
use super::types::{FormatOptions, FormatParser};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps format suffixes to parsers
///
/// Read-only once built; clones share the same parser instances.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn FormatParser>>,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("suffixes", &self.suffixes())
            .finish()
    }
}

impl ParserRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in parsers and default options
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_builtins(Arc::new(CsvParser::new()), JsonlParser::new());
        registry
    }

    /// Create a registry with the built-in parsers configured by `options`
    pub fn from_options(options: &FormatOptions) -> Result<Self> {
        let csv = CsvParser::with_options(options.csv.clone())?;
        let mut registry = Self::new();
        registry.register_builtins(
            Arc::new(csv),
            JsonlParser::with_options(options.jsonl.clone()),
        );
        Ok(registry)
    }

    fn register_builtins(&mut self, csv: Arc<CsvParser>, jsonl: JsonlParser) {
        let jsonl: Arc<dyn FormatParser> = Arc::new(jsonl);
        let arrow: Arc<dyn FormatParser> = Arc::new(ArrowIpcParser::new());

        self.register("csv", csv);
        self.register("jsonl", Arc::clone(&jsonl));
        self.register("ndjson", jsonl);
        self.register("parquet", Arc::new(ParquetParser::new()));
        self.register("arrow", Arc::clone(&arrow));
        self.register("arrows", Arc::clone(&arrow));
        self.register("feather", arrow);
    }

    /// Register a parser for a format suffix, replacing any previous one
    pub fn register(&mut self, suffix: impl Into<String>, parser: Arc<dyn FormatParser>) {
        self.parsers
            .insert(suffix.into().to_ascii_lowercase(), parser);
    }

    /// Look up the parser for a file's format suffix
    pub fn get(&self, path: &str, suffix: &str) -> Result<Arc<dyn FormatParser>> {
        self.parsers
            .get(&suffix.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::unsupported_format(path, suffix))
    }

    /// Check if a format suffix has a parser
    pub fn supports(&self, suffix: &str) -> bool {
        self.parsers.contains_key(&suffix.to_ascii_lowercase())
    }

    /// Registered suffixes, sorted
    pub fn suffixes(&self) -> Vec<&str> {
        let mut suffixes: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        suffixes.sort_unstable();
        suffixes
    }
}
