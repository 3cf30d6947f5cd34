use std::path::PathBuf;

use crate::{config::DecoderConfig, error::ConfigError, Decoder};

/// Builder for configuring a [`Decoder`].
#[derive(Debug, Clone, Default)]
pub struct DecoderBuilder {
    config: DecoderConfig,
}

impl DecoderBuilder {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current builder configuration snapshot.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Replaces the full builder configuration.
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the read granularity in bytes.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Sets the per-part in-memory budget; `-1` never spools.
    pub fn memory_threshold(mut self, memory_threshold: i64) -> Self {
        self.config.memory_threshold = memory_threshold;
        self
    }

    /// Sets the cap on raw bytes read per message.
    pub fn max_message_size(mut self, max_message_size: u64) -> Self {
        self.config.max_message_size = max_message_size;
        self
    }

    /// Sets the spool directory.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Sets the spool file name prefix.
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    /// Sets the spool file name suffix.
    pub fn file_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.file_suffix = suffix.into();
        self
    }

    /// Materializes every part before a lazy part reader is handed out.
    pub fn parse_eagerly(mut self, parse_eagerly: bool) -> Self {
        self.config.parse_eagerly = parse_eagerly;
        self
    }

    /// Chooses between partial results and a hard error on truncated input.
    pub fn enable_partial(mut self, enable_partial: bool) -> Self {
        self.config.enable_partial = enable_partial;
        self
    }

    /// Checks configuration shape without touching the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.check_shape()
    }

    /// Finalizes and returns validated configuration.
    pub fn build_config(mut self) -> Result<DecoderConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Finalizes the configuration into a reusable [`Decoder`].
    pub fn build(self) -> Result<Decoder, ConfigError> {
        Decoder::new(self.config)
    }
}
