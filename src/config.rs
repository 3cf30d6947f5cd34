use std::path::PathBuf;

use crate::{error::ConfigError, storage::SpoolPolicy};

/// Default read granularity in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
/// Default per-part in-memory budget before spooling to disk.
pub const DEFAULT_MEMORY_THRESHOLD: i64 = 1_048_576;
/// Default cap on raw bytes read for one message (45 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: u64 = 45 * 1024 * 1024;
/// Default spool file prefix.
pub const DEFAULT_FILE_PREFIX: &str = "MIME";
/// Default spool file suffix.
pub const DEFAULT_FILE_SUFFIX: &str = ".tmp";

/// Tunables governing buffering, size limits and partial tolerance.
///
/// Call [`DecoderConfig::validate`] once before the first decode; [`crate::Decoder::new`]
/// and [`crate::DecoderBuilder::build`] do this for you.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Read granularity hint in bytes.
    pub chunk_size: usize,
    /// Bytes per part kept in memory before spooling; `-1` keeps everything in memory.
    pub memory_threshold: i64,
    /// Hard cap on cumulative raw bytes read for one message.
    pub max_message_size: u64,
    /// Spool directory; `None` uses the platform temp directory.
    pub temp_dir: Option<PathBuf>,
    /// Spool file name prefix.
    pub file_prefix: String,
    /// Spool file name suffix.
    pub file_suffix: String,
    /// Materialize every part before handing out a lazy part reader.
    pub parse_eagerly: bool,
    /// Return truncated results flagged partial instead of failing.
    pub enable_partial: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            temp_dir: None,
            file_prefix: DEFAULT_FILE_PREFIX.to_owned(),
            file_suffix: DEFAULT_FILE_SUFFIX.to_owned(),
            parse_eagerly: false,
            enable_partial: true,
        }
    }
}

impl DecoderConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when every part body stays in memory.
    pub fn is_memory_only(&self) -> bool {
        self.memory_threshold == -1
    }

    /// Returns the directory spool files are created in.
    pub fn spool_dir(&self) -> PathBuf {
        match &self.temp_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => std::env::temp_dir(),
        }
    }

    /// Validates configuration shape and probes the spool directory.
    ///
    /// If a probe file cannot be created the configuration falls back to
    /// `memory_threshold = -1` instead of failing.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.check_shape()?;

        if self.is_memory_only() {
            return Ok(());
        }

        if let Err(_err) = self.spool_policy().probe() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                dir = %self.spool_dir().display(),
                error = %_err,
                "config: spool directory unusable, keeping all part bodies in memory"
            );
            self.memory_threshold = -1;
        }

        Ok(())
    }

    pub(crate) fn check_shape(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroValue {
                setting: "chunk_size",
            });
        }

        if self.max_message_size == 0 {
            return Err(ConfigError::ZeroValue {
                setting: "max_message_size",
            });
        }

        if self.memory_threshold < -1 {
            return Err(ConfigError::InvalidMemoryThreshold {
                value: self.memory_threshold,
            });
        }

        for (field, value) in [("prefix", &self.file_prefix), ("suffix", &self.file_suffix)] {
            if value.contains(['/', '\\']) {
                return Err(ConfigError::InvalidSpoolName {
                    field,
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }

    /// Builds the spool policy derived from this configuration.
    pub fn spool_policy(&self) -> SpoolPolicy {
        SpoolPolicy {
            threshold: u64::try_from(self.memory_threshold).ok(),
            dir: self.spool_dir(),
            prefix: self.file_prefix.clone(),
            suffix: self.file_suffix.clone(),
        }
    }
}
