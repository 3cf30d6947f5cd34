use std::fmt;

use thiserror::Error;

/// Configuration-time validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A configured numeric value must be strictly greater than zero.
    #[error("`{setting}` must be greater than 0")]
    ZeroValue {
        /// Name of the offending setting.
        setting: &'static str,
    },
    /// `memory_threshold` accepts `-1` (unlimited) or a non-negative byte count.
    #[error("`memory_threshold` must be -1 or a non-negative byte count, got {value}")]
    InvalidMemoryThreshold {
        /// Configured threshold.
        value: i64,
    },
    /// The spool file prefix contains a path separator.
    #[error("spool file {field} `{value}` cannot contain a path separator")]
    InvalidSpoolName {
        /// Either `prefix` or `suffix`.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Syntax failures that are not attributable to truncated input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Generic parser failure with message context.
    #[error("{message}")]
    Message {
        /// Parser failure message.
        message: String,
    },
}

impl ParseError {
    /// Creates a parser error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Entity storage failures (spool file create, write, move or delete).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Generic storage failure with message context.
    #[error("{message}")]
    Message {
        /// Storage failure message.
        message: String,
    },
}

impl StorageError {
    /// Creates a storage error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Where in the multipart grammar the input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationPoint {
    /// Before the first delimiter was found.
    Preamble,
    /// While matching a delimiter token or its line break.
    Delimiter,
    /// Inside a header block, before its terminating blank line.
    Headers,
    /// Inside a part body.
    Body,
}

impl fmt::Display for TruncationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preamble => "preamble",
            Self::Delimiter => "delimiter",
            Self::Headers => "part headers",
            Self::Body => "part body",
        };
        f.write_str(name)
    }
}

/// Runtime error type returned by every decode entry point.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Configuration error surfaced at runtime.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Boundary or header syntax is invalid independent of truncation.
    #[error(transparent)]
    Syntax(#[from] ParseError),
    /// A spool file could not be created, written or removed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The byte source failed while being read.
    #[error("failed to read multipart source: {0}")]
    Source(#[from] std::io::Error),
    /// The input exceeded the configured message size cap.
    #[error("multipart message exceeded max size of {max_message_size} bytes")]
    SizeLimitExceeded {
        /// Configured cap in bytes.
        max_message_size: u64,
    },
    /// Decoding finished without a single usable part.
    #[error("multipart message has no parts")]
    NoPartsRecovered,
    /// Input was truncated while partial results are disabled.
    #[error("multipart stream ended unexpectedly in {point} after {offset} bytes")]
    TruncatedInput {
        /// Grammar position where input ran out.
        point: TruncationPoint,
        /// Number of raw bytes read before the truncation was detected.
        offset: u64,
    },
}

impl DecodeError {
    /// Returns `true` when the error is caused by the input rather than the environment.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Syntax(_)
                | Self::SizeLimitExceeded { .. }
                | Self::NoPartsRecovered
                | Self::TruncatedInput { .. }
        )
    }
}
