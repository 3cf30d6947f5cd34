#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Truncation-tolerant multipart decoding.
//!
//! Streams cut short before the closing delimiter still yield every part whose
//! header block arrived; such parts and their message are flagged partial.

/// Part assembly from tokenizer events.
pub mod assembler;
/// Fluent builder API.
pub mod builder;
/// Decoder configuration.
pub mod config;
/// Error types exposed by this crate.
pub mod error;
/// Decoded message, lazy part reader and message assembly.
pub mod message;
/// Decoded part API.
pub mod part;
/// Low-level parser components.
pub mod parser;
/// Entity storage: memory buffers and spool files.
pub mod storage;

use std::io::Read;

use bytes::Bytes;
use futures::Stream;

pub use assembler::PartAssembler;
pub use builder::DecoderBuilder;
pub use config::DecoderConfig;
pub use error::{ConfigError, DecodeError, ParseError, StorageError, TruncationPoint};
pub use message::{Message, Parts};
pub use parser::{ContentDisposition, Event, Headers, Step, Tokenizer};
pub use part::Part;
pub use storage::{Entity, EntityReader, SpoolPolicy};

/// Main decoding entry point holding a validated configuration.
///
/// Validation (including the spool directory probe) happens once in
/// [`Decoder::new`]; the decoder can then be shared across any number of messages.
#[derive(Debug, Clone)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Validates `config` once (including the spool directory probe).
    pub fn new(mut config: DecoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Creates a fluent builder with default configuration.
    pub fn builder() -> DecoderBuilder {
        DecoderBuilder::default()
    }

    /// Returns the validated configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes a whole message from a blocking byte source.
    pub fn decode<R: Read>(&self, source: R, boundary: &str) -> Result<Message, DecodeError> {
        message::decode_reader(source, boundary, &self.config)
    }

    /// Decodes a whole message from an async stream of byte chunks.
    pub async fn decode_stream<S, E>(&self, stream: S, boundary: &str) -> Result<Message, DecodeError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<DecodeError>,
    {
        message::decode_chunks(stream, boundary, &self.config).await
    }

    /// Returns a lazy reader over the parts of a message.
    pub fn parts<R: Read>(&self, source: R, boundary: &str) -> Result<Parts<R>, DecodeError> {
        Parts::new(source, boundary, &self.config)
    }
}

/// Validates `config` and decodes one message from `source`.
///
/// Every call validates a copy of `config`, which creates and removes a probe
/// file in the spool directory. Build a [`Decoder`] once to decode many messages
/// with a single validation.
pub fn decode<R: Read>(
    source: R,
    boundary: &str,
    config: &DecoderConfig,
) -> Result<Message, DecodeError> {
    Decoder::new(config.clone())?.decode(source, boundary)
}

/// Validates `config` and decodes one message from an async chunk stream.
///
/// Like [`decode`], this validates on every call; prefer a reused [`Decoder`].
pub async fn decode_stream<S, E>(
    stream: S,
    boundary: &str,
    config: &DecoderConfig,
) -> Result<Message, DecodeError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<DecodeError>,
{
    Decoder::new(config.clone())?
        .decode_stream(stream, boundary)
        .await
}
