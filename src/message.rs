use std::{
    collections::VecDeque,
    io::{ErrorKind, Read},
};

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::{
    assembler::PartAssembler,
    config::DecoderConfig,
    error::{DecodeError, ParseError, StorageError, TruncationPoint},
    parser::tokenizer::{Step, Tokenizer},
    part::Part,
};

/// A decoded multipart message.
///
/// Spooled part bodies stay on disk until [`Message::close`] (or
/// [`Part::release`]) is called; nothing is cleaned up implicitly.
#[derive(Debug)]
pub struct Message {
    boundary: String,
    parts: Vec<Part>,
    is_partial: bool,
}

impl Message {
    /// Boundary token the message was decoded with.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Parts in stream order.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Parts in stream order, mutably.
    pub fn parts_mut(&mut self) -> &mut [Part] {
        &mut self.parts
    }

    /// Consumes the message, handing spool ownership to the caller.
    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` when the message holds no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns `true` when any part is partial or the closing delimiter was never confirmed.
    pub fn is_partial(&self) -> bool {
        self.is_partial
    }

    /// Looks a part up by [`Part::content_id`].
    pub fn part_by_content_id(&self, id: &str) -> Option<&Part> {
        let id = id.trim_start_matches('<').trim_end_matches('>');
        self.parts.iter().find(|part| part.content_id() == id)
    }

    /// Releases every part body, returning the first failure.
    pub fn close(mut self) -> Result<(), StorageError> {
        release_all(&mut self.parts)
    }
}

/// Progress of one [`MessageAssembly::next_part`] call.
#[derive(Debug)]
pub(crate) enum Progress {
    Part(Part),
    NeedMore,
    Done,
}

/// Drives the tokenizer and assembler across one message and enforces the size cap.
#[derive(Debug)]
pub(crate) struct MessageAssembly {
    boundary: String,
    tokenizer: Tokenizer,
    assembler: PartAssembler,
    bytes_read: u64,
    max_message_size: u64,
    enable_partial: bool,
    any_partial: bool,
}

impl MessageAssembly {
    pub(crate) fn new(boundary: &str, config: &DecoderConfig) -> Result<Self, DecodeError> {
        config.check_shape()?;

        Ok(Self {
            boundary: boundary.to_owned(),
            tokenizer: Tokenizer::new(boundary)?,
            assembler: PartAssembler::new(config.spool_policy()),
            bytes_read: 0,
            max_message_size: config.max_message_size,
            enable_partial: config.enable_partial,
            any_partial: false,
        })
    }

    /// Counts and buffers one chunk read from the source.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Result<(), DecodeError> {
        self.bytes_read = self.bytes_read.saturating_add(chunk.len() as u64);
        if self.bytes_read > self.max_message_size {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                bytes_read = self.bytes_read,
                max_message_size = self.max_message_size,
                "message: size limit exceeded"
            );
            return Err(DecodeError::SizeLimitExceeded {
                max_message_size: self.max_message_size,
            });
        }

        self.tokenizer.push(chunk);
        Ok(())
    }

    pub(crate) fn end_of_input(&mut self) {
        self.tokenizer.close();
    }

    pub(crate) fn next_part(&mut self) -> Result<Progress, DecodeError> {
        loop {
            let event = match self.tokenizer.next_event()? {
                Step::Emit(event) => event,
                Step::NeedMore => return Ok(Progress::NeedMore),
                Step::Done => {
                    self.assembler.abandon();
                    return Ok(Progress::Done);
                }
            };

            let Some(mut part) = self.assembler.accept(event)? else {
                continue;
            };

            if part.is_partial() {
                self.any_partial = true;
                if !self.enable_partial {
                    let _ = part.release();
                    return Err(self.truncated());
                }
            }
            return Ok(Progress::Part(part));
        }
    }

    /// Message-level partial flag; final once [`Progress::Done`] was returned.
    pub(crate) fn is_partial(&self) -> bool {
        self.any_partial || !self.tokenizer.is_closed()
    }

    /// Applies the end-of-message rules once every part was produced.
    pub(crate) fn check_complete(&self) -> Result<(), DecodeError> {
        let is_partial = self.is_partial();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            parts = self.assembler.yielded(),
            partial = is_partial,
            bytes_read = self.bytes_read,
            "message: decoding finished"
        );

        if is_partial && !self.enable_partial {
            return Err(self.truncated());
        }

        if self.assembler.yielded() == 0 {
            return Err(DecodeError::NoPartsRecovered);
        }

        #[cfg(feature = "tracing")]
        if is_partial {
            tracing::warn!(
                truncation = ?self.tokenizer.truncation(),
                "message: input ended before the closing delimiter"
            );
        }

        Ok(())
    }

    /// Releases the part still being assembled, if any.
    pub(crate) fn abandon(&mut self) {
        self.assembler.abandon();
    }

    pub(crate) fn into_message(self, parts: Vec<Part>) -> Message {
        Message {
            is_partial: self.is_partial(),
            boundary: self.boundary,
            parts,
        }
    }

    fn truncated(&self) -> DecodeError {
        DecodeError::TruncatedInput {
            point: self
                .tokenizer
                .truncation()
                .unwrap_or(TruncationPoint::Delimiter),
            offset: self.bytes_read,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Exhausted,
    /// Every part was read but the message as a whole was rejected.
    Rejected,
    Failed,
}

/// Lazy, forward-only reader of the parts of one message.
///
/// Each call to `next` reads just enough input for the next part. After the last
/// part, [`Parts::is_partial`] reports the message-level flag. Truncation with
/// partial results disabled, or a message without parts, surfaces as a final
/// error item.
#[derive(Debug)]
pub struct Parts<R> {
    source: R,
    assembly: MessageAssembly,
    buf: Vec<u8>,
    ready: VecDeque<Part>,
    phase: Phase,
}

impl<R: Read> Parts<R> {
    pub(crate) fn new(source: R, boundary: &str, config: &DecoderConfig) -> Result<Self, DecodeError> {
        let mut parts = Self {
            source,
            assembly: MessageAssembly::new(boundary, config)?,
            buf: vec![0; config.chunk_size],
            ready: VecDeque::new(),
            phase: Phase::Running,
        };

        if config.parse_eagerly {
            parts.materialize()?;
        }
        Ok(parts)
    }

    /// Boundary token being decoded.
    pub fn boundary(&self) -> &str {
        &self.assembly.boundary
    }

    /// Returns `true` once every part has been read from the source.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.phase, Phase::Exhausted | Phase::Rejected)
    }

    /// Message-level partial flag; final once the iterator is exhausted.
    pub fn is_partial(&self) -> bool {
        self.assembly.is_partial()
    }

    /// Reads the remaining parts into a [`Message`].
    ///
    /// Parts already taken from the iterator are not included.
    pub fn into_message(mut self) -> Result<Message, DecodeError> {
        match self.phase {
            Phase::Running => self.materialize()?,
            Phase::Exhausted => {}
            Phase::Rejected => {
                return Err(self
                    .assembly
                    .check_complete()
                    .err()
                    .unwrap_or_else(|| ParseError::new("multipart message was rejected").into()));
            }
            Phase::Failed => {
                return Err(ParseError::new("multipart decoding already failed").into());
            }
        }

        let parts = self.ready.drain(..).collect();
        Ok(self.assembly.into_message(parts))
    }

    fn materialize(&mut self) -> Result<(), DecodeError> {
        let outcome = self.drain_source();
        let outcome = outcome.and_then(|()| self.assembly.check_complete());
        match outcome {
            Ok(()) => {
                self.phase = Phase::Exhausted;
                Ok(())
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    fn drain_source(&mut self) -> Result<(), DecodeError> {
        while let Some(part) = self.pull()? {
            self.ready.push_back(part);
        }
        Ok(())
    }

    fn pull(&mut self) -> Result<Option<Part>, DecodeError> {
        loop {
            match self.assembly.next_part()? {
                Progress::Part(part) => return Ok(Some(part)),
                Progress::Done => return Ok(None),
                Progress::NeedMore => self.fill()?,
            }
        }
    }

    fn fill(&mut self) -> Result<(), DecodeError> {
        let read = loop {
            match self.source.read(&mut self.buf) {
                Ok(read) => break read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        };

        if read == 0 {
            self.assembly.end_of_input();
            return Ok(());
        }
        self.assembly.feed(&self.buf[..read])
    }

    fn fail(&mut self) {
        self.phase = Phase::Failed;
        self.assembly.abandon();
        let mut ready: Vec<Part> = self.ready.drain(..).collect();
        let _ = release_all(&mut ready);
    }
}

impl<R: Read> Iterator for Parts<R> {
    type Item = Result<Part, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(part) = self.ready.pop_front() {
            return Some(Ok(part));
        }

        if self.phase != Phase::Running {
            return None;
        }

        match self.pull() {
            Ok(Some(part)) => Some(Ok(part)),
            Ok(None) => match self.assembly.check_complete() {
                Ok(()) => {
                    self.phase = Phase::Exhausted;
                    None
                }
                Err(err) => {
                    self.fail();
                    self.phase = Phase::Rejected;
                    Some(Err(err))
                }
            },
            Err(err) => {
                self.fail();
                Some(Err(err))
            }
        }
    }
}

/// Decodes a whole message from a blocking byte source.
pub(crate) fn decode_reader<R: Read>(
    source: R,
    boundary: &str,
    config: &DecoderConfig,
) -> Result<Message, DecodeError> {
    Parts::new(source, boundary, config)?.into_message()
}

/// Decodes a whole message from an async stream of chunks.
///
/// Spool writes stay synchronous; only the chunk source is awaited.
pub(crate) async fn decode_chunks<S, E>(
    stream: S,
    boundary: &str,
    config: &DecoderConfig,
) -> Result<Message, DecodeError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<DecodeError>,
{
    let mut assembly = MessageAssembly::new(boundary, config)?;
    let mut parts = Vec::new();
    let mut stream = std::pin::pin!(stream);

    let outcome = async {
        loop {
            match assembly.next_part()? {
                Progress::Part(part) => parts.push(part),
                Progress::Done => break,
                Progress::NeedMore => match stream.next().await {
                    Some(Ok(chunk)) => assembly.feed(&chunk)?,
                    Some(Err(err)) => return Err(err.into()),
                    None => assembly.end_of_input(),
                },
            }
        }
        assembly.check_complete()
    }
    .await;

    match outcome {
        Ok(()) => Ok(assembly.into_message(parts)),
        Err(err) => {
            assembly.abandon();
            let _ = release_all(&mut parts);
            Err(err)
        }
    }
}

fn release_all(parts: &mut [Part]) -> Result<(), StorageError> {
    let mut first_error = None;
    for part in parts {
        if let Err(err) = part.release() {
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
