use bytes::{Buf, Bytes, BytesMut};

use crate::{
    error::{ParseError, TruncationPoint},
    parser::{
        boundary::validate_boundary,
        headers::{parse_header_block, Headers},
        transfer::{TransferDecoder, TransferEncoding},
    },
};

/// Low-level event produced by the [`Tokenizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A complete header block was parsed.
    Headers {
        /// Parsed header fields.
        headers: Headers,
        /// Input ended right after the header terminator.
        is_partial: bool,
    },
    /// Decoded body bytes of the current part.
    Content {
        /// Decoded bytes; may be empty on a truncated final chunk.
        data: Bytes,
        /// Emitted because input ran out inside the body.
        is_partial: bool,
    },
    /// A delimiter line was reached.
    Delimiter {
        /// `--boundary--` rather than `--boundary`.
        closing: bool,
        /// Input ended before the delimiter was fully matched.
        is_partial: bool,
    },
    /// Input is exhausted without a confirmed closing delimiter.
    EndOfInput,
}

/// Result of asking the tokenizer for its next event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// An event is ready.
    Emit(Event),
    /// More input must be pushed (or [`Tokenizer::close`] called) first.
    NeedMore,
    /// No further events will be produced.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    AfterDelimiter,
    Headers,
    Body,
    Exhausted,
    End,
    Failed,
}

enum DelimiterTail {
    Closing,
    Line(usize),
    NeedMore,
    Truncated { closing: bool },
    Malformed,
}

/// Sans-IO multipart tokenizer.
///
/// Callers [`push`](Tokenizer::push) raw chunks and pull [`Event`]s with
/// [`next_event`](Tokenizer::next_event) until it returns [`Step::NeedMore`]. Once the
/// source is exhausted, [`close`](Tokenizer::close) lets the tokenizer classify whatever
/// is left as truncated. Nothing past the end of input is ever assumed.
#[derive(Debug)]
pub struct Tokenizer {
    dash_boundary: Vec<u8>,
    buffer: BytesMut,
    state: State,
    line_start: bool,
    upstream_done: bool,
    decoder: TransferDecoder,
    truncation: Option<TruncationPoint>,
    closed: bool,
}

impl Tokenizer {
    /// Creates a tokenizer for `boundary` (without the leading `--`).
    pub fn new(boundary: &str) -> Result<Self, ParseError> {
        validate_boundary(boundary)?;

        Ok(Self {
            dash_boundary: format!("--{boundary}").into_bytes(),
            buffer: BytesMut::new(),
            state: State::Preamble,
            line_start: true,
            upstream_done: false,
            decoder: TransferDecoder::default(),
            truncation: None,
            closed: false,
        })
    }

    /// Appends raw input.
    pub fn push(&mut self, chunk: &[u8]) {
        if !self.upstream_done && !chunk.is_empty() {
            self.buffer.extend_from_slice(chunk);
        }
    }

    /// Marks the input as exhausted.
    pub fn close(&mut self) {
        self.upstream_done = true;
    }

    /// Returns `true` once the closing delimiter was fully matched.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns `true` when no further events will be produced.
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::End | State::Failed)
    }

    /// Where input ran out, if it ran out before the closing delimiter.
    pub fn truncation(&self) -> Option<TruncationPoint> {
        self.truncation
    }

    /// Number of raw bytes buffered but not yet turned into events.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Produces the next event, if enough input is available.
    ///
    /// Malformed delimiters and header blocks are fatal; the tokenizer yields
    /// [`Step::Done`] afterwards.
    pub fn next_event(&mut self) -> Result<Step, ParseError> {
        loop {
            let scanned = match self.state {
                State::Preamble => Ok(self.scan_preamble()),
                State::AfterDelimiter => self.scan_delimiter_tail().map(Some),
                State::Headers => self.scan_headers(),
                State::Body => Ok(self.scan_body()),
                State::Exhausted => {
                    self.state = State::End;
                    return Ok(Step::Emit(Event::EndOfInput));
                }
                State::End | State::Failed => return Ok(Step::Done),
            };

            match scanned {
                Ok(Some(step)) => return Ok(step),
                Ok(None) => {}
                Err(err) => {
                    self.state = State::Failed;
                    self.buffer.clear();
                    return Err(err);
                }
            }
        }
    }

    fn scan_preamble(&mut self) -> Option<Step> {
        if let Some(pos) = self.find_delimiter() {
            self.buffer.advance(pos + self.dash_boundary.len());
            self.state = State::AfterDelimiter;
            return None;
        }

        if self.upstream_done {
            self.buffer.clear();
            self.truncate_at(TruncationPoint::Preamble);
            return None;
        }

        let discard = self.buffer.len().saturating_sub(self.lookbehind());
        if discard > 0 {
            self.buffer.advance(discard);
            self.line_start = false;
        }
        Some(Step::NeedMore)
    }

    fn scan_delimiter_tail(&mut self) -> Result<Step, ParseError> {
        let tail = self.classify_delimiter_tail();
        let event = match tail {
            DelimiterTail::Closing => {
                self.buffer.advance(2);
                self.closed = true;
                self.state = State::End;
                Event::Delimiter {
                    closing: true,
                    is_partial: false,
                }
            }
            DelimiterTail::Line(consumed) => {
                self.buffer.advance(consumed);
                self.state = State::Headers;
                Event::Delimiter {
                    closing: false,
                    is_partial: false,
                }
            }
            DelimiterTail::NeedMore => return Ok(Step::NeedMore),
            DelimiterTail::Truncated { closing } => {
                self.buffer.clear();
                self.truncate_at(TruncationPoint::Delimiter);
                Event::Delimiter {
                    closing,
                    is_partial: true,
                }
            }
            DelimiterTail::Malformed => {
                return Err(ParseError::new("malformed multipart boundary"));
            }
        };
        Ok(Step::Emit(event))
    }

    fn classify_delimiter_tail(&self) -> DelimiterTail {
        let tail = &self.buffer[..];
        if tail.starts_with(b"--") {
            return DelimiterTail::Closing;
        }
        if tail == b"-" {
            return if self.upstream_done {
                DelimiterTail::Truncated { closing: true }
            } else {
                DelimiterTail::NeedMore
            };
        }

        let padding = tail
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        match &tail[padding..] {
            [b'\r', b'\n', ..] => DelimiterTail::Line(padding + 2),
            [b'\n', ..] => DelimiterTail::Line(padding + 1),
            [] | [b'\r'] if self.upstream_done => DelimiterTail::Truncated { closing: false },
            [] | [b'\r'] => DelimiterTail::NeedMore,
            _ => DelimiterTail::Malformed,
        }
    }

    fn scan_headers(&mut self) -> Result<Option<Step>, ParseError> {
        let Some((block_len, consumed)) = find_header_end(&self.buffer) else {
            if self.upstream_done {
                self.buffer.clear();
                self.truncate_at(TruncationPoint::Headers);
                return Ok(None);
            }
            return Ok(Some(Step::NeedMore));
        };

        let raw = self.buffer.split_to(consumed);
        let headers = parse_header_block(&raw[..block_len])?;
        let encoding = TransferEncoding::from_header(headers.get("content-transfer-encoding"));
        self.decoder = TransferDecoder::new(encoding);
        self.state = State::Body;
        self.line_start = true;

        Ok(Some(Step::Emit(Event::Headers {
            headers,
            is_partial: self.upstream_done && self.buffer.is_empty(),
        })))
    }

    fn scan_body(&mut self) -> Option<Step> {
        if let Some(pos) = self.find_delimiter() {
            let body_end = trim_line_break(&self.buffer[..pos]);
            let raw = self.buffer.split_to(body_end);
            self.buffer.advance(pos - body_end + self.dash_boundary.len());
            self.state = State::AfterDelimiter;

            let data = self.flush_body(&raw, false);
            if data.is_empty() {
                return None;
            }
            return Some(Step::Emit(Event::Content {
                data,
                is_partial: false,
            }));
        }

        if self.upstream_done {
            let (body_end, point) =
                match truncated_delimiter_start(&self.buffer, &self.dash_boundary, self.line_start)
                {
                    Some(start) => (start, TruncationPoint::Delimiter),
                    None => (self.buffer.len(), TruncationPoint::Body),
                };
            let raw = self.buffer.split_to(body_end);
            self.buffer.clear();
            let data = self.flush_body(&raw, true);
            self.truncate_at(point);
            return Some(Step::Emit(Event::Content {
                data,
                is_partial: true,
            }));
        }

        let keep = self.lookbehind();
        if self.buffer.len() <= keep {
            return Some(Step::NeedMore);
        }

        let raw = self.buffer.split_to(self.buffer.len() - keep);
        self.line_start = false;
        let data = self.decoder.decode(&raw);
        if data.is_empty() {
            return Some(Step::NeedMore);
        }
        Some(Step::Emit(Event::Content {
            data,
            is_partial: false,
        }))
    }

    fn flush_body(&mut self, raw: &[u8], truncated: bool) -> Bytes {
        let decoded = self.decoder.decode(raw);
        let tail = self.decoder.finish(truncated);
        if tail.is_empty() {
            return decoded;
        }

        let mut joined = BytesMut::with_capacity(decoded.len() + tail.len());
        joined.extend_from_slice(&decoded);
        joined.extend_from_slice(&tail);
        joined.freeze()
    }

    fn truncate_at(&mut self, point: TruncationPoint) {
        #[cfg(feature = "tracing")]
        tracing::debug!(point = %point, "tokenizer: input ended before closing delimiter");

        self.truncation = Some(point);
        self.state = State::Exhausted;
    }

    /// Bytes that must stay buffered so a delimiter split across chunks,
    /// including its leading line break, is still found.
    fn lookbehind(&self) -> usize {
        self.dash_boundary.len() + 2
    }

    /// Finds `--boundary` at the start of a line.
    fn find_delimiter(&self) -> Option<usize> {
        let mut from = 0;
        while let Some(offset) = find_subslice(&self.buffer[from..], &self.dash_boundary) {
            let pos = from + offset;
            let at_line_start = if pos == 0 {
                self.line_start
            } else {
                self.buffer[pos - 1] == b'\n'
            };
            if at_line_start {
                return Some(pos);
            }
            from = pos + 1;
        }
        None
    }
}

/// Returns `(block_len, consumed)` for the first blank line in `buf`.
fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    match buf {
        [b'\n', ..] => return Some((0, 1)),
        [b'\r', b'\n', ..] => return Some((0, 2)),
        _ => {}
    }

    let mut from = 0;
    while let Some(offset) = buf[from..].iter().position(|&b| b == b'\n') {
        let newline = from + offset;
        match &buf[newline + 1..] {
            [b'\n', ..] => return Some((newline + 1, newline + 2)),
            [b'\r', b'\n', ..] => return Some((newline + 1, newline + 3)),
            _ => from = newline + 1,
        }
    }
    None
}

/// Strips the line break that precedes a delimiter found at `body.len()`.
fn trim_line_break(body: &[u8]) -> usize {
    match body {
        [.., b'\r', b'\n'] => body.len() - 2,
        [.., b'\n'] => body.len() - 1,
        _ => body.len(),
    }
}

/// Finds where a delimiter cut short by end of input begins.
///
/// Only a final line of at least `--` that is a prefix of `--boundary` counts; a
/// bare trailing line break or single `-` could just as well be body content.
fn truncated_delimiter_start(buf: &[u8], dash_boundary: &[u8], line_start: bool) -> Option<usize> {
    let line = match buf.iter().rposition(|&b| b == b'\n') {
        Some(newline) => newline + 1,
        None if line_start => 0,
        None => return None,
    };

    let rest = &buf[line..];
    if rest.len() >= 2 && dash_boundary.starts_with(rest) {
        Some(trim_line_break(&buf[..line]))
    } else {
        None
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }

    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
