use bytes::{BufMut, Bytes, BytesMut};

/// Body transfer encoding named by a part's `Content-Transfer-Encoding` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// `7bit`, `8bit`, `binary` and unrecognized values: bytes pass through.
    #[default]
    Identity,
    /// `base64`.
    Base64,
    /// `quoted-printable`.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Maps a header value to an encoding, case-insensitively.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("base64") => Self::Base64,
            Some(v) if v.eq_ignore_ascii_case("quoted-printable") => Self::QuotedPrintable,
            _ => Self::Identity,
        }
    }
}

/// Incremental body decoder that carries incomplete input across chunks.
#[derive(Debug, Default)]
pub struct TransferDecoder {
    encoding: TransferEncoding,
    pending: Vec<u8>,
    padding: usize,
}

impl TransferDecoder {
    /// Creates a decoder for `encoding`.
    pub fn new(encoding: TransferEncoding) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
            padding: 0,
        }
    }

    /// Returns the encoding being decoded.
    pub fn encoding(&self) -> TransferEncoding {
        self.encoding
    }

    /// Decodes as much of `input` as possible, holding back an incomplete tail.
    pub fn decode(&mut self, input: &[u8]) -> Bytes {
        match self.encoding {
            TransferEncoding::Identity => Bytes::copy_from_slice(input),
            TransferEncoding::Base64 => self.decode_base64(input),
            TransferEncoding::QuotedPrintable => self.decode_quoted_printable(input),
        }
    }

    /// Flushes the held-back tail at the end of a body.
    ///
    /// When `truncated` is set the body was cut short, so an incomplete base64
    /// group (fewer than 4 symbols and `=`) or escape sequence is discarded
    /// instead of decoded.
    pub fn finish(&mut self, truncated: bool) -> Bytes {
        let pending = std::mem::take(&mut self.pending);
        self.padding = 0;
        match self.encoding {
            TransferEncoding::Identity => Bytes::new(),
            TransferEncoding::Base64 if truncated => {
                #[cfg(feature = "tracing")]
                if !pending.is_empty() {
                    tracing::debug!(
                        dropped = pending.len(),
                        "transfer: discarding incomplete base64 group of truncated body"
                    );
                }
                Bytes::new()
            }
            TransferEncoding::Base64 => {
                let mut out = BytesMut::with_capacity(2);
                decode_group(&pending, &mut out);
                out.freeze()
            }
            TransferEncoding::QuotedPrintable if truncated => Bytes::new(),
            TransferEncoding::QuotedPrintable => Bytes::from(pending),
        }
    }

    fn decode_base64(&mut self, input: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity((self.pending.len() + input.len()) / 4 * 3 + 3);

        for &symbol in input {
            if symbol == b'=' {
                // Stray padding outside a group is ignored.
                if !self.pending.is_empty() {
                    self.padding += 1;
                    if self.pending.len() + self.padding >= 4 {
                        self.flush_group(&mut out);
                    }
                }
                continue;
            }
            if sextet(symbol).is_none() {
                continue;
            }
            if self.padding > 0 {
                self.flush_group(&mut out);
            }
            self.pending.push(symbol);
            if self.pending.len() == 4 {
                self.flush_group(&mut out);
            }
        }

        out.freeze()
    }

    fn flush_group(&mut self, out: &mut BytesMut) {
        decode_group(&self.pending, out);
        self.pending.clear();
        self.padding = 0;
    }

    fn decode_quoted_printable(&mut self, input: &[u8]) -> Bytes {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(input);

        let mut out = BytesMut::with_capacity(data.len());
        let mut i = 0;
        while i < data.len() {
            if data[i] != b'=' {
                out.put_u8(data[i]);
                i += 1;
                continue;
            }

            match (data.get(i + 1), data.get(i + 2)) {
                (None, _) | (Some(b'\r'), None) => {
                    self.pending.extend_from_slice(&data[i..]);
                    break;
                }
                (Some(b'\r'), Some(b'\n')) => i += 3,
                (Some(b'\r' | b'\n'), _) => i += 2,
                (Some(&high), Some(&low)) => match (hex_value(high), hex_value(low)) {
                    (Some(high), Some(low)) => {
                        out.put_u8((high << 4) | low);
                        i += 3;
                    }
                    _ => {
                        out.put_u8(b'=');
                        i += 1;
                    }
                },
                (Some(&next), None) if hex_value(next).is_some() => {
                    self.pending.extend_from_slice(&data[i..]);
                    break;
                }
                (Some(_), None) => {
                    out.put_u8(b'=');
                    i += 1;
                }
            }
        }

        out.freeze()
    }
}

/// Decodes up to four base64 symbols; groups shorter than two symbols yield nothing.
fn decode_group(group: &[u8], out: &mut BytesMut) {
    let mut vals = [0u8; 4];
    for (slot, &symbol) in vals.iter_mut().zip(group) {
        *slot = sextet(symbol).unwrap_or(0);
    }

    let produced = match group.len() {
        4 => 3,
        3 => 2,
        2 => 1,
        _ => 0,
    };
    let bytes = [
        (vals[0] << 2) | (vals[1] >> 4),
        (vals[1] << 4) | (vals[2] >> 2),
        (vals[2] << 6) | vals[3],
    ];
    out.extend_from_slice(&bytes[..produced]);
}

fn sextet(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
