use std::borrow::Cow;

use http::HeaderName;

use crate::error::ParseError;

/// Ordered, case-insensitive multimap of part header fields.
///
/// Fields keep the name spelling and order they had on the wire; repeated names
/// keep every value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, keeping any earlier values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns every value for `name`, in wire order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` when at least one field named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over `(name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when there are no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn last_value_mut(&mut self) -> Option<&mut String> {
        self.entries.last_mut().map(|(_, value)| value)
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Parses a raw header block (without its terminating blank line).
///
/// Accepts CRLF or bare LF line breaks and unfolds continuation lines. A block
/// that is not valid UTF-8 is read as ISO-8859-1.
pub fn parse_header_block(raw: &[u8]) -> Result<Headers, ParseError> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(raw.iter().map(|&byte| char::from(byte)).collect::<String>()),
    };
    let mut headers = Headers::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            let folded = line.trim();
            let previous = headers
                .last_value_mut()
                .ok_or_else(|| ParseError::new("header continuation line without a header"))?;
            if !folded.is_empty() {
                if !previous.is_empty() {
                    previous.push(' ');
                }
                previous.push_str(folded);
            }
            continue;
        }

        let Some((raw_name, raw_value)) = line.split_once(':') else {
            return Err(ParseError::new("invalid part header line"));
        };

        let name = raw_name.trim_end();
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ParseError::new(format!("invalid part header name `{name}`")))?;
        headers.append(name, raw_value.trim());
    }

    Ok(headers)
}

/// Parsed `Content-Disposition` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Lower-cased disposition type, e.g. `form-data` or `attachment`.
    pub disposition: String,
    /// `name` parameter.
    pub name: Option<String>,
    /// `filename*` (RFC 5987) or `filename` parameter.
    pub filename: Option<String>,
}

/// Parses a `Content-Disposition` header value.
pub fn parse_content_disposition(value: &str) -> Result<ContentDisposition, ParseError> {
    let mut segments = split_parameters(value).into_iter();
    let disposition = segments
        .next()
        .map(|segment| segment.trim().to_ascii_lowercase())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| ParseError::new("invalid Content-Disposition header"))?;

    let mut parsed = ContentDisposition {
        disposition,
        name: None,
        filename: None,
    };
    let mut extended_filename = None;

    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let (key, raw) = segment
            .split_once('=')
            .ok_or_else(|| ParseError::new("invalid Content-Disposition parameter"))?;
        let value = unquote(raw.trim())?;

        match key.trim().to_ascii_lowercase().as_str() {
            "name" => parsed.name = Some(value),
            "filename" => parsed.filename = Some(value),
            "filename*" => extended_filename = Some(decode_extended_value(&value)?),
            _ => {}
        }
    }

    if extended_filename.is_some() {
        parsed.filename = extended_filename;
    }

    Ok(parsed)
}

pub(crate) fn split_parameters(value: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (index, ch) in value.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                segments.push(&value[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }

    segments.push(&value[start..]);
    segments
}

pub(crate) fn unquote(raw: &str) -> Result<String, ParseError> {
    let Some(inner) = raw.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        if raw.contains('"') {
            return Err(ParseError::new("unbalanced quotes in header parameter"));
        }
        return Ok(raw.to_owned());
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => return Err(ParseError::new("dangling escape in quoted parameter")),
            },
            _ => out.push(ch),
        }
    }
    Ok(out)
}

/// Decodes an RFC 5987 `charset'language'percent-encoded` value.
fn decode_extended_value(value: &str) -> Result<String, ParseError> {
    let mut pieces = value.splitn(3, '\'');
    let (Some(charset), Some(_language), Some(encoded)) =
        (pieces.next(), pieces.next(), pieces.next())
    else {
        return Err(ParseError::new("invalid extended parameter encoding"));
    };

    if !charset.eq_ignore_ascii_case("utf-8") {
        return Err(ParseError::new(format!(
            "unsupported extended parameter charset `{charset}`"
        )));
    }

    let raw = encoded.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut index = 0;
    while index < raw.len() {
        if raw[index] != b'%' {
            bytes.push(raw[index]);
            index += 1;
            continue;
        }

        let escape = raw
            .get(index + 1..index + 3)
            .and_then(|pair| std::str::from_utf8(pair).ok())
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .ok_or_else(|| ParseError::new("invalid percent-encoding in extended parameter"))?;
        bytes.push(escape);
        index += 3;
    }

    String::from_utf8(bytes).map_err(|_| ParseError::new("extended parameter is not valid UTF-8"))
}
