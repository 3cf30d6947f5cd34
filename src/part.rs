use std::borrow::Cow;

use bytes::Bytes;

use crate::{
    error::{DecodeError, ParseError, StorageError},
    parser::headers::{parse_content_disposition, ContentDisposition, Headers},
    storage::Entity,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_TRANSFER_ENCODING: &str = "binary";

/// One decoded multipart section: its headers and the entity holding its body.
///
/// Parts only exist once a complete header block was read. A part whose body or
/// terminating delimiter was cut short by end of input is still returned, with
/// [`Part::is_partial`] set.
#[derive(Debug)]
pub struct Part {
    index: usize,
    headers: Headers,
    entity: Entity,
    is_partial: bool,
}

impl Part {
    pub(crate) fn new(index: usize, headers: Headers, entity: Entity, is_partial: bool) -> Self {
        Self {
            index,
            headers,
            entity,
            is_partial,
        }
    }

    /// Zero-based position of the part in the message.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the part headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the first value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns every value of header `name`, in wire order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.get_all(name)
    }

    /// `Content-ID` without its angle brackets, or the part index when absent.
    pub fn content_id(&self) -> Cow<'_, str> {
        match self.headers.get("content-id") {
            Some(id) => {
                let id = id.trim();
                let id = id
                    .strip_prefix('<')
                    .and_then(|inner| inner.strip_suffix('>'))
                    .unwrap_or(id);
                Cow::Borrowed(id)
            }
            None => Cow::Owned(self.index.to_string()),
        }
    }

    /// Raw `Content-Type` value, defaulting to `application/octet-stream`.
    pub fn content_type(&self) -> &str {
        self.headers
            .get("content-type")
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Parsed `Content-Type`, or `None` when the value is not a valid media type.
    pub fn mime(&self) -> Option<mime::Mime> {
        self.content_type().parse().ok()
    }

    /// `Content-Transfer-Encoding` value, defaulting to `binary`.
    pub fn content_transfer_encoding(&self) -> &str {
        self.headers
            .get("content-transfer-encoding")
            .map(str::trim)
            .unwrap_or(DEFAULT_TRANSFER_ENCODING)
    }

    /// Parsed `Content-Disposition`, if present and well formed.
    pub fn content_disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .and_then(|value| parse_content_disposition(value).ok())
    }

    /// Returns `true` when input ended before this part was confirmed complete.
    pub fn is_partial(&self) -> bool {
        self.is_partial
    }

    /// Returns the body storage.
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Returns the body storage mutably, e.g. for [`Entity::move_to`].
    pub fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    /// Consumes the part, keeping only its body storage.
    pub fn into_entity(self) -> Entity {
        self.entity
    }

    /// Reads the whole decoded body.
    pub fn bytes(&self) -> Result<Bytes, StorageError> {
        self.entity.to_bytes()
    }

    /// Reads the whole decoded body as UTF-8 text.
    pub fn text(&self) -> Result<String, DecodeError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ParseError::new("part body is not valid UTF-8").into())
    }

    /// Releases the body storage, deleting any spool file.
    pub fn release(&mut self) -> Result<(), StorageError> {
        self.entity.release()
    }
}
