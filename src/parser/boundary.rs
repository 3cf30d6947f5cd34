use http::{header, HeaderMap};

use crate::{
    error::ParseError,
    parser::headers::{split_parameters, unquote},
};

const MAX_BOUNDARY_LEN: usize = 70;

/// Extracts and validates the `boundary` parameter of a `multipart/*` `Content-Type` value.
///
/// Values that strict media-type parsing rejects, such as SOAP's unquoted
/// `type=text/xml`, are retried with a lenient parameter scan.
pub fn extract_multipart_boundary(content_type: &str) -> Result<String, ParseError> {
    let boundary = match content_type.parse::<mime::Mime>() {
        Ok(mime) => {
            ensure_multipart(&mime)?;
            mime.get_param(mime::BOUNDARY)
                .map(|value| value.as_str().to_owned())
        }
        Err(_) => lenient_boundary(content_type)?,
    };

    let boundary =
        boundary.ok_or_else(|| ParseError::new("missing multipart boundary parameter"))?;
    validate_boundary(&boundary)?;
    Ok(boundary)
}

fn lenient_boundary(content_type: &str) -> Result<Option<String>, ParseError> {
    let mut segments = split_parameters(content_type).into_iter();
    let essence = segments
        .next()
        .unwrap_or_default()
        .trim()
        .parse::<mime::Mime>()
        .map_err(|_| ParseError::new("invalid Content-Type header"))?;
    ensure_multipart(&essence)?;

    for segment in segments {
        let Some((key, raw)) = segment.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            return unquote(raw.trim()).map(Some);
        }
    }
    Ok(None)
}

fn ensure_multipart(mime: &mime::Mime) -> Result<(), ParseError> {
    if mime.type_() != mime::MULTIPART {
        return Err(ParseError::new(format!(
            "Content-Type `{}` is not a multipart media type",
            mime.essence_str()
        )));
    }
    Ok(())
}

/// Reads the boundary from the `Content-Type` entry of request headers.
pub fn boundary_from_headers(headers: &HeaderMap) -> Result<String, ParseError> {
    let value = headers
        .get(header::CONTENT_TYPE)
        .ok_or_else(|| ParseError::new("missing Content-Type header"))?;
    let value = value
        .to_str()
        .map_err(|_| ParseError::new("Content-Type header must be ASCII"))?;
    extract_multipart_boundary(value)
}

/// Checks a boundary token against the RFC 2046 grammar.
pub fn validate_boundary(boundary: &str) -> Result<(), ParseError> {
    if boundary.is_empty() {
        return Err(ParseError::new("multipart boundary cannot be empty"));
    }

    if boundary.len() > MAX_BOUNDARY_LEN {
        return Err(ParseError::new("multipart boundary cannot exceed 70 characters"));
    }

    if boundary.ends_with(' ') {
        return Err(ParseError::new("multipart boundary cannot end with whitespace"));
    }

    if !boundary.chars().all(is_boundary_char) {
        return Err(ParseError::new("multipart boundary contains invalid characters"));
    }

    Ok(())
}

fn is_boundary_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '\'' | '(' | ')' | '+' | '_' | ',' | '-' | '.' | '/' | ':' | '=' | '?' | ' '
        )
}
