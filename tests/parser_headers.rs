#![allow(missing_docs)]

use multigear_partial::parser::headers::{
    Headers, parse_content_disposition, parse_header_block,
};

#[test]
fn parses_crlf_header_block_in_order() {
    let headers = parse_header_block(
        b"Content-Type: text/plain\r\nX-Trace: one\r\nx-trace: two\r\nContent-ID: <a@b>\r\n",
    )
    .expect("headers should parse");

    assert_eq!(headers.len(), 4);
    assert_eq!(headers.get("content-type"), Some("text/plain"));
    assert_eq!(
        headers.get_all("X-TRACE").collect::<Vec<_>>(),
        vec!["one", "two"]
    );
    let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["Content-Type", "X-Trace", "x-trace", "Content-ID"]);
}

#[test]
fn accepts_bare_lf_line_breaks() {
    let headers = parse_header_block(b"Content-Type: text/xml\nContent-ID: <root>\n")
        .expect("LF-only headers should parse");
    assert_eq!(headers.get("Content-Type"), Some("text/xml"));
    assert_eq!(headers.get("content-id"), Some("<root>"));
}

#[test]
fn unfolds_continuation_lines() {
    let headers = parse_header_block(
        b"Content-Type: multipart/related;\r\n\ttype=\"text/xml\";\r\n  start=\"<root>\"\r\n",
    )
    .expect("folded headers should parse");
    assert_eq!(
        headers.get("content-type"),
        Some("multipart/related; type=\"text/xml\"; start=\"<root>\"")
    );
}

#[test]
fn rejects_line_without_colon() {
    let err = parse_header_block(b"Content-Type text/plain\r\n").expect_err("must fail");
    assert!(err.to_string().contains("invalid part header line"));
}

#[test]
fn rejects_invalid_header_name() {
    let err = parse_header_block(b"Bad Name: value\r\n").expect_err("must fail");
    assert!(err.to_string().contains("invalid part header name"));
}

#[test]
fn rejects_leading_continuation_line() {
    let err = parse_header_block(b" folded: value\r\n").expect_err("must fail");
    assert!(err.to_string().contains("continuation"));
}

#[test]
fn non_utf8_block_is_read_as_latin1() {
    let headers = parse_header_block(
        b"Content-Disposition: attachment; filename=\"r\xe9sum\xe9.txt\"\r\nX-Raw: \xff\r\n",
    )
    .expect("8-bit headers should parse");

    assert_eq!(headers.get("x-raw"), Some("\u{ff}"));
    let disposition = parse_content_disposition(
        headers.get("content-disposition").expect("disposition header"),
    )
    .expect("disposition should parse");
    assert_eq!(disposition.filename.as_deref(), Some("résumé.txt"));
}

#[test]
fn get_outlives_the_lookup_name() {
    let headers = parse_header_block(b"Content-ID: <root>\r\n").expect("headers should parse");
    let value = {
        let name = String::from("content-id");
        headers.get(&name)
    };
    assert_eq!(value, Some("<root>"));
}

#[test]
fn empty_block_has_no_headers() {
    let headers = parse_header_block(b"").expect("empty block should parse");
    assert!(headers.is_empty());
    assert_eq!(headers, Headers::new());
}

#[test]
fn parses_form_data_disposition() {
    let disposition =
        parse_content_disposition("form-data; name=\"avatar\"; filename=\"me \\\"x\\\".png\"")
            .expect("disposition should parse");
    assert_eq!(disposition.disposition, "form-data");
    assert_eq!(disposition.name.as_deref(), Some("avatar"));
    assert_eq!(disposition.filename.as_deref(), Some("me \"x\".png"));
}

#[test]
fn prefers_extended_filename() {
    let disposition = parse_content_disposition(
        "Attachment; filename=\"fallback.txt\"; filename*=UTF-8''r%C3%A9sum%C3%A9.txt",
    )
    .expect("disposition should parse");
    assert_eq!(disposition.disposition, "attachment");
    assert_eq!(disposition.name, None);
    assert_eq!(disposition.filename.as_deref(), Some("résumé.txt"));
}

#[test]
fn rejects_malformed_disposition_parameters() {
    assert!(parse_content_disposition("").is_err());
    assert!(parse_content_disposition("form-data; name").is_err());
    assert!(parse_content_disposition("form-data; name=\"open").is_err());
    assert!(parse_content_disposition("attachment; filename*=latin1''x").is_err());
}
