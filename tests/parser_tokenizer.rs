#![allow(missing_docs)]

use bytes::Bytes;
use multigear_partial::{Event, Step, Tokenizer, TruncationPoint};

#[test]
fn tokenizes_complete_message_into_events() {
    let body = concat!(
        "preamble text\r\n",
        "--XBOUND\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "one\r\n",
        "--XBOUND  \r\n",
        "\r\n",
        "two\r\n",
        "--XBOUND--\r\n",
        "epilogue"
    );

    let mut tokenizer = Tokenizer::new("XBOUND").expect("boundary should be valid");
    tokenizer.push(body.as_bytes());
    tokenizer.close();
    let events = drain(&mut tokenizer);

    assert_eq!(events.len(), 7);
    assert_eq!(events[0], delimiter(false, false));
    match &events[1] {
        Event::Headers {
            headers,
            is_partial,
        } => {
            assert_eq!(headers.get("content-type"), Some("text/plain"));
            assert!(!is_partial);
        }
        other => panic!("expected headers, got {other:?}"),
    }
    assert_eq!(events[2], content("one", false));
    assert_eq!(events[3], delimiter(false, false));
    assert!(matches!(&events[4], Event::Headers { headers, .. } if headers.is_empty()));
    assert_eq!(events[5], content("two", false));
    assert_eq!(events[6], delimiter(true, false));

    assert!(tokenizer.is_closed());
    assert!(tokenizer.is_done());
    assert_eq!(tokenizer.truncation(), None);
}

#[test]
fn byte_by_byte_input_produces_same_body() {
    let body = concat!(
        "--B\r\n",
        "Content-Type: application/octet-stream\r\n",
        "\r\n",
        "line one\r\n--not-the-boundary\r\n-B\r\nend\r\n",
        "--B--\r\n"
    );

    let mut tokenizer = Tokenizer::new("B").expect("boundary should be valid");
    let mut collected = Vec::new();
    let mut closed = false;
    for byte in body.as_bytes() {
        tokenizer.push(std::slice::from_ref(byte));
        loop {
            match tokenizer.next_event().expect("stream should parse") {
                Step::Emit(Event::Content { data, .. }) => collected.extend_from_slice(&data),
                Step::Emit(Event::Delimiter { closing: true, .. }) => closed = true,
                Step::Emit(_) => {}
                Step::NeedMore | Step::Done => break,
            }
        }
    }

    assert!(closed);
    assert_eq!(
        collected,
        b"line one\r\n--not-the-boundary\r\n-B\r\nend".to_vec()
    );
}

#[test]
fn accepts_lf_only_line_breaks() {
    let body = "--B\nContent-ID: <x>\n\nhello\n--B--\n";
    let mut tokenizer = Tokenizer::new("B").expect("boundary should be valid");
    tokenizer.push(body.as_bytes());
    tokenizer.close();
    let events = drain(&mut tokenizer);

    assert_eq!(events[2], content("hello", false));
    assert_eq!(events[3], delimiter(true, false));
}

#[test]
fn truncated_body_emits_partial_content() {
    let body = "--B\r\nContent-Type: text/plain\r\n\r\nhalf a bo";
    let events = tokenize_all("B", body);

    assert_eq!(events[2], content("half a bo", true));
    assert_eq!(events[3], Event::EndOfInput);
}

#[test]
fn truncated_header_block_emits_no_headers() {
    let body = "--B\r\nContent-Type: text/pl";
    let mut tokenizer = Tokenizer::new("B").expect("boundary should be valid");
    tokenizer.push(body.as_bytes());
    tokenizer.close();
    let events = drain(&mut tokenizer);

    assert_eq!(events, vec![delimiter(false, false), Event::EndOfInput]);
    assert_eq!(tokenizer.truncation(), Some(TruncationPoint::Headers));
}

#[test]
fn headers_at_end_of_input_are_flagged_partial() {
    let events = tokenize_all("B", "--B\r\nContent-Type: text/plain\r\n\r\n");
    assert!(matches!(
        events[1],
        Event::Headers {
            is_partial: true,
            ..
        }
    ));
    assert_eq!(events[2], content("", true));
}

#[test]
fn truncated_closing_delimiter_is_stripped_from_body() {
    for cut in ["\r\n--", "\r\n--B", "\r\n--BOU"] {
        let body = format!("--BOUND\r\n\r\npayload{cut}");
        let mut tokenizer = Tokenizer::new("BOUND").expect("boundary should be valid");
        tokenizer.push(body.as_bytes());
        tokenizer.close();
        let events = drain(&mut tokenizer);

        assert_eq!(events[2], content("payload", true), "cut at {cut:?}");
        assert_eq!(tokenizer.truncation(), Some(TruncationPoint::Delimiter));
    }
}

#[test]
fn bare_trailing_line_break_stays_in_body() {
    let events = tokenize_all("BOUND", "--BOUND\r\n\r\npayload\r\n-");
    assert_eq!(events[2], content("payload\r\n-", true));
}

#[test]
fn fully_matched_delimiter_without_line_break_is_partial() {
    let events = tokenize_all("BOUND", "--BOUND\r\n\r\none\r\n--BOUND");
    assert_eq!(events[2], content("one", false));
    assert_eq!(events[3], delimiter(false, true));
    assert_eq!(events[4], Event::EndOfInput);

    let events = tokenize_all("BOUND", "--BOUND\r\n\r\none\r\n--BOUND-");
    assert_eq!(events[3], delimiter(true, true));
}

#[test]
fn closing_delimiter_without_trailing_line_break_is_confirmed() {
    let mut tokenizer = Tokenizer::new("BOUND").expect("boundary should be valid");
    tokenizer.push(b"--BOUND\r\n\r\none\r\n--BOUND--");
    tokenizer.close();
    let events = drain(&mut tokenizer);

    assert_eq!(events.last(), Some(&delimiter(true, false)));
    assert!(tokenizer.is_closed());
}

#[test]
fn rejects_garbage_after_boundary() {
    let mut tokenizer = Tokenizer::new("BOUND").expect("boundary should be valid");
    tokenizer.push(b"--BOUND\r\n\r\none\r\n--BOUNDARY\r\n\r\ntwo");
    tokenizer.close();

    let mut result = Ok(Step::NeedMore);
    for _ in 0..8 {
        result = tokenizer.next_event();
        if result.is_err() {
            break;
        }
    }
    let err = result.expect_err("malformed delimiter must fail");
    assert!(err.to_string().contains("malformed multipart boundary"));
    assert_eq!(tokenizer.next_event().expect("done after failure"), Step::Done);
}

#[test]
fn decodes_base64_bodies_incrementally() {
    let body = concat!(
        "--B\r\n",
        "Content-Transfer-Encoding: BASE64\r\n",
        "\r\n",
        "aGVsbG8g\r\nd29ybGQ=\r\n",
        "--B--\r\n"
    );
    let events = tokenize_all("B", body);
    assert_eq!(collect_content(&events), b"hello world".to_vec());
}

#[test]
fn waits_for_more_input_instead_of_guessing() {
    let mut tokenizer = Tokenizer::new("BOUND").expect("boundary should be valid");
    tokenizer.push(b"--BOU");
    assert_eq!(tokenizer.next_event().expect("no error"), Step::NeedMore);

    tokenizer.push(b"ND\r\nContent-Type: text/plain\r\n");
    assert_eq!(
        tokenizer.next_event().expect("no error"),
        Step::Emit(delimiter(false, false))
    );
    assert_eq!(tokenizer.next_event().expect("no error"), Step::NeedMore);
    assert!(tokenizer.buffered() > 0);
}

#[test]
fn rejects_invalid_boundary() {
    assert!(Tokenizer::new("").is_err());
    assert!(Tokenizer::new("bad\r\nboundary").is_err());
}

fn tokenize_all(boundary: &str, body: &str) -> Vec<Event> {
    let mut tokenizer = Tokenizer::new(boundary).expect("boundary should be valid");
    tokenizer.push(body.as_bytes());
    tokenizer.close();
    drain(&mut tokenizer)
}

fn drain(tokenizer: &mut Tokenizer) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match tokenizer.next_event().expect("stream should parse") {
            Step::Emit(event) => events.push(event),
            Step::Done => return events,
            Step::NeedMore => panic!("closed tokenizer asked for more input"),
        }
    }
}

fn collect_content(events: &[Event]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Content { data, .. } => Some(data.to_vec()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn content(data: &'static str, is_partial: bool) -> Event {
    Event::Content {
        data: Bytes::from_static(data.as_bytes()),
        is_partial,
    }
}

fn delimiter(closing: bool, is_partial: bool) -> Event {
    Event::Delimiter {
        closing,
        is_partial,
    }
}
