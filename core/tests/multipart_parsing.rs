/*
 * multipart_parsing.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * End-to-end parsing of multipart messages through the public API: boundary
 * splitting, recursive entity parsing, registry dispatch and the
 * multipart/encrypted structural rules.
 *
 * Run with:
 *   cargo test -p busta_core --test multipart_parsing
 */

use std::cell::{Cell, RefCell};
use std::io::{self, BufReader, Read};
use std::thread;

use busta_core::config::ParserConfig;
use busta_core::mime::{
    parse_entity, parse_leaf, parse_message_bytes, split_multipart, Body, BodyContext,
    BodyRegistry, ByteSource, ContentType, EntityHead, EntityParser, Headers, MimeErrorKind,
    MultipartEncrypted, PartId, PartSource, ReaderSource, Result, SliceSource,
};

const ENCRYPTED: &[u8] = b"Content-Type: multipart/encrypted; boundary=X\r\n\r\n--X\r\nControl-Info\r\n--X\r\nEncryptedPayload\r\n--X--\r\n";

fn leaf(entity: &busta_core::mime::Entity) -> &[u8] {
    match entity.body() {
        Body::Leaf(payload) => payload,
        other => panic!("expected leaf body, got {:?}", other),
    }
}

#[test]
fn split_rejoins_to_input_bytes() {
    let bodies: [(&[u8], &str); 5] = [
        (b"--b\r\n\r\nx\r\n--b--\r\n", "b"),
        (b"preamble line 1\r\nline 2\r\n--b\r\nA: 1\r\n\r\none\r\n--b\r\n\r\ntwo\r\n\r\n--b--\r\npost\r\namble", "b"),
        (b"--b  \n\nlf only\n--b--\t\n", "b"),
        (b"--b\r\n--b\r\n--b--", "b"),
        (b"\r\n\r\n--=_x.y\r\n\r\n--=_x.y--\r\n\r\n", "=_x.y"),
    ];
    for (body, boundary) in bodies {
        let split = split_multipart(&mut SliceSource::new(body), boundary, &PartId::root(), false).unwrap();
        assert!(split.terminated);
        assert_eq!(&split.to_bytes()[..], body, "boundary {}", boundary);
    }
}

#[test]
fn bodies_without_delimiter_are_truncated() {
    let cases: [(&[u8], &str); 4] = [
        (b"", "X"),
        (b"plain text\r\n", "X"),
        (b"--Y\r\nother boundary\r\n--Y--\r\n", "X"),
        (b"- -X\r\n---X\r\n", "X"),
    ];
    for (body, boundary) in cases {
        let mut msg = format!("Content-Type: multipart/mixed; boundary={}\r\n\r\n", boundary).into_bytes();
        msg.extend_from_slice(body);
        let err = parse_message_bytes(&msg).unwrap_err();
        assert!(
            matches!(err.kind(), MimeErrorKind::TruncatedMultipart { .. }),
            "{:?}",
            err
        );
        assert_eq!(err.offset(), msg.len() as u64);
    }
}

#[test]
fn encrypted_scenario_has_two_children_and_no_pre_or_postamble() {
    let entity = parse_message_bytes(ENCRYPTED).unwrap();
    let Body::MultipartEncrypted(encrypted) = entity.body() else {
        panic!("expected multipart/encrypted, got {:?}", entity.body());
    };
    assert_eq!(encrypted.parts().len(), 2);
    assert!(encrypted.multipart().preamble().is_empty());
    assert!(encrypted.multipart().postamble().is_empty());
    assert_eq!(leaf(encrypted.control().unwrap()), b"Control-Info");
    assert_eq!(leaf(encrypted.payload().unwrap()), b"EncryptedPayload");
}

#[test]
fn encrypted_without_boundary_fails_before_scanning() {
    let msg = b"Content-Type: multipart/encrypted\r\n\r\n--X\r\nControl-Info\r\n--X\r\nEncryptedPayload\r\n--X--\r\n";
    let err = parse_message_bytes(msg).unwrap_err();
    assert!(matches!(err.kind(), MimeErrorKind::MissingBoundaryParameter));
    // reported at the start of the body: nothing was scanned
    assert_eq!(err.offset(), 37);
    assert!(err.locator.part.is_root());
}

#[test]
fn encrypted_constructor_checks_subtype_and_boundary() {
    let parser = EntityParser::default();
    let body = b"--X\r\na\r\n--X\r\nb\r\n--X--\r\n";

    let signed = ContentType::new("multipart", "signed", None).with_parameter("boundary", "X");
    let owner = EntityHead::new(PartId::root(), Headers::new(), signed.clone());
    let ctx = BodyContext::new(&parser, &owner);
    let err = MultipartEncrypted::parse(&ctx, &mut PartSource::new(&mut SliceSource::new(body))).unwrap_err();
    assert!(matches!(err.kind(), MimeErrorKind::SubtypeMismatch { .. }));

    let no_boundary = ContentType::new("multipart", "encrypted", None);
    let owner = EntityHead::new(PartId::root(), Headers::new(), no_boundary);
    let ctx = BodyContext::new(&parser, &owner);
    let err = MultipartEncrypted::parse(&ctx, &mut PartSource::new(&mut SliceSource::new(body))).unwrap_err();
    assert!(matches!(err.kind(), MimeErrorKind::MissingBoundaryParameter));

    let unsigned_no_boundary = ContentType::new("multipart", "signed", None);
    let owner = EntityHead::new(PartId::root(), Headers::new(), unsigned_no_boundary);
    let ctx = BodyContext::new(&parser, &owner);
    let err = MultipartEncrypted::parse(&ctx, &mut PartSource::new(&mut SliceSource::new(body))).unwrap_err();
    assert!(matches!(err.kind(), MimeErrorKind::MissingBoundaryParameter));
}

#[test]
fn mixed_with_preamble_keeps_order() {
    let msg = b"Content-Type: multipart/mixed; boundary=\"sep\"\r\n\r\n\
This is a multi-part message in MIME format.\r\n\
--sep\r\nContent-Type: text/plain\r\n\r\nfirst\r\n\
--sep\r\nContent-Type: text/html\r\n\r\n<p>second</p>\r\n\
--sep\r\nContent-Type: application/octet-stream\r\n\r\nthird\r\n\
--sep--\r\n";
    let entity = parse_message_bytes(msg).unwrap();
    let Body::Multipart(multipart) = entity.body() else {
        panic!("expected generic multipart");
    };
    assert_eq!(&multipart.preamble()[..], b"This is a multi-part message in MIME format.");
    assert!(multipart.postamble().is_empty());
    let bodies: Vec<&[u8]> = multipart.parts().iter().map(leaf).collect();
    assert_eq!(bodies, vec![&b"first"[..], &b"<p>second</p>"[..], &b"third"[..]]);
    let types: Vec<String> = multipart
        .parts()
        .iter()
        .map(|p| p.content_type().type_with_subtype())
        .collect();
    assert_eq!(types, vec!["text/plain", "text/html", "application/octet-stream"]);
}

#[test]
fn nested_alternative_inside_mixed() {
    let msg = b"Content-Type: multipart/mixed; boundary=outer\r\n\r\n\
--outer\r\n\r\nintro\r\n\
--outer\r\nContent-Type: multipart/alternative; boundary=inner\r\n\r\n\
--inner\r\nContent-Type: text/plain\r\n\r\nplain\r\n\
--inner\r\nContent-Type: text/html\r\n\r\n<b>html</b>\r\n\
--inner--\r\n\
--outer--\r\n";
    let root = parse_message_bytes(msg).unwrap();
    assert_eq!(root.children().len(), 2);

    let first = &root.children()[0];
    assert!(first.content_type().is_mime_type("text", "plain"));
    assert_eq!(first.owner(), Some(PartId::root()));

    let alternative = &root.children()[1];
    assert!(matches!(alternative.body(), Body::Multipart(_)));
    assert_eq!(alternative.part_id().to_string(), "2");
    assert_eq!(alternative.owner(), Some(PartId::root()));
    assert_eq!(alternative.children().len(), 2);

    for (i, child) in alternative.children().iter().enumerate() {
        assert_eq!(child.part_id(), &PartId::root().child(2).child(i + 1));
        let owner = root.find(&child.owner().unwrap()).unwrap();
        assert_eq!(owner, alternative);
    }
    assert_eq!(leaf(&alternative.children()[1]), b"<b>html</b>");
}

#[test]
fn reader_source_streams_the_top_level() {
    let mut msg = Vec::new();
    msg.extend_from_slice(b"Content-Type: multipart/mixed; boundary=big\r\n\r\n");
    for i in 0..200 {
        msg.extend_from_slice(format!("--big\r\nX-Index: {}\r\n\r\n", i).as_bytes());
        msg.extend_from_slice(&vec![b'a'; 500]);
        msg.extend_from_slice(b"\r\n");
    }
    msg.extend_from_slice(b"--big--\r\n");
    let config = ParserConfig::default();
    let mut source = config.reader_source(&msg[..]).with_len(msg.len() as u64);
    let entity = EntityParser::new(config)
        .parse(&mut source, &ContentType::text_plain())
        .unwrap();
    assert_eq!(entity.children().len(), 200);
    assert_eq!(entity.children()[199].headers().get("x-index"), Some("199"));
    assert_eq!(source.remaining_len(), Some(0));
}

#[test]
fn over_long_line_is_a_body_error() {
    let config = ParserConfig {
        max_line_length: 64,
        ..ParserConfig::default()
    };
    let mut msg = b"Content-Type: text/plain\r\n\r\n".to_vec();
    msg.extend_from_slice(&vec![b'z'; 200]);
    let mut source = config.reader_source(&msg[..]);
    let err = EntityParser::new(config)
        .parse(&mut source, &ContentType::text_plain())
        .unwrap_err();
    assert!(matches!(err.kind(), MimeErrorKind::BodyParse(_)));
}

fn parse_signed_as_encrypted(ctx: &BodyContext<'_>, source: &mut PartSource<'_>) -> Result<Body> {
    MultipartEncrypted::parse(ctx, source).map(Body::MultipartEncrypted)
}

#[test]
fn registry_is_open_for_extension() {
    let mut registry = BodyRegistry::default();
    registry.register("multipart/signed", parse_signed_as_encrypted);
    let parser = EntityParser::with_registry(registry, ParserConfig::default());
    let msg = b"Content-Type: multipart/signed; boundary=s\r\n\r\n--s\r\n\r\nsigned\r\n--s\r\n\r\nsig\r\n--s--\r\n";
    let err = parser
        .parse(&mut SliceSource::new(msg), &ContentType::text_plain())
        .unwrap_err();
    assert!(matches!(err.kind(), MimeErrorKind::SubtypeMismatch { .. }));

    // the default registry treats it as a generic multipart
    let entity = parse_message_bytes(msg).unwrap();
    assert!(matches!(entity.body(), Body::Multipart(_)));
}

#[test]
fn config_policies_drive_the_parse() {
    let config = ParserConfig::from_xml(
        "<parser><allow-unterminated-multipart>true</allow-unterminated-multipart>\
         <require-two-encrypted-parts>false</require-two-encrypted-parts></parser>",
    )
    .unwrap();
    let parser = EntityParser::new(config);
    let msg = b"Content-Type: multipart/encrypted; boundary=X\r\n\r\n--X\r\nonly part\r\n";
    let entity = parser
        .parse(&mut SliceSource::new(msg), &ContentType::text_plain())
        .unwrap();
    assert_eq!(entity.children().len(), 1);
    assert_eq!(leaf(&entity.children()[0]), b"only part\r\n");

    let err = parse_message_bytes(msg).unwrap_err();
    assert!(matches!(err.kind(), MimeErrorKind::TruncatedMultipart { .. }));
}

#[test]
fn parsed_entities_are_shareable_across_threads() {
    let entity = parse_entity(&mut SliceSource::new(ENCRYPTED), &ContentType::text_plain()).unwrap();
    thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| entity.children().len()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }
    });
    // independent parses need no coordination
    let counts: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| parse_message_bytes(ENCRYPTED).unwrap().children().len()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(counts, vec![2; 4]);
}

#[test]
fn reader_and_slice_sources_agree() {
    let from_slice = parse_message_bytes(ENCRYPTED).unwrap();
    let mut reader = ReaderSource::new(ENCRYPTED);
    let from_reader = parse_entity(&mut reader, &ContentType::text_plain()).unwrap();
    assert_eq!(from_slice, from_reader);
}

/// `depth` nested multipart/mixed levels around one application/x-payload leaf.
fn nested_message(depth: usize, payload: &[u8]) -> Vec<u8> {
    let mut msg = Vec::new();
    for level in 0..depth {
        msg.extend_from_slice(
            format!(
                "Content-Type: multipart/mixed; boundary=\"level-{0}\"\r\n\r\n--level-{0}\r\n",
                level
            )
            .as_bytes(),
        );
    }
    msg.extend_from_slice(b"Content-Type: application/x-payload\r\n\r\n");
    msg.extend_from_slice(payload);
    for level in (0..depth).rev() {
        msg.extend_from_slice(format!("\r\n--level-{}--", level).as_bytes());
    }
    msg.extend_from_slice(b"\r\n");
    msg
}

fn innermost(depth: usize) -> PartId {
    PartId::from(&vec![1; depth][..])
}

const DEEP_STACK_SIZE: usize = 8 * 1024 * 1024;

fn with_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    thread::Builder::new()
        .stack_size(DEEP_STACK_SIZE)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

thread_local! {
    static CONSUMED: Cell<u64> = const { Cell::new(0) };
    static EXAMINED: Cell<u64> = const { Cell::new(0) };
    static UNREAD_AT_PAYLOAD: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Counts bytes consumed and bytes examined (peeked or consumed).
struct CountingSource<'a> {
    inner: SliceSource<'a>,
}

impl ByteSource for CountingSource<'_> {
    fn read_line(&mut self) -> io::Result<Option<&[u8]>> {
        let line = self.inner.read_line()?;
        if let Some(line) = line {
            let len = line.len() as u64;
            CONSUMED.with(|c| c.set(c.get() + len));
            EXAMINED.with(|c| c.set(c.get() + len));
        }
        Ok(line)
    }

    fn peek_line(&mut self) -> io::Result<Option<&[u8]>> {
        let line = self.inner.peek_line()?;
        if let Some(line) = line {
            let len = line.len() as u64;
            EXAMINED.with(|c| c.set(c.get() + len));
        }
        Ok(line)
    }

    fn remaining_len(&self) -> Option<u64> {
        self.inner.remaining_len()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }
}

/// Leaf constructor that notes how far the underlying stream has been consumed
/// beyond the start of the payload.
fn parse_noting_read_ahead(ctx: &BodyContext<'_>, source: &mut PartSource<'_>) -> Result<Body> {
    let consumed = CONSUMED.with(Cell::get);
    UNREAD_AT_PAYLOAD.with(|v| v.borrow_mut().push(consumed - source.position()));
    parse_leaf(ctx, source)
}

#[test]
fn each_byte_is_read_once_whatever_the_depth() {
    with_stack(|| {
        let payload = vec!["0123456789abcdef0123456789abcdef"; 4000].join("\r\n");
        let mut registry = BodyRegistry::default();
        registry.register("application/x-payload", parse_noting_read_ahead);
        let parser = EntityParser::with_registry(registry, ParserConfig::default());

        for depth in [1, 32, 200] {
            let msg = nested_message(depth, payload.as_bytes());
            CONSUMED.with(|c| c.set(0));
            EXAMINED.with(|c| c.set(0));
            let mut source = CountingSource {
                inner: SliceSource::new(&msg),
            };
            let entity = parser
                .parse(&mut source, &ContentType::text_plain())
                .unwrap();

            // the payload is parsed off the stream, not from a copy of its ancestors
            assert_eq!(UNREAD_AT_PAYLOAD.with(|v| v.take()), vec![0], "depth {}", depth);
            assert_eq!(CONSUMED.with(Cell::get), msg.len() as u64, "depth {}", depth);
            let examined = EXAMINED.with(Cell::get);
            assert!(
                examined <= 6 * msg.len() as u64,
                "depth {}: examined {} bytes of {}",
                depth,
                examined,
                msg.len()
            );

            let leaf = entity.find(&innermost(depth)).unwrap();
            assert_eq!(leaf.body().as_leaf().map(|b| &b[..]), Some(payload.as_bytes()));
        }
    });
}

#[test]
fn default_depth_limit_on_bounded_stack() {
    let limit = ParserConfig::default().max_depth;
    with_stack(move || {
        let msg = nested_message(limit, b"deepest");
        let entity = parse_message_bytes(&msg).unwrap();
        let leaf = entity.find(&innermost(limit)).unwrap();
        assert_eq!(leaf.body().as_leaf().map(|b| &b[..]), Some(&b"deepest"[..]));

        let err = parse_message_bytes(&nested_message(limit + 1, b"deepest")).unwrap_err();
        assert!(matches!(err.kind(), MimeErrorKind::NestingTooDeep { limit: 256 }));
        assert_eq!(err.locator.part.depth(), limit + 1);
    });
}

/// Serves `data` once, then fails like a dropped connection.
struct DroppedConnection {
    data: &'static [u8],
    served: bool,
}

impl Read for DroppedConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.served {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        self.served = true;
        let n = self.data.len().min(buf.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        Ok(n)
    }
}

#[test]
fn reader_failure_is_an_io_error() {
    let data: &'static [u8] = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n--b\r\n\r\npartial";
    let reader = BufReader::new(DroppedConnection { data, served: false });
    let err = parse_entity(&mut ReaderSource::new(reader), &ContentType::text_plain()).unwrap_err();
    assert!(matches!(err.kind(), MimeErrorKind::Io(e) if e.kind() == io::ErrorKind::ConnectionReset));
    assert_eq!(err.locator.part.to_string(), "1");
    assert_eq!(err.offset(), (data.len() - b"partial".len()) as u64);
}
