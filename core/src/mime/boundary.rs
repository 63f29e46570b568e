/*
 * boundary.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Busta, a MIME multipart parsing library.
 *
 * Busta is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Busta is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Busta.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Multipart boundary scanner (RFC 2046 §5.1.1).
//!
//! One forward pass over the source serves every nesting level. `PartSource` tracks
//! the boundaries of all open multiparts and stops at a delimiter line of any of them,
//! so a child entity is parsed straight off the stream and each byte is read once,
//! whatever the depth. The line break before a delimiter line belongs to the
//! delimiter, so segments never end with it.

use std::collections::HashMap;
use std::io;

use bytes::{Bytes, BytesMut};
use tracing::{trace, warn};

use super::error::{MimeErrorKind, MimeParseError, Result};
use super::part_id::PartId;
use super::source::ByteSource;
use super::utils::{is_wsp, line_ending_len, trim_crlf, trim_trailing_wsp};

/// Upper bound on buffer preallocation. Length hints may come from untrusted metadata.
const MAX_PREALLOC: u64 = 64 * 1024;

/// Kind of delimiter line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `--boundary`
    Open,
    /// `--boundary--`
    Close,
}

/// Classify a line (without its line ending) against `boundary`.
///
/// Trailing transport padding (SP/HTAB) is allowed after both forms.
pub fn match_delimiter(line: &[u8], boundary: impl AsRef<[u8]>) -> Option<Delimiter> {
    let rest = line.strip_prefix(b"--")?.strip_prefix(boundary.as_ref())?;
    let (kind, padding) = match rest.strip_prefix(b"--") {
        Some(padding) => (Delimiter::Close, padding),
        None => (Delimiter::Open, rest),
    };
    padding.iter().all(|&c| is_wsp(c)).then_some(kind)
}

/// A delimiter line the source stopped in front of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stop {
    level: usize,
    kind: Delimiter,
}

/// View of a byte source that ends at the next delimiter of any open multipart.
///
/// Multipart constructors open a level with `push_boundary`, let each child read the
/// source until it reports end of stream, consume the delimiter with `take_delimiter`
/// and close the level with `pop_boundary`. Children share the view; nothing is copied
/// or rescanned per level.
pub struct PartSource<'s> {
    inner: &'s mut dyn ByteSource,
    /// Boundary (trailing WSP removed) to the innermost open level using it.
    levels: HashMap<Vec<u8>, usize>,
    /// Open levels, outermost first, with the level each one shadowed.
    open: Vec<(Vec<u8>, Option<usize>)>,
    /// Cached classification of the next line.
    stop: Option<Stop>,
    /// Line ending of the last consumed line, claimed by a following delimiter.
    last_break: &'static [u8],
}

impl<'s> PartSource<'s> {
    pub fn new(inner: &'s mut dyn ByteSource) -> Self {
        Self {
            inner,
            levels: HashMap::new(),
            open: Vec::new(),
            stop: None,
            last_break: b"",
        }
    }

    /// Number of open multipart levels.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Open a multipart level. Its delimiters now end the readable data.
    pub fn push_boundary(&mut self, boundary: &str) {
        let key = trim_trailing_wsp(boundary.as_bytes()).to_vec();
        let level = self.open.len();
        let shadowed = self.levels.insert(key.clone(), level);
        self.open.push((key, shadowed));
        self.stop = None;
        self.last_break = b"";
    }

    /// Close the innermost level.
    pub fn pop_boundary(&mut self) {
        if let Some((key, shadowed)) = self.open.pop() {
            match shadowed {
                Some(level) => self.levels.insert(key, level),
                None => self.levels.remove(&key),
            };
        }
        self.stop = None;
    }

    /// True when the last `read_line` or `peek_line` returned None because a delimiter
    /// follows, rather than because the stream ended.
    pub fn at_delimiter(&self) -> bool {
        self.stop.is_some()
    }

    /// Consume the delimiter line in front of the source if it belongs to the innermost
    /// level. Returns its kind and raw bytes, the preceding line break included.
    pub fn take_delimiter(&mut self) -> io::Result<Option<(Delimiter, Bytes)>> {
        let Some(stop) = self.next_stop()? else {
            return Ok(None);
        };
        if stop.level + 1 != self.open.len() {
            return Ok(None);
        }
        let Some(line) = self.inner.read_line()? else {
            return Ok(None);
        };
        let mut raw = BytesMut::with_capacity(self.last_break.len() + line.len());
        raw.extend_from_slice(self.last_break);
        raw.extend_from_slice(line);
        self.last_break = b"";
        self.stop = None;
        Ok(Some((stop.kind, raw.freeze())))
    }

    fn next_stop(&mut self) -> io::Result<Option<Stop>> {
        if self.stop.is_none() && !self.levels.is_empty() {
            if let Some(line) = self.inner.peek_line()? {
                self.stop = classify(&self.levels, line);
            }
        }
        Ok(self.stop)
    }
}

impl ByteSource for PartSource<'_> {
    fn read_line(&mut self) -> io::Result<Option<&[u8]>> {
        if self.next_stop()?.is_some() {
            return Ok(None);
        }
        let line = self.inner.read_line()?;
        if let Some(line) = line {
            self.last_break = line_break(line);
        }
        Ok(line)
    }

    fn peek_line(&mut self) -> io::Result<Option<&[u8]>> {
        if self.next_stop()?.is_some() {
            return Ok(None);
        }
        self.inner.peek_line()
    }

    /// Only known outside any multipart: a part's length is not known before its end.
    fn remaining_len(&self) -> Option<u64> {
        if self.open.is_empty() {
            self.inner.remaining_len()
        } else {
            None
        }
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }
}

/// Delimiter of the innermost open level matching `line`, if any. Two hash lookups
/// per line, independent of the number of open levels.
fn classify(levels: &HashMap<Vec<u8>, usize>, line: &[u8]) -> Option<Stop> {
    let text = trim_crlf(line);
    let rest = trim_trailing_wsp(text).strip_prefix(b"--")?;
    [Some(rest), rest.strip_suffix(b"--")]
        .into_iter()
        .flatten()
        .filter_map(|candidate| {
            let (key, &level) = levels.get_key_value(candidate)?;
            let kind = match_delimiter(text, key)?;
            Some(Stop { level, kind })
        })
        .max_by_key(|stop| stop.level)
}

fn line_break(line: &[u8]) -> &'static [u8] {
    match line_ending_len(line) {
        2 => b"\r\n",
        1 if line.ends_with(b"\n") => b"\n",
        1 => b"\r",
        _ => b"",
    }
}

/// One part segment: the bytes strictly between two delimiter lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Absolute offset of the first byte in the top-level stream.
    pub offset: u64,
    pub bytes: Bytes,
}

/// Result of splitting a multipart body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartSplit {
    pub preamble: Bytes,
    /// Raw delimiter lines in document order, each with the line break preceding it
    /// (if any) and its own line ending.
    pub delimiters: Vec<Bytes>,
    pub segments: Vec<Segment>,
    pub postamble: Bytes,
    /// False only when an unterminated body was accepted leniently.
    pub terminated: bool,
}

impl MultipartSplit {
    /// Rejoin preamble, delimiters, segments and postamble into the scanned bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        out.extend_from_slice(&self.preamble);
        let mut segments = self.segments.iter();
        for delimiter in &self.delimiters {
            out.extend_from_slice(delimiter);
            if let Some(segment) = segments.next() {
                out.extend_from_slice(&segment.bytes);
            }
        }
        // an unterminated split has one more segment than delimiters
        for segment in segments {
            out.extend_from_slice(&segment.bytes);
        }
        out.extend_from_slice(&self.postamble);
        out.freeze()
    }
}

/// Framing of one scanned multipart level; the parts went to the per-part callback.
#[derive(Debug, Default)]
pub(crate) struct Framing {
    pub preamble: Bytes,
    pub delimiters: Vec<Bytes>,
    pub postamble: Bytes,
    pub terminated: bool,
}

/// Scan one multipart level of `source` on `boundary`.
///
/// `on_part` is called at the first byte of each part with the part's 1-based index and
/// reads the part from the source; whatever it leaves unread is skipped. Fails with
/// `TruncatedMultipart` when the data ends (end of stream or an enclosing delimiter)
/// before the closing delimiter, unless `allow_unterminated` is set and at least one
/// opening delimiter was seen.
pub(crate) fn scan<F>(
    source: &mut PartSource<'_>,
    boundary: &str,
    part: &PartId,
    allow_unterminated: bool,
    on_part: F,
) -> Result<Framing>
where
    F: FnMut(&mut PartSource<'_>, usize) -> Result<()>,
{
    source.push_boundary(boundary);
    let framing = scan_level(source, boundary, part, allow_unterminated, on_part);
    source.pop_boundary();
    framing
}

fn scan_level<F>(
    source: &mut PartSource<'_>,
    boundary: &str,
    part: &PartId,
    allow_unterminated: bool,
    mut on_part: F,
) -> Result<Framing>
where
    F: FnMut(&mut PartSource<'_>, usize) -> Result<()>,
{
    let mut framing = Framing {
        preamble: read_segment(source, part)?,
        ..Framing::default()
    };
    let Some(mut kind) = take_delimiter(source, part, &mut framing)? else {
        return Err(truncated(source, boundary, part));
    };
    let mut index = 0;
    while kind == Delimiter::Open {
        index += 1;
        on_part(source, index)?;
        skip_segment(source, part)?;
        kind = match take_delimiter(source, part, &mut framing)? {
            Some(kind) => kind,
            None if allow_unterminated => {
                warn!("part {}: multipart body ended without --{}--, accepting last part", part, boundary);
                return Ok(framing);
            }
            None => return Err(truncated(source, boundary, part)),
        };
    }
    framing.postamble = read_segment(source, part)?;
    framing.terminated = true;
    Ok(framing)
}

fn take_delimiter(
    source: &mut PartSource<'_>,
    part: &PartId,
    framing: &mut Framing,
) -> Result<Option<Delimiter>> {
    let offset = source.position();
    let taken = source
        .take_delimiter()
        .map_err(|e| MimeParseError::from_io(e, offset, part))?;
    Ok(taken.map(|(kind, raw)| {
        trace!("part {}: {:?} delimiter at offset {}", part, kind, offset);
        framing.delimiters.push(raw);
        kind
    }))
}

fn truncated(source: &PartSource<'_>, boundary: &str, part: &PartId) -> MimeParseError {
    MimeParseError::new(
        MimeErrorKind::TruncatedMultipart {
            boundary: boundary.to_string(),
        },
        source.position(),
        part,
    )
}

/// Split the multipart body in `source` on `boundary`, keeping every segment as bytes.
///
/// Fails with `TruncatedMultipart` when the stream ends before the closing delimiter,
/// unless `allow_unterminated` is set and at least one opening delimiter was seen.
pub fn split(
    source: &mut dyn ByteSource,
    boundary: &str,
    part: &PartId,
    allow_unterminated: bool,
) -> Result<MultipartSplit> {
    let mut source = PartSource::new(source);
    let mut segments = Vec::new();
    let framing = scan(&mut source, boundary, part, allow_unterminated, |source, _| {
        let offset = source.position();
        let bytes = read_segment(source, part)?;
        segments.push(Segment { offset, bytes });
        Ok(())
    })?;
    Ok(MultipartSplit {
        preamble: framing.preamble,
        delimiters: framing.delimiters,
        segments,
        postamble: framing.postamble,
        terminated: framing.terminated,
    })
}

/// Read the rest of the current segment. When it ends at a delimiter, its final line
/// break is left to the delimiter.
pub(crate) fn read_segment(source: &mut PartSource<'_>, part: &PartId) -> Result<Bytes> {
    let capacity = source.remaining_len().unwrap_or(0).min(MAX_PREALLOC) as usize;
    let mut out = BytesMut::with_capacity(capacity);
    loop {
        let offset = source.position();
        match source.read_line() {
            Ok(Some(line)) => out.extend_from_slice(line),
            Ok(None) => break,
            Err(e) => return Err(MimeParseError::from_io(e, offset, part)),
        }
    }
    if source.at_delimiter() {
        let line_break = line_ending_len(&out);
        out.truncate(out.len() - line_break);
    }
    Ok(out.freeze())
}

fn skip_segment(source: &mut PartSource<'_>, part: &PartId) -> Result<()> {
    loop {
        let offset = source.position();
        match source.read_line() {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(()),
            Err(e) => return Err(MimeParseError::from_io(e, offset, part)),
        }
    }
}
