/*
 * source.rs
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

//! Line-oriented, peekable byte sources the parser reads from.
//!
//! Sources are forward-only. Lines are returned with their line ending (LF or CRLF);
//! the last line of a stream may have none.

use std::io::{self, BufRead, Read};

/// Default bound on a single physical line read by `ReaderSource`.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Sequential, peekable source of raw lines.
pub trait ByteSource {
    /// Consume and return the next line, or None at end of stream.
    fn read_line(&mut self) -> io::Result<Option<&[u8]>>;

    /// Return the next line without consuming it.
    fn peek_line(&mut self) -> io::Result<Option<&[u8]>>;

    /// Bytes not yet consumed, when the total length is known.
    fn remaining_len(&self) -> Option<u64>;

    /// Absolute offset of the next unconsumed byte.
    fn position(&self) -> u64;
}

/// In-memory source over a byte slice. `base` is the absolute offset of the slice's first
/// byte, so nested segments report positions relative to the top-level stream.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_offset(data, 0)
    }

    pub fn with_offset(data: &'a [u8], base: u64) -> Self {
        Self { data, pos: 0, base }
    }

    fn next_line_end(&self) -> Option<usize> {
        if self.pos >= self.data.len() {
            return None;
        }
        let end = self.data[self.pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| self.pos + i + 1)
            .unwrap_or(self.data.len());
        Some(end)
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_line(&mut self) -> io::Result<Option<&[u8]>> {
        let Some(end) = self.next_line_end() else {
            return Ok(None);
        };
        let start = self.pos;
        self.pos = end;
        Ok(Some(&self.data[start..end]))
    }

    fn peek_line(&mut self) -> io::Result<Option<&[u8]>> {
        Ok(self.next_line_end().map(|end| &self.data[self.pos..end]))
    }

    fn remaining_len(&self) -> Option<u64> {
        Some((self.data.len() - self.pos) as u64)
    }

    fn position(&self) -> u64 {
        self.base + self.pos as u64
    }
}

/// Source over any buffered reader, one bounded line at a time.
pub struct ReaderSource<R> {
    inner: R,
    line: Vec<u8>,
    /// Some(true): a line is buffered; Some(false): end of stream was peeked.
    peeked: Option<bool>,
    pos: u64,
    total_len: Option<u64>,
    max_line_length: usize,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: Vec::new(),
            peeked: None,
            pos: 0,
            total_len: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Declare the total stream length (e.g. from a file size or RFC822.SIZE).
    pub fn with_len(mut self, total_len: u64) -> Self {
        self.total_len = Some(total_len);
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length.max(1);
        self
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self) -> io::Result<bool> {
        self.line.clear();
        let limit = self.max_line_length as u64 + 1;
        let n = (&mut self.inner).take(limit).read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Ok(false);
        }
        if self.line.len() > self.max_line_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {} bytes", self.max_line_length),
            ));
        }
        Ok(true)
    }
}

impl<R: BufRead> ByteSource for ReaderSource<R> {
    fn read_line(&mut self) -> io::Result<Option<&[u8]>> {
        let has_line = match self.peeked.take() {
            Some(has_line) => has_line,
            None => self.fill()?,
        };
        if !has_line {
            return Ok(None);
        }
        self.pos += self.line.len() as u64;
        Ok(Some(&self.line))
    }

    fn peek_line(&mut self) -> io::Result<Option<&[u8]>> {
        if self.peeked.is_none() {
            let has_line = self.fill()?;
            self.peeked = Some(has_line);
        }
        match self.peeked {
            Some(true) => Ok(Some(&self.line)),
            _ => Ok(None),
        }
    }

    fn remaining_len(&self) -> Option<u64> {
        self.total_len.map(|len| len.saturating_sub(self.pos))
    }

    fn position(&self) -> u64 {
        self.pos
    }
}
