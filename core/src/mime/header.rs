/*
 * header.rs
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

//! Header block (RFC 5322 §2.2): field lines, folding, and typed accessors.

use tracing::trace;

use super::content_type::{parse_content_type, ContentType};
use super::error::{MimeErrorKind, MimeParseError, Result};
use super::part_id::PartId;
use super::source::{ByteSource, SliceSource};
use super::utils::{is_field_name_char, is_wsp, trim_crlf, trim_trailing_wsp};

/// One unfolded header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    name: String,
    value: String,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered header fields of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<HeaderField>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete header block. Parsing stops at the first empty line.
    pub fn parse(block: &[u8]) -> Result<Self> {
        read_header_block(&mut SliceSource::new(block), &PartId::root())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(HeaderField::new(name, value));
    }

    /// First value of the named field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.is_named(name))
            .map(HeaderField::value)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.is_named(name))
            .map(HeaderField::value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Declared Content-Type, if present and well-formed.
    pub fn content_type(&self) -> Option<ContentType> {
        self.get("content-type").and_then(parse_content_type)
    }

    /// Declared Content-Transfer-Encoding mechanism, lowercased.
    pub fn content_transfer_encoding(&self) -> Option<String> {
        self.get("content-transfer-encoding")
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }
}

enum FieldLine<'a> {
    Field(&'a [u8], &'a [u8]),
    EmptyName,
    NotAField,
}

fn split_field(text: &[u8]) -> FieldLine<'_> {
    let Some(colon) = text.iter().position(|&b| b == b':') else {
        return FieldLine::NotAField;
    };
    if colon == 0 {
        return FieldLine::EmptyName;
    }
    // obs-field allows WSP before the colon
    let name = trim_trailing_wsp(&text[..colon]);
    if name.is_empty() || !name.iter().copied().all(is_field_name_char) {
        return FieldLine::NotAField;
    }
    FieldLine::Field(name, &text[colon + 1..])
}

fn finish_field(headers: &mut Headers, pending: Option<(String, Vec<u8>)>) {
    if let Some((name, value)) = pending {
        let value = String::from_utf8_lossy(&value).trim().to_string();
        headers.push(name, value);
    }
}

/// Read the header block of an entity from `source`.
///
/// Consumes the terminating empty line. A line that is neither a field, a continuation
/// nor empty also ends the block but is left in the source as the first body line.
pub fn read_header_block(source: &mut dyn ByteSource, part: &PartId) -> Result<Headers> {
    let mut headers = Headers::new();
    let mut pending: Option<(String, Vec<u8>)> = None;
    loop {
        let offset = source.position();
        let text = match source.peek_line() {
            Ok(Some(line)) => trim_crlf(line).to_vec(),
            Ok(None) => break,
            Err(e) => return Err(MimeParseError::from_io(e, offset, part)),
        };
        if text.is_empty() {
            consume(source, part)?;
            break;
        }
        if is_wsp(text[0]) {
            let Some((_, value)) = pending.as_mut() else {
                return Err(MimeParseError::new(
                    MimeErrorKind::HeaderParse(
                        "continuation line without a preceding header field".to_string(),
                    ),
                    offset,
                    part,
                ));
            };
            value.extend_from_slice(&text);
            consume(source, part)?;
            continue;
        }
        match split_field(&text) {
            FieldLine::Field(name, value) => {
                finish_field(&mut headers, pending.take());
                let name = String::from_utf8_lossy(name).into_owned();
                pending = Some((name, value.to_vec()));
                consume(source, part)?;
            }
            FieldLine::EmptyName => {
                return Err(MimeParseError::new(
                    MimeErrorKind::HeaderParse("header field with empty name".to_string()),
                    offset,
                    part,
                ));
            }
            FieldLine::NotAField => {
                trace!("header block of part {} ended by body line at offset {}", part, offset);
                break;
            }
        }
    }
    finish_field(&mut headers, pending);
    Ok(headers)
}

fn consume(source: &mut dyn ByteSource, part: &PartId) -> Result<()> {
    let offset = source.position();
    source
        .read_line()
        .map_err(|e| MimeParseError::from_io(e, offset, part))?;
    Ok(())
}
