/*
 * error.rs
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

//! MIME parse errors.

use std::{fmt, io};

use thiserror::Error;

use super::part_id::PartId;

/// The global `Result` alias of the MIME parser.
pub type Result<T> = std::result::Result<T, MimeParseError>;

/// Position where a failure was detected: absolute byte offset in the top-level
/// stream and the section path of the entity being parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeLocator {
    pub offset: u64,
    pub part: PartId,
}

impl fmt::Display for MimeLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {} in part {}", self.offset, self.part)
    }
}

#[derive(Debug, Error)]
pub enum MimeErrorKind {
    #[error("multipart entity has no required 'boundary' parameter")]
    MissingBoundaryParameter,
    #[error("content type must be {expected}, got {found}")]
    SubtypeMismatch { expected: &'static str, found: String },
    #[error("multipart body ended before closing delimiter --{boundary}--")]
    TruncatedMultipart { boundary: String },
    #[error("expected {expected} body parts, found {found}")]
    InvalidPartCount { expected: usize, found: usize },
    #[error("cannot parse header block: {0}")]
    HeaderParse(String),
    #[error("cannot parse body: {0}")]
    BodyParse(String),
    #[error("multipart nesting exceeds limit of {limit}")]
    NestingTooDeep { limit: usize },
    #[error("cannot read MIME stream")]
    Io(#[source] io::Error),
}

/// A parse failure. Failures abort the whole parse; there is no partial result.
#[derive(Debug, Error)]
#[error("{kind} ({locator})")]
pub struct MimeParseError {
    #[source]
    pub kind: MimeErrorKind,
    pub locator: MimeLocator,
}

impl MimeParseError {
    pub fn new(kind: MimeErrorKind, offset: u64, part: &PartId) -> Self {
        Self {
            kind,
            locator: MimeLocator {
                offset,
                part: part.clone(),
            },
        }
    }

    /// Wrap a byte-source failure. Over-long lines (InvalidData) are body errors; the rest is I/O.
    pub fn from_io(err: io::Error, offset: u64, part: &PartId) -> Self {
        let kind = if err.kind() == io::ErrorKind::InvalidData {
            MimeErrorKind::BodyParse(err.to_string())
        } else {
            MimeErrorKind::Io(err)
        };
        Self::new(kind, offset, part)
    }

    pub fn kind(&self) -> &MimeErrorKind {
        &self.kind
    }

    pub fn offset(&self) -> u64 {
        self.locator.offset
    }
}
