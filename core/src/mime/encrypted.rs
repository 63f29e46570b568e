/*
 * encrypted.rs
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

//! multipart/encrypted body (RFC 1847 §2.2).
//!
//! Structure only: the first part carries the control information named by the
//! `protocol` parameter, the second the encrypted payload. Nothing is decrypted here.

use super::body::{Body, Multipart};
use super::content_type::ContentType;
use super::entity::{Entity, EntityHead};
use super::error::{MimeErrorKind, MimeParseError, Result};
use super::registry::BodyContext;
use super::boundary::PartSource;
use super::source::ByteSource;

pub const MULTIPART_ENCRYPTED: &str = "multipart/encrypted";

const ENCRYPTED_PART_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartEncrypted {
    multipart: Multipart,
    protocol: Option<String>,
}

impl MultipartEncrypted {
    /// Check the owner's boundary and the content type, in that order. Returns the boundary.
    pub fn validate<'o>(
        owner: &'o EntityHead,
        content_type: &ContentType,
        offset: u64,
    ) -> Result<&'o str> {
        let Some(boundary) = owner.content_type().boundary() else {
            return Err(MimeParseError::new(
                MimeErrorKind::MissingBoundaryParameter,
                offset,
                owner.part_id(),
            ));
        };
        let found = content_type.type_with_subtype();
        if found != MULTIPART_ENCRYPTED {
            return Err(MimeParseError::new(
                MimeErrorKind::SubtypeMismatch {
                    expected: MULTIPART_ENCRYPTED,
                    found,
                },
                offset,
                owner.part_id(),
            ));
        }
        Ok(boundary)
    }

    /// Validate, then let the generic multipart constructor scan and parse the parts.
    pub fn parse(ctx: &BodyContext<'_>, source: &mut PartSource<'_>) -> Result<Self> {
        let boundary = Self::validate(ctx.owner, ctx.content_type, source.position())?;
        let multipart = Multipart::parse_with_boundary(ctx, source, boundary)?;
        let found = multipart.len();
        if ctx.parser.config().require_two_encrypted_parts && found != ENCRYPTED_PART_COUNT {
            return Err(MimeParseError::new(
                MimeErrorKind::InvalidPartCount {
                    expected: ENCRYPTED_PART_COUNT,
                    found,
                },
                source.position(),
                ctx.owner.part_id(),
            ));
        }
        Ok(Self {
            multipart,
            protocol: ctx.content_type.get_parameter("protocol").map(str::to_string),
        })
    }

    pub fn multipart(&self) -> &Multipart {
        &self.multipart
    }

    pub fn parts(&self) -> &[Entity] {
        self.multipart.parts()
    }

    /// The `protocol` parameter, e.g. `application/pgp-encrypted`.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// First part: encryption control information.
    pub fn control(&self) -> Option<&Entity> {
        self.parts().first()
    }

    /// Second part: the encrypted payload.
    pub fn payload(&self) -> Option<&Entity> {
        self.parts().get(1)
    }
}

/// Registry entry for `multipart/encrypted`.
pub fn parse_encrypted(ctx: &BodyContext<'_>, source: &mut PartSource<'_>) -> Result<Body> {
    MultipartEncrypted::parse(ctx, source).map(Body::MultipartEncrypted)
}
