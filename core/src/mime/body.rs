/*
 * body.rs
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

//! Entity bodies: opaque leaves, generic multiparts and encapsulated messages.

use std::slice;

use bytes::Bytes;
use tracing::debug;

use super::boundary::{self, PartSource};
use super::content_type::ContentType;
use super::encrypted::MultipartEncrypted;
use super::entity::Entity;
use super::error::{MimeErrorKind, MimeParseError, Result};
use super::registry::BodyContext;
use super::source::ByteSource;
use super::utils::is_valid_boundary;

/// Body of an entity. Exclusively owned by that entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Payload bytes, still transfer-encoded.
    Leaf(Bytes),
    Multipart(Multipart),
    MultipartEncrypted(MultipartEncrypted),
    /// `message/rfc822`: the encapsulated message is child 1 of this part.
    Message(Box<Entity>),
}

impl Body {
    /// Child entities in document order; empty for leaves.
    pub fn children(&self) -> &[Entity] {
        match self {
            Body::Leaf(_) => &[],
            Body::Multipart(multipart) => multipart.parts(),
            Body::MultipartEncrypted(encrypted) => encrypted.parts(),
            Body::Message(message) => slice::from_ref(message.as_ref()),
        }
    }

    /// The multipart container, for both generic and encrypted multiparts.
    pub fn as_multipart(&self) -> Option<&Multipart> {
        match self {
            Body::Multipart(multipart) => Some(multipart),
            Body::MultipartEncrypted(encrypted) => Some(encrypted.multipart()),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Bytes> {
        match self {
            Body::Leaf(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Generic multipart container (RFC 2046 §5.1).
#[derive(Debug, Clone, PartialEq)]
pub struct Multipart {
    boundary: String,
    preamble: Bytes,
    postamble: Bytes,
    delimiters: Vec<Bytes>,
    parts: Vec<Entity>,
}

impl Multipart {
    /// Generic constructor: boundary comes from the effective content type.
    pub fn parse(ctx: &BodyContext<'_>, source: &mut PartSource<'_>) -> Result<Self> {
        let boundary = ctx.content_type.boundary().ok_or_else(|| {
            MimeParseError::new(
                MimeErrorKind::MissingBoundaryParameter,
                source.position(),
                ctx.owner.part_id(),
            )
        })?;
        Self::parse_with_boundary(ctx, source, boundary)
    }

    /// Scan `source` on `boundary`, parsing each part as a child entity as it is reached.
    pub fn parse_with_boundary(
        ctx: &BodyContext<'_>,
        source: &mut PartSource<'_>,
        boundary: &str,
    ) -> Result<Self> {
        let part = ctx.owner.part_id();
        if !is_valid_boundary(boundary) {
            debug!("part {}: boundary {:?} is not RFC 2046 conformant, matching it as given", part, boundary);
        }
        let child_default = if ctx.content_type.is_sub_type("digest") {
            ContentType::message_rfc822()
        } else {
            ContentType::text_plain()
        };
        let allow_unterminated = ctx.parser.config().allow_unterminated_multipart;
        let mut parts = Vec::new();
        let framing = boundary::scan(source, boundary, part, allow_unterminated, |source, index| {
            let child = ctx.parser.parse_part(source, &child_default, part.child(index))?;
            parts.push(child);
            Ok(())
        })?;
        Ok(Self {
            boundary: boundary.to_string(),
            preamble: framing.preamble,
            postamble: framing.postamble,
            delimiters: framing.delimiters,
            parts,
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Bytes before the first delimiter line.
    pub fn preamble(&self) -> &Bytes {
        &self.preamble
    }

    /// Bytes after the closing delimiter line.
    pub fn postamble(&self) -> &Bytes {
        &self.postamble
    }

    /// Raw delimiter lines as they appeared in the body.
    pub fn delimiters(&self) -> &[Bytes] {
        &self.delimiters
    }

    pub fn parts(&self) -> &[Entity] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Registry entry for any `multipart/*` without a dedicated constructor.
pub fn parse_multipart(ctx: &BodyContext<'_>, source: &mut PartSource<'_>) -> Result<Body> {
    Multipart::parse(ctx, source).map(Body::Multipart)
}

/// Registry entry for non-multipart types: the rest of the part, verbatim.
pub fn parse_leaf(ctx: &BodyContext<'_>, source: &mut PartSource<'_>) -> Result<Body> {
    boundary::read_segment(source, ctx.owner.part_id()).map(Body::Leaf)
}

/// Registry entry for `message/rfc822`.
pub fn parse_message(ctx: &BodyContext<'_>, source: &mut PartSource<'_>) -> Result<Body> {
    let inner_part = ctx.owner.part_id().child(1);
    let message = ctx
        .parser
        .parse_part(source, &ContentType::text_plain(), inner_part)?;
    Ok(Body::Message(Box::new(message)))
}
