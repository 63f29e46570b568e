/*
 * entity.rs
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

//! MIME entities and the recursive entity parser.

use bytes::Bytes;
use tracing::debug;

use crate::config::ParserConfig;

use super::body::Body;
use super::boundary::PartSource;
use super::content_type::ContentType;
use super::error::{MimeErrorKind, MimeParseError, Result};
use super::header::{read_header_block, Headers};
use super::part_id::PartId;
use super::registry::{BodyContext, BodyRegistry};
use super::source::{ByteSource, SliceSource};
use super::transfer_encoding::{self, DecodeError, TransferEncoding};

/// Header part of an entity: what a body constructor sees of its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityHead {
    part_id: PartId,
    headers: Headers,
    content_type: ContentType,
}

impl EntityHead {
    pub fn new(part_id: PartId, headers: Headers, content_type: ContentType) -> Self {
        Self {
            part_id,
            headers,
            content_type,
        }
    }

    pub fn part_id(&self) -> &PartId {
        &self.part_id
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Effective content type: the declared one if well-formed, else the default.
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }
}

/// A parsed entity: headers plus exactly one body. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    head: EntityHead,
    body: Body,
}

impl Entity {
    pub fn part_id(&self) -> &PartId {
        &self.head.part_id
    }

    /// Path of the multipart (or message) entity containing this one.
    /// Resolve it with `find` on the root.
    pub fn owner(&self) -> Option<PartId> {
        self.head.part_id.parent()
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    pub fn content_type(&self) -> &ContentType {
        &self.head.content_type
    }

    /// Content-Type as written in the headers, if present and well-formed.
    pub fn declared_content_type(&self) -> Option<ContentType> {
        self.head.headers.content_type()
    }

    pub fn head(&self) -> &EntityHead {
        &self.head
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    pub fn children(&self) -> &[Entity] {
        self.body.children()
    }

    /// Find a descendant (or this entity) by section path.
    pub fn find(&self, part_id: &PartId) -> Option<&Entity> {
        let own = self.head.part_id.indices();
        let rest = part_id.indices().strip_prefix(own)?;
        let mut current = self;
        for &index in rest {
            current = current.children().get(index.checked_sub(1)?)?;
        }
        Some(current)
    }

    /// Leaf payload with its Content-Transfer-Encoding removed; None for containers.
    pub fn decoded_body(&self) -> std::result::Result<Option<Bytes>, DecodeError> {
        let Some(payload) = self.body.as_leaf() else {
            return Ok(None);
        };
        let encoding = self
            .head
            .headers
            .content_transfer_encoding()
            .map(|value| TransferEncoding::parse(&value))
            .unwrap_or_default();
        transfer_encoding::decode(encoding, payload).map(Some)
    }
}

/// Recursive entity parser. Owns the body registry and parser configuration.
#[derive(Debug, Clone, Default)]
pub struct EntityParser {
    registry: BodyRegistry,
    config: ParserConfig,
}

impl EntityParser {
    pub fn new(config: ParserConfig) -> Self {
        Self::with_registry(BodyRegistry::default(), config)
    }

    pub fn with_registry(registry: BodyRegistry, config: ParserConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn registry(&self) -> &BodyRegistry {
        &self.registry
    }

    /// Parse a top-level entity. `default_content_type` applies when the entity
    /// declares none or an unparsable one.
    pub fn parse(
        &self,
        source: &mut dyn ByteSource,
        default_content_type: &ContentType,
    ) -> Result<Entity> {
        let mut source = PartSource::new(source);
        self.parse_part(&mut source, default_content_type, PartId::root())
    }

    /// Parse one entity at `part_id`, reading up to the end of the part. Multipart
    /// constructors call back into this for each child.
    pub fn parse_part(
        &self,
        source: &mut PartSource<'_>,
        default_content_type: &ContentType,
        part_id: PartId,
    ) -> Result<Entity> {
        if part_id.depth() > self.config.max_depth {
            return Err(MimeParseError::new(
                MimeErrorKind::NestingTooDeep {
                    limit: self.config.max_depth,
                },
                source.position(),
                &part_id,
            ));
        }

        let headers = read_header_block(source, &part_id)?;
        let content_type = match headers.content_type() {
            Some(content_type) => content_type,
            None => {
                if let Some(raw) = headers.get("content-type") {
                    debug!(
                        "part {}: malformed Content-Type {:?}, using {}",
                        part_id, raw, default_content_type
                    );
                }
                default_content_type.clone()
            }
        };

        let head = EntityHead::new(part_id, headers, content_type);
        let type_subtype = head.content_type.type_with_subtype();
        let constructor = self.registry.resolve(&type_subtype);
        debug!("part {}: parsing {} body", head.part_id, type_subtype);

        let body = constructor(&BodyContext::new(self, &head), source)?;
        Ok(Entity { head, body })
    }
}

/// Parse a top-level entity with the default registry and configuration.
pub fn parse_entity(source: &mut dyn ByteSource, default_content_type: &ContentType) -> Result<Entity> {
    EntityParser::default().parse(source, default_content_type)
}

/// Parse a complete message held in memory, defaulting to `text/plain`.
pub fn parse_message_bytes(raw: &[u8]) -> Result<Entity> {
    parse_entity(&mut SliceSource::new(raw), &ContentType::text_plain())
}
