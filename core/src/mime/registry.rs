/*
 * registry.rs
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

//! Content-type to body-constructor dispatch.
//!
//! Keys are normalized `type/subtype` strings. New subtypes are added with
//! `BodyRegistry::register`; `resolve` never needs to change.

use std::collections::HashMap;
use std::fmt;

use super::body::{parse_leaf, parse_message, parse_multipart, Body};
use super::content_type::ContentType;
use super::encrypted::{self, MULTIPART_ENCRYPTED};
use super::entity::{EntityHead, EntityParser};
use super::error::Result;
use super::boundary::PartSource;

/// What a body constructor gets besides the source.
pub struct BodyContext<'a> {
    /// Parser driving this parse; constructors recurse through it.
    pub parser: &'a EntityParser,
    /// The entity whose body is being built.
    pub owner: &'a EntityHead,
    /// Effective content type of the owner.
    pub content_type: &'a ContentType,
}

impl<'a> BodyContext<'a> {
    pub fn new(parser: &'a EntityParser, owner: &'a EntityHead) -> Self {
        Self {
            parser,
            owner,
            content_type: owner.content_type(),
        }
    }
}

/// Builds a body from the rest of the part.
pub type BodyConstructor = fn(&BodyContext<'_>, &mut PartSource<'_>) -> Result<Body>;

/// Mapping from `type/subtype` to body constructor.
#[derive(Clone)]
pub struct BodyRegistry {
    constructors: HashMap<String, BodyConstructor>,
}

impl Default for BodyRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(MULTIPART_ENCRYPTED, encrypted::parse_encrypted);
        registry.register("message/rfc822", parse_message);
        registry
    }
}

impl BodyRegistry {
    /// Registry with no entries: every type resolves to a fallback.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register (or replace) the constructor for `type_subtype`. Returns the previous one.
    pub fn register(
        &mut self,
        type_subtype: &str,
        constructor: BodyConstructor,
    ) -> Option<BodyConstructor> {
        self.constructors
            .insert(type_subtype.trim().to_ascii_lowercase(), constructor)
    }

    pub fn contains(&self, type_subtype: &str) -> bool {
        self.constructors
            .contains_key(&type_subtype.trim().to_ascii_lowercase())
    }

    /// Exact, case-insensitive lookup. Unregistered `multipart/*` falls back to the
    /// generic multipart constructor, anything else to the leaf constructor.
    pub fn resolve(&self, type_subtype: &str) -> BodyConstructor {
        let key = type_subtype.trim().to_ascii_lowercase();
        if let Some(constructor) = self.constructors.get(&key) {
            return *constructor;
        }
        if key.starts_with("multipart/") {
            parse_multipart
        } else {
            parse_leaf
        }
    }
}

impl fmt::Debug for BodyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.constructors.keys().collect();
        keys.sort();
        f.debug_struct("BodyRegistry").field("types", &keys).finish()
    }
}
