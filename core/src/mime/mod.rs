/*
 * mod.rs
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

//! Recursive MIME entity parsing (RFC 2045/2046) with RFC 1847 multipart/encrypted rules.
//!
//! A byte source is read forward once: the header block, then the body. Inside a
//! multipart, each child is parsed as a full entity straight from the same stream,
//! which ends for it at the next delimiter of any enclosing multipart. The body
//! registry picks a constructor per content type.

mod body;
mod boundary;
mod content_type;
mod encrypted;
mod entity;
mod error;
mod header;
mod parameter;
mod part_id;
mod registry;
mod source;
mod transfer_encoding;
mod utils;

pub use body::{parse_leaf, parse_message, parse_multipart, Body, Multipart};
pub use boundary::{
    match_delimiter, split as split_multipart, Delimiter, MultipartSplit, PartSource, Segment,
};
pub use content_type::{parse_content_type, parse_parameter_list, ContentType};
pub use encrypted::{parse_encrypted, MultipartEncrypted, MULTIPART_ENCRYPTED};
pub use entity::{parse_entity, parse_message_bytes, Entity, EntityHead, EntityParser};
pub use error::{MimeErrorKind, MimeLocator, MimeParseError, Result};
pub use header::{read_header_block, HeaderField, Headers};
pub use parameter::Parameter;
pub use part_id::PartId;
pub use registry::{BodyConstructor, BodyContext, BodyRegistry};
pub use source::{ByteSource, ReaderSource, SliceSource, DEFAULT_MAX_LINE_LENGTH};
pub use transfer_encoding::{
    decode as decode_transfer_encoding, decode_quoted_printable, DecodeError, TransferEncoding,
};
pub use utils::{is_boundary_char, is_token, is_token_char, is_valid_boundary};
