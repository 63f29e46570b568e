/*
 * transfer_encoding.rs
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

//! Content-Transfer-Encoding (RFC 2045 §6) decoding of leaf payloads.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use bytes::Bytes;
use thiserror::Error;
use tracing::warn;

/// Padding-tolerant standard alphabet; mail often drops or mangles `=` padding.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot decode base64 body")]
    Base64(#[source] base64::DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    Unknown(String),
}

impl TransferEncoding {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("7bit") {
            Self::SevenBit
        } else if value.eq_ignore_ascii_case("8bit") {
            Self::EightBit
        } else if value.eq_ignore_ascii_case("binary") {
            Self::Binary
        } else if value.eq_ignore_ascii_case("base64") {
            Self::Base64
        } else if value.eq_ignore_ascii_case("quoted-printable") {
            Self::QuotedPrintable
        } else {
            Self::Unknown(value.to_ascii_lowercase())
        }
    }
}

/// Decode `payload`. Identity encodings and unknown mechanisms return the payload unchanged.
pub fn decode(encoding: TransferEncoding, payload: &Bytes) -> Result<Bytes, DecodeError> {
    match encoding {
        TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
            Ok(payload.clone())
        }
        TransferEncoding::Base64 => {
            let compact: Vec<u8> = payload
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            BASE64
                .decode(compact)
                .map(Bytes::from)
                .map_err(DecodeError::Base64)
        }
        TransferEncoding::QuotedPrintable => Ok(Bytes::from(decode_quoted_printable(payload))),
        TransferEncoding::Unknown(name) => {
            warn!("unknown transfer encoding {}, leaving body undecoded", name);
            Ok(payload.clone())
        }
    }
}

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i += 1;
    }
    t
};

/// Decode quoted-printable: `=XX` escapes and soft line breaks (`=CRLF`, `=LF`).
/// Malformed escapes are kept literally.
pub fn decode_quoted_printable(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut pos = 0;
    while pos < src.len() {
        let b = src[pos];
        if b != b'=' {
            out.push(b);
            pos += 1;
            continue;
        }
        let rest = &src[pos + 1..];
        match rest {
            [b'\r', b'\n', ..] => pos += 3,
            [b'\n', ..] => pos += 2,
            [h1, h2, ..] if HEX_DECODE[*h1 as usize] >= 0 && HEX_DECODE[*h2 as usize] >= 0 => {
                out.push(((HEX_DECODE[*h1 as usize] as u8) << 4) | HEX_DECODE[*h2 as usize] as u8);
                pos += 3;
            }
            _ => {
                out.push(b);
                pos += 1;
            }
        }
    }
    out
}
