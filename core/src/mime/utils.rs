/*
 * utils.rs
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

//! MIME lexical utilities (RFC 2045 token, RFC 2046 boundary, RFC 5322 field name, line endings).

/// Checks if a character is valid in an RFC 2045 token.
#[inline]
pub fn is_token_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~'
    )
}

/// Checks if the string is a valid RFC 2045 token (1+ token chars).
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

/// Checks if a character is valid in a MIME boundary (RFC 2046 bchars, space excluded).
#[inline]
pub fn is_boundary_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' |
        b'/' | b':' | b'=' | b'?'
    )
}

/// Strict RFC 2046 boundary check: 1-70 chars from the boundary set, no trailing space.
///
/// Non-conformant boundaries are still matched as given; the parser only logs them.
pub fn is_valid_boundary(boundary: &str) -> bool {
    let b = boundary.as_bytes();
    (1..=70).contains(&b.len())
        && b.iter().all(|&c| c == b' ' || is_boundary_char(c))
        && b.last() != Some(&b' ')
}

/// Field-name character (RFC 5322): printable US-ASCII except colon.
#[inline]
pub fn is_field_name_char(c: u8) -> bool {
    (33..=126).contains(&c) && c != b':'
}

/// Linear whitespace (SP or HTAB).
#[inline]
pub fn is_wsp(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Remove one trailing CRLF, LF or CR.
pub fn trim_crlf(s: &[u8]) -> &[u8] {
    let end = s.len() - line_ending_len(s);
    &s[..end]
}

/// Length of the line ending at the end of `s` (2 for CRLF, 1 for LF or CR, 0 otherwise).
pub fn line_ending_len(s: &[u8]) -> usize {
    let end = s.len();
    if end >= 2 && s[end - 2] == b'\r' && s[end - 1] == b'\n' {
        2
    } else if end >= 1 && (s[end - 1] == b'\n' || s[end - 1] == b'\r') {
        1
    } else {
        0
    }
}

/// Remove trailing SP/HTAB.
pub fn trim_trailing_wsp(s: &[u8]) -> &[u8] {
    let end = s.iter().rposition(|&c| !is_wsp(c)).map(|i| i + 1).unwrap_or(0);
    &s[..end]
}
