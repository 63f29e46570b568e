/*
 * content_type.rs
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

//! Content-Type header (RFC 2045 §5).

use std::fmt;

use super::parameter::Parameter;
use super::utils::is_token;

/// Structured Content-Type value: type, subtype and ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    primary_type: String,
    sub_type: String,
    parameters: Vec<Parameter>,
}

impl ContentType {
    pub fn new(
        primary_type: impl Into<String>,
        sub_type: impl Into<String>,
        parameters: Option<Vec<Parameter>>,
    ) -> Self {
        Self {
            primary_type: primary_type.into(),
            sub_type: sub_type.into(),
            parameters: parameters.unwrap_or_default(),
        }
    }

    /// `text/plain`, the RFC 2045 default.
    pub fn text_plain() -> Self {
        Self::new("text", "plain", None)
    }

    /// `message/rfc822`, the default inside `multipart/digest` (RFC 2046 §5.1.5).
    pub fn message_rfc822() -> Self {
        Self::new("message", "rfc822", None)
    }

    /// Builder-style parameter append; replaces an existing parameter of the same name.
    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parameters.retain(|p| !p.is_named(name));
        self.parameters.push(Parameter::new(name, value));
        self
    }

    pub fn get_primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn get_sub_type(&self) -> &str {
        &self.sub_type
    }

    /// Normalized `type/subtype`, lowercased. Used as the registry key.
    pub fn type_with_subtype(&self) -> String {
        format!("{}/{}", self.primary_type, self.sub_type).to_ascii_lowercase()
    }

    pub fn is_primary_type(&self, t: &str) -> bool {
        self.primary_type.eq_ignore_ascii_case(t)
    }

    pub fn is_sub_type(&self, t: &str) -> bool {
        self.sub_type.eq_ignore_ascii_case(t)
    }

    pub fn is_mime_type(&self, primary: &str, sub: &str) -> bool {
        self.is_primary_type(primary) && self.is_sub_type(sub)
    }

    pub fn is_multipart(&self) -> bool {
        self.is_primary_type("multipart")
    }

    /// First parameter with the given name (case-insensitive).
    pub fn get_parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.is_named(name))
            .map(Parameter::get_value)
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.is_named(name))
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// The `boundary` parameter, if present and non-empty.
    pub fn boundary(&self) -> Option<&str> {
        self.get_parameter("boundary").filter(|b| !b.is_empty())
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primary_type, self.sub_type)?;
        for p in &self.parameters {
            if is_token(p.get_value()) {
                write!(f, "; {}={}", p.get_name(), p.get_value())?;
            } else {
                let escaped = p.get_value().replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {}=\"{}\"", p.get_name(), escaped)?;
            }
        }
        Ok(())
    }
}

/// Parse Content-Type header value. Returns None when the value is not `type/subtype [; params]`.
pub fn parse_content_type(value: &str) -> Option<ContentType> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (type_part, params_part) = match value.find(';') {
        Some(i) => (value[..i].trim(), value[i + 1..].trim()),
        None => (value, ""),
    };
    let slash = type_part.find('/')?;
    let primary = type_part[..slash].trim();
    let sub = type_part[slash + 1..].trim();
    if !is_token(primary) || !is_token(sub) {
        return None;
    }
    let parameters = parse_parameter_list(params_part);
    Some(ContentType::new(primary, sub, parameters))
}

/// Parse semicolon-separated parameter list (name=value; name="value").
///
/// Malformed entries are skipped. Unquoted values are taken verbatim up to the next `;`,
/// which tolerates the common unquoted `boundary=----=_Part` form.
pub fn parse_parameter_list(params_part: &str) -> Option<Vec<Parameter>> {
    let params_part = params_part.trim();
    if params_part.is_empty() {
        return None;
    }
    let mut parameters = Vec::new();
    let mut pos = 0;
    let bytes = params_part.as_bytes();
    let len = bytes.len();

    while pos < len {
        while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        let next_semi = bytes[pos..].iter().position(|&b| b == b';').map(|i| pos + i);
        let eq_abs = match bytes[pos..].iter().position(|&b| b == b'=') {
            Some(eq) if next_semi.map_or(true, |s| pos + eq < s) => pos + eq,
            _ => {
                pos = next_semi.map_or(len, |s| s + 1);
                continue;
            }
        };
        let name = params_part[pos..eq_abs].trim();
        if !is_token(name) {
            pos = next_semi.map_or(len, |s| s + 1);
            continue;
        }
        pos = eq_abs + 1;
        while pos < len && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }
        let value = if pos < len && bytes[pos] == b'"' {
            pos += 1;
            let mut v = Vec::new();
            while pos < len {
                let c = bytes[pos];
                if c == b'\\' && pos + 1 < len {
                    v.push(bytes[pos + 1]);
                    pos += 2;
                } else if c == b'"' {
                    pos += 1;
                    break;
                } else {
                    v.push(c);
                    pos += 1;
                }
            }
            // skip anything between the closing quote and the next separator
            pos = bytes[pos..].iter().position(|&b| b == b';').map_or(len, |i| pos + i);
            String::from_utf8_lossy(&v).into_owned()
        } else {
            let end = bytes[pos..].iter().position(|&b| b == b';').map_or(len, |i| pos + i);
            let v = params_part[pos..end].trim();
            pos = end;
            if v.is_empty() {
                continue;
            }
            v.to_string()
        };
        parameters.push(Parameter::new(name, value));
    }
    if parameters.is_empty() {
        None
    } else {
        Some(parameters)
    }
}
