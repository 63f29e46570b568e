/*
 * config.rs
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

//! Parser configuration: limits and strictness policies, persisted as XML in
//! ~/.busta/parser.xml. All XML read/write uses the quick_xml parser/writer.

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use thiserror::Error;

use crate::mime::{ReaderSource, DEFAULT_MAX_LINE_LENGTH};

/// Default nesting limit; the top-level entity is depth 0.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read parser config at {1}")]
    Read(#[source] io::Error, PathBuf),
    #[error("cannot write parser config at {1}")]
    Write(#[source] io::Error, PathBuf),
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("invalid value {value:?} for <{element}>")]
    InvalidValue { element: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Deepest entity accepted before failing with NestingTooDeep.
    pub max_depth: usize,
    /// RFC 1847: multipart/encrypted must have exactly two parts.
    pub require_two_encrypted_parts: bool,
    /// Accept a multipart whose closing delimiter is missing, if it had at least one part.
    pub allow_unterminated_multipart: bool,
    /// Longest physical line a `ReaderSource` built from this config accepts.
    pub max_line_length: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            require_two_encrypted_parts: true,
            allow_unterminated_multipart: false,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Default config directory: ~/.busta.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from).map(|h| h.join(".busta"))
}

/// Default config path: ~/.busta/parser.xml.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join("parser.xml"))
}

impl ParserConfig {
    /// Wrap `reader` in a source bounded by this config's line length.
    pub fn reader_source<R: BufRead>(&self, reader: R) -> ReaderSource<R> {
        ReaderSource::new(reader).with_max_line_length(self.max_line_length)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Read(e, path.to_path_buf())),
        };
        Self::from_xml(&content)
    }

    /// Parse `<parser>...</parser>`. Unknown elements are ignored; absent ones keep defaults.
    pub fn from_xml(content: &str) -> Result<Self, ConfigError> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut config = Self::default();
        let mut element_name = Vec::<u8>::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Err(e) => return Err(xml_err(e)),
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) => {
                    element_name.clear();
                    element_name.extend_from_slice(e.name().as_ref());
                }
                Ok(Event::Text(e)) => {
                    if element_name.is_empty() {
                        continue;
                    }
                    let text = e
                        .unescape()
                        .map_err(xml_err)?
                        .trim()
                        .to_string();
                    let name = String::from_utf8_lossy(&element_name).into_owned();
                    match name.as_str() {
                        "max-depth" => config.max_depth = parse_number(&name, &text)?,
                        "require-two-encrypted-parts" => {
                            config.require_two_encrypted_parts = parse_flag(&name, &text)?
                        }
                        "allow-unterminated-multipart" => {
                            config.allow_unterminated_multipart = parse_flag(&name, &text)?
                        }
                        "max-line-length" => config.max_line_length = parse_number(&name, &text)?,
                        _ => {}
                    }
                    element_name.clear();
                }
                Ok(Event::End(_)) => element_name.clear(),
                _ => {}
            }
            buf.clear();
        }
        Ok(config)
    }

    /// Build the XML document for this config (UTF-8).
    pub fn to_xml(&self) -> Result<Vec<u8>, ConfigError> {
        let mut out = Vec::new();
        let mut writer = Writer::new_with_indent(&mut out, b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("parser")))
            .map_err(xml_err)?;
        let elements = [
            ("max-depth", self.max_depth.to_string()),
            ("require-two-encrypted-parts", self.require_two_encrypted_parts.to_string()),
            ("allow-unterminated-multipart", self.allow_unterminated_multipart.to_string()),
            ("max-line-length", self.max_line_length.to_string()),
        ];
        for (name, value) in &elements {
            writer
                .write_event(Event::Start(BytesStart::new(*name)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(value)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(*name)))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("parser")))
            .map_err(xml_err)?;
        Ok(out)
    }

    /// Write to `path`, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let xml = self.to_xml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e, parent.to_path_buf()))?;
        }
        fs::write(path, xml).map_err(|e| ConfigError::Write(e, path.to_path_buf()))
    }
}

fn xml_err<E: std::fmt::Display>(e: E) -> ConfigError {
    ConfigError::Xml(e.to_string())
}

fn parse_number(element: &str, text: &str) -> Result<usize, ConfigError> {
    text.parse().map_err(|_| ConfigError::InvalidValue {
        element: element.to_string(),
        value: text.to_string(),
    })
}

fn parse_flag(element: &str, text: &str) -> Result<bool, ConfigError> {
    match text {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            element: element.to_string(),
            value: text.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::ByteSource;

    #[test]
    fn defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.max_depth, 256);
        assert!(config.require_two_encrypted_parts);
        assert!(!config.allow_unterminated_multipart);
    }

    #[test]
    fn partial_xml_keeps_other_defaults() {
        let config = ParserConfig::from_xml(
            "<?xml version=\"1.0\"?><parser><max-depth>8</max-depth><unknown>x</unknown>\
             <allow-unterminated-multipart>yes</allow-unterminated-multipart></parser>",
        )
        .unwrap();
        assert_eq!(config.max_depth, 8);
        assert!(config.allow_unterminated_multipart);
        assert!(config.require_two_encrypted_parts);
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = ParserConfig::from_xml("<parser><max-depth>deep</max-depth></parser>").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref element, .. } if element == "max-depth"));
        let err = ParserConfig::from_xml("<parser><require-two-encrypted-parts>maybe</require-two-encrypted-parts></parser>")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("parser.xml");
        assert_eq!(ParserConfig::load(&path).unwrap(), ParserConfig::default());
        let config = ParserConfig {
            max_depth: 12,
            require_two_encrypted_parts: false,
            allow_unterminated_multipart: true,
            max_line_length: 998,
        };
        config.save(&path).unwrap();
        assert_eq!(ParserConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn reader_source_uses_line_limit() {
        let config = ParserConfig {
            max_line_length: 3,
            ..ParserConfig::default()
        };
        let data: &[u8] = b"toolong\n";
        let mut source = config.reader_source(data);
        assert!(source.read_line().is_err());
    }
}
