//! Raw and parsed message types.

use std::path::{Path, PathBuf};

use crate::error::{ForensicError, Result};

/// The bytes of one `.eml` file exactly as loaded from storage.
///
/// Immutable; a new load produces a new value instead of editing this one.
#[derive(Debug, Clone)]
pub struct RawMessage {
    bytes: Vec<u8>,
    source: Option<PathBuf>,
}

impl RawMessage {
    /// Wrap bytes handed over by a caller (no file path known).
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            source: None,
        }
    }

    /// Read a message file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| ForensicError::io(path, e))?;
        Ok(Self {
            bytes,
            source: Some(path.to_path_buf()),
        })
    }

    /// The raw message bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The file the message was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One header field, unfolded, with its name as written in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    /// Unfolded value, surrounding whitespace trimmed, encoded-words intact.
    pub value: String,
}

/// Structured view over a [`RawMessage`]: ordered headers plus a MIME part tree.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    /// Top-level header fields in message order, duplicates preserved.
    pub headers: Vec<HeaderField>,
    /// Root of the body part tree.
    pub body: BodyPart,
}

impl ParsedMessage {
    /// First value for a header name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Every value for a header name (case-insensitive), in message order.
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Depth-first, pre-order iterator over every part of the body tree.
    pub fn parts(&self) -> Vec<&BodyPart> {
        let mut out = Vec::new();
        self.body.walk(&mut out);
        out
    }
}

/// One node of the MIME tree.
#[derive(Debug, Clone)]
pub struct BodyPart {
    /// Lower-cased `type/subtype`, e.g. `"text/html"`.
    pub content_type: String,
    /// `true` when `Content-Disposition: attachment`.
    pub is_attachment: bool,
    pub content: PartContent,
}

/// Decoded content of a [`BodyPart`].
#[derive(Debug, Clone)]
pub enum PartContent {
    /// Text decoded to UTF-8 from its transfer encoding and charset.
    Text(String),
    /// Non-text payload, transfer-decoded.
    Binary(Vec<u8>),
    /// Child parts of a `multipart/*` container.
    Multipart(Vec<BodyPart>),
}

impl BodyPart {
    pub fn is_html(&self) -> bool {
        self.content_type == "text/html"
    }

    pub fn is_plain(&self) -> bool {
        self.content_type == "text/plain"
    }

    /// The decoded text, for text parts.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            PartContent::Text(t) => Some(t),
            _ => None,
        }
    }

    fn walk<'a>(&'a self, out: &mut Vec<&'a BodyPart>) {
        out.push(self);
        if let PartContent::Multipart(children) = &self.content {
            for child in children {
                child.walk(out);
            }
        }
    }
}
