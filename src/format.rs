//! Core data model: format descriptors, file records and conversion options.
//!
//! A [`FormatDescriptor`] is what a handler *declares*; a [`ConversionOption`]
//! pairs one declaration with the handler that made it. The capability graph
//! is built from a flat list of options, so an option is the atomic unit of
//! routing.

use crate::config::GraphMode;
use crate::handler::HandlerRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One format variant as declared by a handler.
///
/// Field names on the wire match the snapshot files produced by earlier
/// releases (`mime`, `from`, `to`), so existing `cache.json` exports load
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Human-readable name, e.g. "Portable Network Graphics".
    pub name: String,

    /// Short format code, e.g. "png".
    pub format: String,

    /// File extension without the leading dot.
    pub extension: String,

    /// Media type, e.g. "image/png".
    #[serde(rename = "mime")]
    pub media_type: String,

    /// The handler can read this format.
    #[serde(rename = "from")]
    pub accepts_input: bool,

    /// The handler can write this format.
    #[serde(rename = "to")]
    pub produces_output: bool,

    /// Handler-private code (codec id, library enum name…).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lossless: Option<bool>,
}

impl FormatDescriptor {
    /// Create a descriptor that is neither readable nor writable yet; chain
    /// [`readable`](Self::readable) / [`writable`](Self::writable).
    pub fn new(
        name: impl Into<String>,
        format: impl Into<String>,
        extension: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            extension: extension.into(),
            media_type: media_type.into(),
            accepts_input: false,
            produces_output: false,
            internal: None,
            lossless: None,
        }
    }

    pub fn readable(mut self) -> Self {
        self.accepts_input = true;
        self
    }

    pub fn writable(mut self) -> Self {
        self.produces_output = true;
        self
    }

    pub fn internal(mut self, code: impl Into<String>) -> Self {
        self.internal = Some(code.into());
        self
    }

    pub fn lossless(mut self, v: bool) -> Self {
        self.lossless = Some(v);
        self
    }

    /// The collapsed identity used in simple mode.
    pub fn key(&self) -> FormatKey {
        FormatKey {
            media_type: self.media_type.clone(),
            format: self.format.clone(),
        }
    }

    /// True when `other` names the same format class (same media type and code).
    pub fn same_format(&self, other: &FormatDescriptor) -> bool {
        self.media_type == other.media_type && self.format == other.format
    }
}

/// `(media type, format code)` — the format-equivalence class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatKey {
    pub media_type: String,
    pub format: String,
}

impl fmt::Display for FormatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.format, self.media_type)
    }
}

/// A named byte payload moving through a conversion path.
///
/// Hops never mutate a record; each hop returns a new batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The name with its extension swapped for `extension`.
    ///
    /// ```
    /// use edgequake_anyconv::FileRecord;
    /// let f = FileRecord::new("photo.final.png", vec![1]);
    /// assert_eq!(f.renamed_with_extension("jpg"), "photo.final.jpg");
    /// ```
    pub fn renamed_with_extension(&self, extension: &str) -> String {
        let stem = match self.name.rfind('.') {
            Some(idx) if idx > 0 => &self.name[..idx],
            _ => self.name.as_str(),
        };
        format!("{stem}.{extension}")
    }

    /// Lower-cased extension of the file name, if it has one.
    pub fn extension(&self) -> Option<String> {
        match self.name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < self.name.len() => {
                Some(self.name[idx + 1..].to_ascii_lowercase())
            }
            _ => None,
        }
    }
}

/// A concrete `(format, handler)` pairing.
#[derive(Clone)]
pub struct ConversionOption {
    pub format: FormatDescriptor,
    pub handler: HandlerRef,
}

impl ConversionOption {
    pub fn new(format: FormatDescriptor, handler: HandlerRef) -> Self {
        Self { format, handler }
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }

    /// Node identity under `mode`.
    pub fn node_key(&self, mode: GraphMode) -> NodeKey {
        NodeKey {
            format: self.format.key(),
            handler: match mode {
                GraphMode::Simple => None,
                GraphMode::Advanced => Some(self.handler.name().to_string()),
            },
        }
    }
}

impl fmt::Debug for ConversionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionOption")
            .field("format", &self.format.format)
            .field("mime", &self.format.media_type)
            .field("handler", &self.handler.name())
            .finish()
    }
}

impl fmt::Display for ConversionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.format.format, self.handler.name())
    }
}

/// Identity of a graph vertex. `handler` is `None` in simple mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub format: FormatKey,
    pub handler: Option<String>,
}
