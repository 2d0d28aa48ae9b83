use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Catalog-unique identity of an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFormat {
    /// Discrete frames: GIF, APNG, or a single still image
    ImageSequence,
    /// Time-based container decoded through ffmpeg
    Video,
}

impl MediaFormat {
    /// Map a catalog format tag (`gif`, `mp4`, `webm`, ...) to a format; unknown tags are image sequences
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mp4" | "webm" | "mov" | "mkv" | "m4v" | "video" => MediaFormat::Video,
            _ => MediaFormat::ImageSequence,
        }
    }

    /// Infer the format from the extension of a URL or path
    pub fn from_reference(reference: &str) -> Self {
        let path = reference
            .split(['?', '#'])
            .next()
            .unwrap_or(reference);
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_tag)
            .unwrap_or(MediaFormat::ImageSequence)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::ImageSequence => "image-sequence",
            MediaFormat::Video => "video",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Remote(String),
    Local(PathBuf),
}

impl SourceRef {
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            SourceRef::Remote(reference.to_string())
        } else {
            SourceRef::Local(PathBuf::from(reference))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceRef::Remote(_))
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Remote(url) => f.write_str(url),
            SourceRef::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One catalog entry eligible for enrichment
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub source_ref: SourceRef,
    pub format: MediaFormat,
    /// URL carried into the output record
    pub origin_url: String,
    pub caption: String,
    pub attribution: Option<String>,
    pub located: bool,
    pub described: bool,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, source_ref: SourceRef, format: MediaFormat) -> Self {
        let origin_url = source_ref.to_string();
        Self {
            id: id.into(),
            source_ref,
            format,
            origin_url,
            caption: String::new(),
            attribution: None,
            located: true,
            described: false,
        }
    }

    pub fn with_origin_url(mut self, origin_url: impl Into<String>) -> Self {
        self.origin_url = origin_url.into();
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_attribution(mut self, attribution: Option<String>) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn with_status(mut self, located: bool, described: bool) -> Self {
        self.located = located;
        self.described = described;
        self
    }

    /// Whether the item should be queued: reachable, and either undescribed or forced
    pub fn is_pending(&self, force: bool) -> bool {
        self.located && (force || !self.described)
    }
}
