//! Media location handling
//!
//! A stored file field is one of three things: the `NONE` sentinel (no local
//! copy exists), a remote URL (the real location lives elsewhere), or a path
//! on the local filesystem.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel stored in a file field when no local file exists
pub const NO_FILE: &str = "NONE";

/// Audio container formats the catalog keeps per track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Mp3,
    Flac,
}

impl AudioFormat {
    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
        }
    }

    /// Muxer name passed to the encoder's `-f` flag
    pub fn encoder_format(&self) -> &'static str {
        self.extension()
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Flac => "audio/flac",
        }
    }

    /// The format derived when only this one is supplied
    pub fn counterpart(&self) -> Self {
        match self {
            Self::Mp3 => Self::Flac,
            Self::Flac => Self::Mp3,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "flac" => Ok(Self::Flac),
            other => Err(format!("unsupported audio format: {}", other)),
        }
    }
}

/// Where the bytes of a stored media field actually live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLocation {
    /// No local file; callers answer with an empty result
    Missing,
    /// Remote URL; callers answer with a redirect
    Remote(String),
    /// File on the local filesystem
    Local(PathBuf),
}

impl MediaLocation {
    pub fn parse(value: &str) -> Self {
        if value == NO_FILE {
            Self::Missing
        } else if value.starts_with("http://") || value.starts_with("https://") {
            Self::Remote(value.to_string())
        } else {
            Self::Local(PathBuf::from(value))
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// Path next to `source` sharing its base name, with the extension of `format`
///
/// `music/a.mp3` with [`AudioFormat::Flac`] becomes `music/a.flac`.
pub fn sibling_path(source: &Path, format: AudioFormat) -> PathBuf {
    source.with_extension(format.extension())
}
