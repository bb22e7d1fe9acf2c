//! Database models for the catalog
//! Row types map directly to SQLite tables; the rest are plain values handed
//! to and returned from [`Database`](super::Database).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::media::{AudioFormat, MediaLocation};

/// Identity row (`Music` table)
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DbMusic {
    /// Composite key, `"{artist} - {title}"`
    pub name: String,
    pub title: String,
    pub artist: String,
    /// Allocated once at registration, never changed
    pub id: i64,
}

/// Media row (`Music_info` table), keyed by the identity row's id
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DbMusicInfo {
    pub id: i64,
    pub file_mp3: String,
    pub file_flac: String,
    pub json_meta: String,
}

/// Key/value row (`config` table)
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DbConfigEntry {
    pub name: String,
    pub value: String,
}

/// Joined view of a track returned by lookups
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct MusicInfo {
    pub id: i64,
    pub name: String,
    pub title: String,
    pub artist: String,
    pub file_mp3: String,
    pub file_flac: String,
}

impl MusicInfo {
    /// Stored location for one of the two formats
    pub fn file(&self, format: AudioFormat) -> &str {
        match format {
            AudioFormat::Mp3 => &self.file_mp3,
            AudioFormat::Flac => &self.file_flac,
        }
    }

    pub fn location(&self, format: AudioFormat) -> MediaLocation {
        MediaLocation::parse(self.file(format))
    }

    /// File name offered to clients downloading this track
    pub fn download_name(&self, format: AudioFormat) -> String {
        format!("{}.{}", self.name, format.extension())
    }
}

/// Free-form metadata attached to a track
///
/// Raw strings are stored verbatim; structured values are serialized at
/// write time.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonMeta {
    Raw(String),
    Structured(serde_json::Value),
}

impl Default for JsonMeta {
    fn default() -> Self {
        Self::Raw(String::new())
    }
}

impl JsonMeta {
    /// The string written to `Music_info.json_meta`
    pub fn to_stored(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Raw(s) => Ok(s.clone()),
            Self::Structured(serde_json::Value::String(s)) => Ok(s.clone()),
            Self::Structured(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                value.serialize(&mut ser)?;
                Ok(String::from_utf8_lossy(&buf).into_owned())
            }
            Self::Structured(scalar) => serde_json::to_string(scalar),
        }
    }
}

impl From<&str> for JsonMeta {
    fn from(s: &str) -> Self {
        Self::Raw(s.to_string())
    }
}

impl From<String> for JsonMeta {
    fn from(s: String) -> Self {
        Self::Raw(s)
    }
}

impl From<serde_json::Value> for JsonMeta {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

// ============ Input structs for creating new records ============

/// Input for registering a track
///
/// At least one of `file_mp3` / `file_flac` must be set; the other one is
/// derived by transcoding.
#[derive(Debug, Clone, Default)]
pub struct NewMusic {
    pub title: String,
    pub artist: String,
    pub file_mp3: Option<String>,
    pub file_flac: Option<String>,
    pub json_meta: JsonMeta,
}

impl NewMusic {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    pub fn mp3(mut self, path: impl Into<String>) -> Self {
        self.file_mp3 = Some(path.into());
        self
    }

    pub fn flac(mut self, path: impl Into<String>) -> Self {
        self.file_flac = Some(path.into());
        self
    }

    pub fn meta(mut self, meta: impl Into<JsonMeta>) -> Self {
        self.json_meta = meta.into();
        self
    }

    /// Catalog key of this track
    pub fn composite_name(&self) -> String {
        composite_name(&self.artist, &self.title)
    }
}

/// `"{artist} - {title}"`
pub fn composite_name(artist: &str, title: &str) -> String {
    format!("{} - {}", artist, title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_meta_is_verbatim() {
        let meta = JsonMeta::from("{\"already\": \"serialized\"}");
        assert_eq!(meta.to_stored().unwrap(), "{\"already\": \"serialized\"}");
        assert_eq!(JsonMeta::default().to_stored().unwrap(), "");
    }

    #[test]
    fn test_structured_meta_is_pretty_printed() {
        let meta = JsonMeta::from(json!({ "year": 1999 }));
        assert_eq!(meta.to_stored().unwrap(), "{\n    \"year\": 1999\n}");

        let list = JsonMeta::from(json!(["a", "b"]));
        assert_eq!(list.to_stored().unwrap(), "[\n    \"a\",\n    \"b\"\n]");
    }

    #[test]
    fn test_structured_scalars() {
        assert_eq!(JsonMeta::from(json!("plain")).to_stored().unwrap(), "plain");
        assert_eq!(JsonMeta::from(json!(42)).to_stored().unwrap(), "42");
    }

    #[test]
    fn test_new_music_builder() {
        let music = NewMusic::new("Song", "Band").mp3("m.mp3");
        assert_eq!(music.composite_name(), "Band - Song");
        assert_eq!(music.file_mp3.as_deref(), Some("m.mp3"));
        assert!(music.file_flac.is_none());
    }

    #[test]
    fn test_download_name_and_location() {
        let info = MusicInfo {
            id: 3,
            name: "Band - Song".to_string(),
            title: "Song".to_string(),
            artist: "Band".to_string(),
            file_mp3: "NONE".to_string(),
            file_flac: "http://cdn.example/3.flac".to_string(),
        };
        assert_eq!(info.download_name(AudioFormat::Flac), "Band - Song.flac");
        assert_eq!(info.location(AudioFormat::Mp3), MediaLocation::Missing);
        assert_eq!(
            info.location(AudioFormat::Flac),
            MediaLocation::Remote("http://cdn.example/3.flac".to_string())
        );
    }
}
