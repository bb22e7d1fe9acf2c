//! Tag probing for files about to be registered
//!
//! Uses lofty to read whatever tags a file carries, so a registration can
//! fill in a missing title/artist and attach the tags as structured metadata.

use std::path::Path;

use anyhow::{Context, Result};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use serde::Serialize;

/// Tags read from an audio file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: u64,
    pub track_number: Option<u32>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    /// Lowercased file extension
    pub format: String,
}

impl ProbedTags {
    /// Structured form stored as the track's metadata
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Read tags and duration from an audio file
///
/// Title and artist missing from the tags are guessed from the file name.
pub fn probe_tags(path: &Path) -> Result<ProbedTags> {
    let tagged_file = Probe::open(path)
        .with_context(|| format!("Failed to open audio file {}", path.display()))?
        .read()
        .with_context(|| format!("Failed to read audio file {}", path.display()))?;

    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "unknown".to_string());

    let mut tags = ProbedTags {
        duration_secs: tagged_file.properties().duration().as_secs(),
        format,
        ..Default::default()
    };

    // Prefer the primary tag, fall back to any tag present
    if let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    {
        tags.title = tag.title().map(|s| s.trim().to_string());
        tags.artist = tag.artist().map(|s| s.trim().to_string());
        tags.album = tag.album().map(|s| s.trim().to_string());
        tags.genre = tag.genre().map(|s| s.trim().to_string());
        tags.track_number = tag.track();
        tags.year = tag.year();
    }

    if tags.title.is_none() || tags.artist.is_none() {
        if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
            let (artist, title) = parse_filename(filename);
            tags.artist = tags.artist.or(artist);
            tags.title = tags.title.or(title);
        }
    }

    Ok(tags)
}

/// Try to parse artist and title from a file name
///
/// Recognizes `"Artist - Title.ext"`, `"01 - Title.ext"` (a leading track
/// number is not an artist) and plain `"Title.ext"`.
pub fn parse_filename(filename: &str) -> (Option<String>, Option<String>) {
    let name = filename
        .rsplit_once('.')
        .map(|(name, _)| name)
        .unwrap_or(filename)
        .trim();

    if let Some((artist, title)) = name.split_once(" - ") {
        let artist = artist.trim();
        let title = title.trim().to_string();
        if artist.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return (None, Some(title));
        }
        return (Some(artist.to_string()), Some(title));
    }

    if name.is_empty() {
        (None, None)
    } else {
        (None, Some(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filename_artist_title() {
        let (artist, title) = parse_filename("Band - Song.mp3");
        assert_eq!(artist, Some("Band".to_string()));
        assert_eq!(title, Some("Song".to_string()));
    }

    #[test]
    fn test_parse_filename_track_number() {
        let (artist, title) = parse_filename("01 - Song.flac");
        assert_eq!(artist, None);
        assert_eq!(title, Some("Song".to_string()));
    }

    #[test]
    fn test_parse_filename_simple() {
        assert_eq!(parse_filename("Song.mp3"), (None, Some("Song".to_string())));
        assert_eq!(parse_filename(".mp3"), (None, None));
    }

    #[test]
    fn test_probe_missing_file() {
        assert!(probe_tags(Path::new("/nonexistent/songbase/a.mp3")).is_err());
    }

    #[test]
    fn test_to_json_fields() {
        let tags = ProbedTags {
            title: Some("Song".to_string()),
            duration_secs: 180,
            format: "mp3".to_string(),
            ..Default::default()
        };
        let json = tags.to_json();
        assert_eq!(json["title"], "Song");
        assert_eq!(json["duration_secs"], 180);
        assert!(json["artist"].is_null());
    }
}
