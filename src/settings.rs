//! Application settings persistence
//!
//! Handles saving and loading the on-disk settings file. These are process
//! settings (where the database lives, which encoder to run); the key/value
//! entries kept inside the database are a separate store, see
//! [`Database::get_config`](crate::Database::get_config).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Database file location
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Upper bound for pooled SQLite connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// External encoder settings
    #[serde(default)]
    pub transcoder: TranscoderSettings,
}

/// External encoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscoderSettings {
    /// Encoder executable, resolved through `PATH` when relative
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Pass `-y` so the encoder overwrites an existing output file
    #[serde(default)]
    pub overwrite: bool,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "songbase", "Songbase")
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("songbase.db"))
        .unwrap_or_else(|| PathBuf::from("songbase.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_program() -> PathBuf {
    PathBuf::from("ffmpeg")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_connections: default_max_connections(),
            transcoder: TranscoderSettings::default(),
        }
    }
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            overwrite: false,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return defaults if not found
    pub fn load() -> Self {
        Self::file_path()
            .and_then(|path| Self::load_from_file(&path).ok())
            .unwrap_or_default()
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the default file
    pub fn save(&self) -> Result<(), SettingsError> {
        match Self::file_path() {
            Some(path) => self.save_to_file(&path),
            None => Err(SettingsError::NoConfigDir),
        }
    }

    /// Save settings to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Errors that can occur with settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not determine config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            database_path: PathBuf::from("/var/lib/songbase/catalog.db"),
            max_connections: 2,
            transcoder: TranscoderSettings {
                program: PathBuf::from("/usr/local/bin/ffmpeg"),
                overwrite: true,
            },
        };
        settings.save_to_file(&path).unwrap();

        assert_eq!(Settings::load_from_file(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "database_path": "music.db" }"#).unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.database_path, PathBuf::from("music.db"));
        assert_eq!(settings.max_connections, 5);
        assert_eq!(settings.transcoder, TranscoderSettings::default());
        assert!(!settings.transcoder.overwrite);
    }

    #[test]
    fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            Settings::load_from_file(&path),
            Err(SettingsError::Parse(_))
        ));
    }
}
