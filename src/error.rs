//! Error taxonomy for the catalog store

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Database already closed")]
    DoubleClose,

    #[error("Database is closed")]
    Closed,

    #[error("Transcoding {} -> {} failed: {reason}", .input.display(), .output.display())]
    Transcode {
        input: PathBuf,
        output: PathBuf,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    pub(crate) fn config_not_found(name: &str) -> Self {
        Self::NotFound {
            entity: "config",
            key: name.to_string(),
        }
    }

    pub(crate) fn music_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "music",
            key: id.to_string(),
        }
    }

    /// Whether a sqlx error is a UNIQUE / PRIMARY KEY violation
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
