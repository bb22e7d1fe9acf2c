//! Songbase - an embedded music catalog
//!
//! Maps `"{artist} - {title}"` to integer ids, keeps the mp3/flac locations
//! and free-form metadata of every track, and answers substring searches.
//! Everything persists in one SQLite file owned by a [`Database`].

pub mod database;
pub mod error;
pub mod media;
pub mod probe;
pub mod settings;
pub mod transcode;

#[doc(hidden)]
pub mod test_support;

pub use database::{Database, JsonMeta, MusicInfo, NewMusic};
pub use error::{CatalogError, Result};
pub use media::{AudioFormat, MediaLocation};
pub use settings::Settings;
pub use transcode::{FfmpegTranscoder, Transcoder};
