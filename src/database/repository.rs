//! Database repository - main entry point
//! Delegates to ops modules for actual operations

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Acquire, Pool, Sqlite};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{models::*, ops, schema};
use crate::error::{CatalogError, Result};
use crate::media::{AudioFormat, MediaLocation, NO_FILE, sibling_path};
use crate::settings::Settings;
use crate::transcode::{FfmpegTranscoder, Transcoder};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Catalog store: one pooled SQLite handle plus the transcoder used to
/// derive missing formats
///
/// Reads go straight to the pool. Every mutating operation holds `write_lock`
/// for its whole duration and runs in one transaction, so no caller ever sees
/// a counter advanced without its rows, or two callers the same id.
pub struct Database {
    pool: Pool<Sqlite>,
    write_lock: Mutex<()>,
    closed: AtomicBool,
    transcoder: Arc<dyn Transcoder>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool", &self.pool)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Create and initialize database at the given path
    pub async fn new(db_path: &Path, transcoder: Arc<dyn Transcoder>) -> Result<Self> {
        Self::with_max_connections(db_path, DEFAULT_MAX_CONNECTIONS, transcoder).await
    }

    /// Open the database and encoder described by the settings file
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let transcoder = Arc::new(FfmpegTranscoder::from_settings(&settings.transcoder));
        Self::with_max_connections(&settings.database_path, settings.max_connections, transcoder)
            .await
    }

    pub async fn with_max_connections(
        db_path: &Path,
        max_connections: u32,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            // WAL keeps readers from blocking behind the writer
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("cache_size", "-32000");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        schema::create_schema(&pool).await?;

        let size = schema::database_size(&pool).await?;
        info!(
            "Loaded database at {}, size (bytes): {}",
            db_path.display(),
            size
        );

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            transcoder,
        })
    }

    // ============ Lifecycle ============

    /// Flush the WAL into the main file and release every connection
    ///
    /// A second call fails with [`CatalogError::DoubleClose`]; after closing,
    /// every other operation fails with [`CatalogError::Closed`].
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(CatalogError::DoubleClose);
        }

        info!("Closing database...");
        // Let an in-flight write finish before tearing the pool down
        let _guard = self.write_lock.lock().await;

        if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
        {
            warn!("WAL checkpoint on close failed: {}", e);
        }
        self.pool.close().await;

        info!("Database closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(CatalogError::Closed)
        } else {
            Ok(())
        }
    }

    // ============ Config Operations ============

    /// Read a config value, see `ops::get_config`
    pub async fn get_config(
        &self,
        name: &str,
        default: Option<&str>,
        create: bool,
    ) -> Result<String> {
        self.ensure_open()?;

        if !(create && default.is_some()) {
            let mut conn = self.pool.acquire().await?;
            return ops::get_config(&mut conn, name, default, create).await;
        }

        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let value = ops::get_config(&mut *tx, name, default, create).await?;
        tx.commit().await?;
        Ok(value)
    }

    /// Update an existing config entry; a missing entry is left missing
    pub async fn set_config(&self, name: &str, value: &str) -> Result<u64> {
        self.ensure_open()?;

        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let affected = ops::set_config(&mut *tx, name, value).await?;
        tx.commit().await?;
        Ok(affected)
    }

    /// Issue a fresh id; ids are never reused, across restarts included
    pub async fn next_id(&self) -> Result<i64> {
        self.ensure_open()?;

        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let id = ops::next_id(&mut *tx).await?;
        tx.commit().await?;
        Ok(id)
    }

    // ============ Music Operations ============

    /// Register a track and return its id
    ///
    /// When only one format is given, the other is transcoded next to it
    /// first; `register` waits for the encoder and fails without writing
    /// anything if it fails. The counter advance and both row inserts then
    /// commit as one transaction.
    pub async fn register(&self, music: NewMusic) -> Result<i64> {
        self.ensure_open()?;

        let name = music.composite_name();
        let NewMusic {
            title,
            artist,
            file_mp3,
            file_flac,
            json_meta,
        } = music;

        let (file_mp3, file_flac) = match (file_mp3, file_flac) {
            (None, None) => {
                return Err(CatalogError::InvalidInput(
                    "No music files provided".to_string(),
                ));
            }
            (Some(mp3), Some(flac)) => (mp3, flac),
            (Some(mp3), None) => {
                self.ensure_name_free(&name).await?;
                let flac = self.derive_file(&mp3, AudioFormat::Flac).await?;
                (mp3, flac)
            }
            (None, Some(flac)) => {
                self.ensure_name_free(&name).await?;
                let mp3 = self.derive_file(&flac, AudioFormat::Mp3).await?;
                (mp3, flac)
            }
        };

        let json_meta = json_meta.to_stored()?;

        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let inserted = async {
            let id = ops::next_id(&mut *tx).await?;
            ops::insert_music(
                &mut *tx,
                &DbMusic {
                    name: name.clone(),
                    title,
                    artist,
                    id,
                },
            )
            .await?;
            ops::insert_music_info(
                &mut *tx,
                &DbMusicInfo {
                    id,
                    file_mp3,
                    file_flac,
                    json_meta,
                },
            )
            .await?;
            Ok::<_, CatalogError>(id)
        }
        .await;

        // Roll back before the write lock is released
        let id = match inserted {
            Ok(id) => {
                tx.commit().await?;
                id
            }
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        debug!("register(name={}) -> {}", name, id);
        Ok(id)
    }

    /// Fail fast before spending an encoder run on a taken name
    async fn ensure_name_free(&self, name: &str) -> Result<()> {
        if ops::name_exists(&self.pool, name).await? {
            return Err(CatalogError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Produce the missing format next to `source`, returns the stored value
    ///
    /// An existing file at the derived path is left alone and fails the
    /// registration. Only local files can be transcoded; a sentinel or remote
    /// source leaves the other format as [`NO_FILE`].
    async fn derive_file(&self, source: &str, target: AudioFormat) -> Result<String> {
        match MediaLocation::parse(source) {
            MediaLocation::Local(path) => {
                let output = sibling_path(&path, target);
                // Never clobber a file that may belong to another track
                if tokio::fs::try_exists(&output).await? {
                    return Err(CatalogError::Transcode {
                        input: path,
                        output,
                        reason: "output file already exists".to_string(),
                    });
                }
                self.transcoder.encode(&path, &output, target).await?;
                Ok(output.to_string_lossy().into_owned())
            }
            location => {
                debug!(
                    "Not transcoding {:?} source {}, recording {} as {}",
                    location, source, target, NO_FILE
                );
                Ok(NO_FILE.to_string())
            }
        }
    }

    /// Get a track by id; both of its rows must exist
    pub async fn get_by_id(&self, id: i64) -> Result<MusicInfo> {
        self.ensure_open()?;

        match ops::get_music_info(&self.pool, id).await? {
            Some(info) => {
                debug!("get_by_id({}) -> {}", id, info.name);
                Ok(info)
            }
            None => {
                let has_identity = ops::get_music(&self.pool, id).await?.is_some();
                let has_media = ops::get_json_meta(&self.pool, id).await?.is_some();
                if has_identity && !has_media {
                    warn!("Music row {} has no Music_info row", id);
                } else if has_media && !has_identity {
                    warn!("Music_info row {} has no Music row", id);
                }
                Err(CatalogError::music_not_found(id))
            }
        }
    }

    /// Raw metadata string stored for a track
    pub async fn get_meta(&self, id: i64) -> Result<String> {
        self.ensure_open()?;
        ops::get_json_meta(&self.pool, id)
            .await?
            .ok_or_else(|| CatalogError::music_not_found(id))
    }

    /// Track plus where the bytes of the requested format live
    pub async fn resolve_media(
        &self,
        id: i64,
        format: AudioFormat,
    ) -> Result<(MusicInfo, MediaLocation)> {
        let info = self.get_by_id(id).await?;
        let location = info.location(format);
        Ok((info, location))
    }

    pub async fn count(&self) -> Result<i64> {
        self.ensure_open()?;
        ops::count_music(&self.pool).await
    }

    pub async fn size_bytes(&self) -> Result<i64> {
        self.ensure_open()?;
        schema::database_size(&self.pool).await
    }

    // ============ Search Operations ============

    /// Ids of every track whose `"{artist} - {title}"` contains `fragment`
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<i64>> {
        self.ensure_open()?;
        ops::search_by_name(&self.pool, fragment).await
    }
}

impl Database {
    /// Release the pool of a store that was never closed, returns whether
    /// anything was done
    ///
    /// Unlike [`Database::close`] this does not checkpoint the WAL, so a
    /// `-wal` file stays next to the database until the next open. Committed
    /// data is kept either way.
    fn close_on_drop(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        warn!("Database dropped without close(), closing connections");
        let pool = self.pool.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { pool.close().await });
        }
        true
    }
}

/// Exit hook: closes the pool unless `close()` already ran
impl Drop for Database {
    fn drop(&mut self) {
        self.close_on_drop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTranscoder;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> Database {
        Database::new(
            &dir.path().join("catalog.db"),
            Arc::new(RecordingTranscoder::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;
        schema::create_schema(&db.pool).await.unwrap();
        schema::create_schema(&db.pool).await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('Music', 'Music_info', 'config')",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(tables, 3);

        let indices: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name IN ('idx_name', 'idx_id', 'idx_id2')",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(indices, 3);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_wal_mode_enabled() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_close() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        db.close().await.unwrap();
        assert!(db.is_closed());
        assert!(matches!(db.close().await, Err(CatalogError::DoubleClose)));
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;
        db.close().await.unwrap();

        assert!(matches!(db.next_id().await, Err(CatalogError::Closed)));
        assert!(matches!(db.get_by_id(0).await, Err(CatalogError::Closed)));
        assert!(matches!(
            db.search_by_name("x").await,
            Err(CatalogError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_missing_media_row_is_not_found() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        // Identity row without its media row
        sqlx::query("INSERT INTO Music (name, title, artist, id) VALUES ('A - X', 'X', 'A', 7)")
            .execute(&db.pool)
            .await
            .unwrap();

        assert!(matches!(
            db.get_by_id(7).await,
            Err(CatalogError::NotFound { .. })
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_counter() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        // Occupy the media row of the id the next registration will get
        sqlx::query("INSERT INTO Music_info (id, file_mp3, file_flac, json_meta) VALUES (0, 'x', 'y', '')")
            .execute(&db.pool)
            .await
            .unwrap();

        let err = db
            .register(NewMusic::new("X", "A").mp3("a.mp3").flac("a.flac"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Database(_)));

        // Neither the identity row nor the counter advance survived
        assert_eq!(db.count().await.unwrap(), 0);
        assert!(matches!(
            db.get_config("next_id", None, false).await,
            Err(CatalogError::NotFound { .. })
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_size_bytes_positive() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;
        assert!(db.size_bytes().await.unwrap() > 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_without_close_keeps_committed_data() {
        let dir = TempDir::new().unwrap();

        let db = open(&dir).await;
        let id = db
            .register(NewMusic::new("X", "A").mp3("a.mp3").flac("a.flac"))
            .await
            .unwrap();
        drop(db);

        let db = open(&dir).await;
        assert_eq!(db.count().await.unwrap(), 1);
        assert_eq!(db.get_by_id(id).await.unwrap().name, "A - X");
        assert_eq!(db.next_id().await.unwrap(), id + 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_hook_runs_once() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        assert!(db.close_on_drop());
        assert!(db.is_closed());
        assert!(!db.close_on_drop());
        assert!(matches!(db.close().await, Err(CatalogError::DoubleClose)));
    }

    #[tokio::test]
    async fn test_explicit_close_disarms_drop_hook() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        db.close().await.unwrap();
        assert!(db.is_closed());
        assert!(!db.close_on_drop());
    }

    #[tokio::test]
    async fn test_orphan_media_row_is_not_found() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        // Media row without its identity row
        sqlx::query("INSERT INTO Music_info (id, file_mp3, file_flac, json_meta) VALUES (4, 'x', 'y', '')")
            .execute(&db.pool)
            .await
            .unwrap();

        assert!(matches!(
            db.get_by_id(4).await,
            Err(CatalogError::NotFound { .. })
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_existing_derived_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let transcoder = Arc::new(RecordingTranscoder::writing_output());
        let db = Database::new(&dir.path().join("catalog.db"), transcoder.clone())
            .await
            .unwrap();

        let existing = dir.path().join("song.mp3");
        std::fs::write(&existing, b"kept").unwrap();
        let source = dir.path().join("song.flac");

        let err = db
            .register(NewMusic::new("B", "Band").flac(source.to_string_lossy()))
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Transcode { .. }));
        assert!(transcoder.calls().is_empty());
        assert_eq!(std::fs::read(&existing).unwrap(), b"kept");
        assert_eq!(db.count().await.unwrap(), 0);
        db.close().await.unwrap();
    }
}
