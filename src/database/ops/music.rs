//! Identity and media row operations

use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::database::{DbMusic, DbMusicInfo, MusicInfo};
use crate::error::{CatalogError, Result};

/// Insert an identity row, mapping a name collision to `DuplicateName`
pub async fn insert_music(conn: &mut SqliteConnection, music: &DbMusic) -> Result<()> {
    sqlx::query("INSERT INTO Music (name, title, artist, id) VALUES (?, ?, ?, ?)")
        .bind(&music.name)
        .bind(&music.title)
        .bind(&music.artist)
        .bind(music.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if CatalogError::is_unique_violation(&e) {
                CatalogError::DuplicateName(music.name.clone())
            } else {
                CatalogError::Database(e)
            }
        })?;
    Ok(())
}

/// Insert the media row for an id
pub async fn insert_music_info(conn: &mut SqliteConnection, info: &DbMusicInfo) -> Result<()> {
    sqlx::query(
        "INSERT INTO Music_info (id, file_mp3, file_flac, json_meta) VALUES (?, ?, ?, ?)",
    )
    .bind(info.id)
    .bind(&info.file_mp3)
    .bind(&info.file_flac)
    .bind(&info.json_meta)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Whether a composite name is already registered
pub async fn name_exists(pool: &Pool<Sqlite>, name: &str) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM Music WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Get the joined identity + media view of an id
///
/// `None` unless both rows exist.
pub async fn get_music_info(pool: &Pool<Sqlite>, id: i64) -> Result<Option<MusicInfo>> {
    let info = sqlx::query_as::<_, MusicInfo>(
        r#"
        SELECT m.id, m.name, m.title, m.artist, i.file_mp3, i.file_flac
        FROM Music m
        JOIN Music_info i ON i.id = m.id
        WHERE m.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(info)
}

/// Get the identity row of an id
pub async fn get_music(pool: &Pool<Sqlite>, id: i64) -> Result<Option<DbMusic>> {
    let music = sqlx::query_as::<_, DbMusic>("SELECT * FROM Music WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(music)
}

/// Get the raw metadata string of an id
pub async fn get_json_meta(pool: &Pool<Sqlite>, id: i64) -> Result<Option<String>> {
    let meta = sqlx::query_scalar::<_, String>("SELECT json_meta FROM Music_info WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(meta)
}

/// Number of identity rows
pub async fn count_music(pool: &Pool<Sqlite>) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM Music")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
