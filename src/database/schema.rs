//! Database schema
//!
//! Every statement is `IF NOT EXISTS`, so this runs on each open.

use sqlx::{Pool, Sqlite};

use crate::error::Result;

/// Create tables and lookup indices if absent
pub async fn create_schema(pool: &Pool<Sqlite>) -> Result<()> {
    // Identity table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS Music (
            name TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            id INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_name ON Music (name);
        CREATE INDEX IF NOT EXISTS idx_id ON Music (id);
        "#,
    )
    .execute(pool)
    .await?;

    // Media table, one row per identity row
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS Music_info (
            id INTEGER PRIMARY KEY,
            file_mp3 TEXT NOT NULL,
            file_flac TEXT NOT NULL,
            json_meta TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_id2 ON Music_info (id);
        "#,
    )
    .execute(pool)
    .await?;

    // Key/value settings and counters
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS config (
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Size of the database file in bytes
pub async fn database_size(pool: &Pool<Sqlite>) -> Result<i64> {
    let size = sqlx::query_scalar::<_, i64>(
        "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
    )
    .fetch_one(pool)
    .await?;
    Ok(size)
}
