//! Substring search over composite names

use sqlx::{Pool, Sqlite};
use tracing::debug;

use crate::error::Result;

/// Ids of every identity row whose name contains `fragment`
///
/// Case-sensitive: `instr` compares bytes, unlike `LIKE`. Result order is
/// the scan order and carries no meaning.
pub async fn search_by_name(pool: &Pool<Sqlite>, fragment: &str) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM Music WHERE instr(name, ?) > 0")
        .bind(fragment)
        .fetch_all(pool)
        .await?;

    debug!("search_by_name({:?}) -> {} matches", fragment, ids.len());
    Ok(ids)
}
