//! Key/value config entries and the id counter stored among them

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{CatalogError, Result};

/// Config entry holding the next id to issue
pub const NEXT_ID_KEY: &str = "next_id";

/// Look up a config value
///
/// A missing entry yields `default` when given (persisting it when `create`
/// is set) and `NotFound` otherwise. An existing entry ignores both.
pub async fn get_config(
    conn: &mut SqliteConnection,
    name: &str,
    default: Option<&str>,
    create: bool,
) -> Result<String> {
    let stored = sqlx::query_scalar::<_, String>("SELECT value FROM config WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    let value = match (stored, default) {
        (Some(value), _) => value,
        (None, None) => return Err(CatalogError::config_not_found(name)),
        (None, Some(default)) => {
            if create {
                sqlx::query("INSERT INTO config (name, value) VALUES (?, ?)")
                    .bind(name)
                    .bind(default)
                    .execute(&mut *conn)
                    .await?;
            }
            default.to_string()
        }
    };

    debug!(
        "get_config(name={}, default={:?}, create={}) -> {}",
        name, default, create, value
    );
    Ok(value)
}

/// Update an existing config entry, returns the number of rows changed
///
/// Never creates the entry; a missing name changes nothing.
pub async fn set_config(conn: &mut SqliteConnection, name: &str, value: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE config SET value = ? WHERE name = ?")
        .bind(value)
        .bind(name)
        .execute(&mut *conn)
        .await?;

    debug!(
        "set_config(name={}, value={}) affected {} rows",
        name,
        value,
        result.rows_affected()
    );
    Ok(result.rows_affected())
}

/// Issue the next id and advance the counter
///
/// Callers must run this inside a transaction that also holds the store's
/// write lock.
pub async fn next_id(conn: &mut SqliteConnection) -> Result<i64> {
    let raw = get_config(conn, NEXT_ID_KEY, Some("0"), true).await?;
    let id: i64 = raw.trim().parse().map_err(|_| {
        CatalogError::InvalidInput(format!("{} holds a non-numeric value: {:?}", NEXT_ID_KEY, raw))
    })?;

    set_config(conn, NEXT_ID_KEY, &(id + 1).to_string()).await?;
    debug!("next_id() -> {}", id);
    Ok(id)
}
