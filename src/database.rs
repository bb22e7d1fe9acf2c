//! Database module for the persistent catalog
//! Uses SQLite via sqlx for track identity, media locations and config entries

mod models;
mod ops;
mod repository;
mod schema;

pub use models::*;
pub use ops::NEXT_ID_KEY;
pub use repository::Database;
