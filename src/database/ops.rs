//! Database operations organized by concern

mod config;
mod music;
mod search;

pub use config::*;
pub use music::*;
pub use search::*;
