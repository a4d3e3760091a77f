//! SQLite persistence for suggestions, the activity trail, and per-team
//! usage counters.

pub mod activity;
pub mod database;
pub mod error;
pub mod row_helpers;
pub mod schema;
pub mod suggestions;
pub mod usage;

pub use database::Database;
pub use error::StoreError;
