//! Local persistence: the single-user application store.
//!
//! Layout:
//! - `models.rs`: row structs and RPC-facing inputs/views
//! - `schema.rs`: embedded SQLite DDL and its version
//! - `sqlite.rs`: connection, schema bootstrap, local user
//! - `servers.rs`, `searches.rs`, `files.rs`, `history.rs`, `settings.rs`:
//!   queries per entity, as `impl LocalStore` blocks

pub mod files;
pub mod history;
pub mod models;
pub mod schema;
pub mod searches;
pub mod servers;
pub mod settings;
pub mod sqlite;

pub use models::{AuthType, ServerRecord, ServerView};
pub use schema::SQLITE_INIT;
pub use sqlite::{LocalStore, SqlitePool};
