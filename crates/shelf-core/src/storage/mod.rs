//! Storage layer
//!
//! Local persistent cache of book files.
//!
//! ## Architecture
//!
//! - **SQLite**: one `files` table keyed by file name, content as BLOB
//! - **Remote store**: source of truth for library metadata; the cache holds
//!   a copy plus the bytes needed to read offline

pub mod cache;
pub mod error;
pub mod schema;

pub use cache::LocalCache;
pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
