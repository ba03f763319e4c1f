//! Shelf Core Library
//!
//! Core of shelf, a personal e-reader backed by a remote object store. Books
//! live remotely; a local SQLite cache keeps their bytes and reading
//! positions so they open instantly and stay readable offline.
//!
//! # Architecture
//!
//! - **Remote store**: source of truth for the book list, metadata and
//!   reading progress
//! - **Local cache**: content plus a copy of the metadata, keyed by file name
//!
//! Opening a book reconciles the two: a cache miss downloads, a hit keeps
//! the cached bytes and takes the remote progress.
//!
//! # Quick Start
//!
//! ```text
//! let library = Library::open()?;
//!
//! let shelf = library.list_books().await?;
//! let opened = library.open_book(&shelf.remote_books()[0]).await?;
//! library.save_progress(&opened.session, 1200).await?;
//! ```
//!
//! # Modules
//!
//! - `library`: entry point tying everything together
//! - `sync`: cache/remote reconciliation and per-file locking
//! - `progress`: saving and restoring reading positions
//! - `posts`: blog post CRUD
//! - `decode` / `segment`: turning raw text into chapters
//! - `remote`: object store and blob fetcher traits plus HTTP implementations
//! - `storage`: the SQLite cache
//! - `config`: application configuration

pub mod config;
pub mod decode;
pub mod error;
pub mod library;
pub mod models;
pub mod posts;
pub mod progress;
pub mod remote;
pub mod segment;
pub mod storage;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use decode::TextDecoder;
pub use error::{SyncError, SyncResult};
pub use library::{BookContent, CacheStats, Library, OpenedBook, Shelf};
pub use models::{BookRecord, CacheEntry, CachedFile, Chapter, PostRecord};
pub use posts::PostService;
pub use progress::{ProgressOutcome, ProgressTracker, ReadingSession, RemoteProgress};
pub use remote::{RemoteError, RemoteStore};
pub use segment::TextSegmenter;
pub use storage::{LocalCache, StorageError};
pub use sync::{FileLocks, SyncEngine};
