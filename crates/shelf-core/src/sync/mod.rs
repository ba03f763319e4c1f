//! Keeping the local cache and the remote store in step
//!
//! - `SyncEngine`: resolve, upload and delete of books
//! - `FileLocks`: serializes operations on the same file name
//!
//! The remote store is authoritative for metadata and progress; the cache
//! only ever adds content and relinks ids when reconciling.

mod engine;
mod locks;

pub use engine::SyncEngine;
pub use locks::FileLocks;
