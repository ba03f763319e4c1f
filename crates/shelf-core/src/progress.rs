//! Reading progress
//!
//! Progress is an opaque offset into a book (scroll position for text,
//! page for PDFs). Saving pushes the offset to the remote record and then
//! writes the local cache, which happens whether or not the push succeeded.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{now_millis, CachedFile};
use crate::remote::{book_fields, progress_fields, Collection, Query, RemoteStore};
use crate::storage::LocalCache;
use crate::sync::FileLocks;

/// The book currently being read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingSession {
    pub file_name: String,
    pub title: String,
    /// Offset to restore when the reader opens
    pub progress: u64,
    pub is_pdf: bool,
}

impl ReadingSession {
    pub fn new(file: &CachedFile) -> Self {
        Self {
            file_name: file.file_name.clone(),
            title: file.title.clone(),
            progress: file.progress,
            is_pdf: file.is_pdf(),
        }
    }
}

/// How the remote record was brought up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteProgress {
    /// Updated through the cached remote id
    Updated { id: String },
    /// Found by file name and linked for next time
    Relinked { id: String },
    /// No remote record exists; progress is local only
    LocalOnly,
    /// The linked remote record is gone; the link was dropped
    Stale { id: String },
}

/// Result of a progress save
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// The file is not cached, so there was nothing to save
    NotCached,
    Saved(RemoteProgress),
}

/// Saves reading progress locally and remotely
pub struct ProgressTracker {
    cache: Arc<LocalCache>,
    remote: Arc<dyn RemoteStore>,
    locks: Arc<FileLocks>,
}

impl ProgressTracker {
    pub fn new(cache: Arc<LocalCache>, remote: Arc<dyn RemoteStore>, locks: Arc<FileLocks>) -> Self {
        Self {
            cache,
            remote,
            locks,
        }
    }

    /// Record `offset` as the progress of `file_name`
    ///
    /// The local entry is always written before this returns. If the remote
    /// write failed the error is `RemoteWriteFailed` and the local save
    /// stands. Offsets the cache cannot store are rejected up front.
    pub async fn save_progress(&self, file_name: &str, offset: u64) -> SyncResult<ProgressOutcome> {
        if i64::try_from(offset).is_err() {
            return Err(SyncError::InvalidInput(format!(
                "Progress {} is out of range",
                offset
            )));
        }

        let _guard = self.locks.acquire(file_name).await;

        let Some(mut file) = self.cache.get(file_name)? else {
            debug!("Not saving progress for uncached {}", file_name);
            return Ok(ProgressOutcome::NotCached);
        };

        let now = now_millis();
        file.progress = offset;
        file.last_read = now;

        let pushed = self.push(&mut file, now).await;
        self.cache.put(&file)?;

        pushed.map(ProgressOutcome::Saved)
    }

    /// Locally stored progress of `file_name`, if it is cached
    pub fn restore_progress(&self, file_name: &str) -> SyncResult<Option<u64>> {
        Ok(self.cache.get(file_name)?.map(|file| file.progress))
    }

    /// Push progress to the remote record, healing `file.remote_id` as needed
    async fn push(&self, file: &mut CachedFile, now: i64) -> SyncResult<RemoteProgress> {
        let fields = progress_fields(file.progress, now);

        if let Some(id) = file.remote_id.clone() {
            return match self.remote.update(Collection::Books, &id, fields).await {
                Ok(()) => Ok(RemoteProgress::Updated { id }),
                Err(e) if e.is_not_found() => {
                    warn!(
                        "Remote record {} for {} no longer exists, unlinking",
                        id, file.file_name
                    );
                    file.remote_id = None;
                    Ok(RemoteProgress::Stale { id })
                }
                Err(e) => {
                    warn!("Failed to push progress for {}: {}", file.file_name, e);
                    Err(SyncError::remote_write("save progress of", &file.file_name, e))
                }
            };
        }

        // Entries cached before remote ids were tracked: look up by name
        let query = Query::new()
            .where_eq(book_fields::FILE_NAME, file.file_name.as_str())
            .limit(1);
        let found = self
            .remote
            .find(Collection::Books, &query)
            .await
            .map_err(|e| {
                warn!("Failed to look up {} remotely: {}", file.file_name, e);
                SyncError::remote_write("save progress of", &file.file_name, e)
            })?;

        let Some(record) = found.first() else {
            debug!("No remote record for {}, progress kept locally", file.file_name);
            return Ok(RemoteProgress::LocalOnly);
        };

        self.remote
            .update(Collection::Books, &record.id, fields)
            .await
            .map_err(|e| {
                warn!("Failed to push progress for {}: {}", file.file_name, e);
                SyncError::remote_write("save progress of", &file.file_name, e)
            })?;

        info!("Linked {} to remote record {}", file.file_name, record.id);
        file.remote_id = Some(record.id.clone());
        Ok(RemoteProgress::Relinked {
            id: record.id.clone(),
        })
    }
}
