//! Reconciliation between remote book records and the local cache
//!
//! The remote store owns book metadata and progress; the local cache owns
//! content. `resolve` is the only path that downloads, and it never writes
//! to the remote store. Deletes go remote first so a failed remote delete
//! leaves the local copy in place.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{mime_for_file_name, now_millis, title_from_file_name, BookRecord, CachedFile};
use crate::remote::{book_fields, BlobFetcher, Collection, Fields, Query, RemoteStore};
use crate::storage::LocalCache;
use crate::sync::FileLocks;

/// Keeps the local cache consistent with remote book records
pub struct SyncEngine {
    cache: Arc<LocalCache>,
    remote: Arc<dyn RemoteStore>,
    fetcher: Arc<dyn BlobFetcher>,
    locks: Arc<FileLocks>,
    /// Byte budget for cached content; `None` means unbounded
    cache_limit: Option<u64>,
}

impl SyncEngine {
    pub fn new(
        cache: Arc<LocalCache>,
        remote: Arc<dyn RemoteStore>,
        fetcher: Arc<dyn BlobFetcher>,
        locks: Arc<FileLocks>,
    ) -> Self {
        Self {
            cache,
            remote,
            fetcher,
            locks,
            cache_limit: None,
        }
    }

    /// Evict least recently read files once cached content exceeds `limit` bytes
    pub fn with_cache_limit(mut self, limit: Option<u64>) -> Self {
        self.cache_limit = limit;
        self
    }

    /// Produce the local file for `book`, downloading it on a cache miss
    ///
    /// On a hit the cached content is kept and the entry is relinked to the
    /// record's id. The remote progress wins whenever the record carries one,
    /// including zero; a record without progress leaves the local value.
    /// Repeating the call with an unchanged record changes nothing further.
    pub async fn resolve(&self, book: &BookRecord) -> SyncResult<CachedFile> {
        let _guard = self.locks.acquire(&book.file_name).await;

        match self.cache.get(&book.file_name)? {
            Some(local) => Ok(self.reconcile(book, local)),
            None => self.download(book).await,
        }
    }

    fn reconcile(&self, book: &BookRecord, mut local: CachedFile) -> CachedFile {
        if local.remote_id.as_deref() != Some(book.id.as_str()) {
            debug!("Linking cached {} to remote record {}", local.file_name, book.id);
            local.remote_id = Some(book.id.clone());
        }

        if let Some(progress) = book.progress {
            if progress != local.progress {
                debug!(
                    "Taking remote progress for {}: {} -> {}",
                    local.file_name, local.progress, progress
                );
                local.progress = progress;
            }
        }

        // The merged record is still correct for this session if the write fails
        if let Err(e) = self.cache.put(&local) {
            warn!("Failed to persist reconciled {}: {}", local.file_name, e);
        }

        local
    }

    async fn download(&self, book: &BookRecord) -> SyncResult<CachedFile> {
        info!("Downloading {} from {}", book.file_name, book.file_url);

        let content = self
            .fetcher
            .fetch(&book.file_url)
            .await
            .map_err(|e| SyncError::retrieval(&book.file_url, e))?;

        let file = CachedFile::from_remote(book, content);
        self.cache.put(&file)?;
        debug!("Cached {} ({} bytes)", file.file_name, file.size());

        self.enforce_limit(&file.file_name);
        Ok(file)
    }

    /// Delete `book` remotely, then drop its local copy
    ///
    /// A record that is already gone remotely counts as deleted. Any other
    /// remote failure leaves the local copy untouched.
    pub async fn delete(&self, book: &BookRecord) -> SyncResult<()> {
        let _guard = self.locks.acquire(&book.file_name).await;

        match self.remote.delete(Collection::Books, &book.id).await {
            Ok(()) => info!("Deleted remote record {} ({})", book.id, book.file_name),
            Err(e) if e.is_not_found() => {
                info!("Remote record {} was already deleted", book.id);
            }
            Err(e) => return Err(SyncError::remote_write("delete", &book.file_name, e)),
        }

        if !self.cache.delete(&book.file_name)? {
            debug!("No cached copy of {} to delete", book.file_name);
        }
        Ok(())
    }

    /// Upload a new book and cache it locally
    ///
    /// File names are unique across the library; an existing record with the
    /// same name is rejected before anything is written. Once the remote
    /// record exists the upload has succeeded, even if caching it locally
    /// fails; the next `resolve` downloads it again.
    pub async fn upload(&self, file_name: &str, content: Vec<u8>) -> SyncResult<BookRecord> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(SyncError::InvalidInput("File name cannot be empty".to_string()));
        }

        let _guard = self.locks.acquire(file_name).await;

        if self.find_book(file_name).await?.is_some() {
            return Err(SyncError::AlreadyExists {
                file_name: file_name.to_string(),
            });
        }

        let mime_type = mime_for_file_name(file_name);
        let title = title_from_file_name(file_name);
        let last_read = now_millis();

        let file_url = self
            .remote
            .upload_file(file_name, content.clone(), mime_type)
            .await
            .map_err(|e| SyncError::remote_write("upload", file_name, e))?;

        let mut fields = Fields::new();
        fields.insert(book_fields::TITLE.into(), Value::from(title.as_str()));
        fields.insert(book_fields::FILE_NAME.into(), Value::from(file_name));
        fields.insert(book_fields::FILE_URL.into(), Value::from(file_url.as_str()));
        fields.insert(book_fields::MIME_TYPE.into(), Value::from(mime_type));
        fields.insert(book_fields::LAST_READ.into(), Value::from(last_read));
        fields.insert(book_fields::PROGRESS.into(), Value::from(0u64));

        let record = self
            .remote
            .create(Collection::Books, fields)
            .await
            .map_err(|e| SyncError::remote_write("create", file_name, e))?;
        info!("Uploaded {} as record {}", file_name, record.id);

        let book = BookRecord {
            id: record.id,
            title,
            file_name: file_name.to_string(),
            file_url,
            mime_type: mime_type.to_string(),
            last_read,
            progress: Some(0),
        };

        let mut file = CachedFile::from_remote(&book, content);
        file.last_read = last_read;
        match self.cache.put(&file) {
            Ok(()) => self.enforce_limit(file_name),
            Err(e) => warn!("Uploaded {} but failed to cache it: {}", file_name, e),
        }

        Ok(book)
    }

    /// All remote books, most recently read first
    ///
    /// Objects missing required fields are skipped.
    pub async fn list_books(&self) -> SyncResult<Vec<BookRecord>> {
        let query = Query::new().order_desc(book_fields::LAST_READ);
        let records = self
            .remote
            .find(Collection::Books, &query)
            .await
            .map_err(|e| SyncError::retrieval(Collection::Books.name(), e))?;

        Ok(records
            .iter()
            .filter_map(|record| match BookRecord::try_from(record) {
                Ok(book) => Some(book),
                Err(e) => {
                    warn!("Skipping remote book: {}", e);
                    None
                }
            })
            .collect())
    }

    /// The remote record for `file_name`, if there is one
    pub async fn find_book(&self, file_name: &str) -> SyncResult<Option<BookRecord>> {
        let query = Query::new()
            .where_eq(book_fields::FILE_NAME, file_name)
            .limit(1);
        let records = self
            .remote
            .find(Collection::Books, &query)
            .await
            .map_err(|e| SyncError::retrieval(file_name, e))?;

        match records.first() {
            Some(record) => BookRecord::try_from(record)
                .map(Some)
                .map_err(|e| SyncError::retrieval(file_name, e)),
            None => Ok(None),
        }
    }

    /// Trim the cache to its budget, keeping the evicted files' remote records
    ///
    /// Returns the evicted file names. Nothing happens without a budget.
    pub fn evict(&self, keep: Option<&str>) -> SyncResult<Vec<String>> {
        match self.cache_limit {
            Some(limit) => Ok(self.cache.evict_to_fit(limit, keep)?),
            None => Ok(Vec::new()),
        }
    }

    fn enforce_limit(&self, keep: &str) {
        if let Err(e) = self.evict(Some(keep)) {
            warn!("Cache eviction failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::progress::{ProgressOutcome, ProgressTracker, RemoteProgress};
    use crate::testing::{memory_cache, MemoryRemote};

    const BLOCKED: Duration = Duration::from_millis(50);

    fn engine(remote: &Arc<MemoryRemote>, cache: &Arc<LocalCache>) -> SyncEngine {
        SyncEngine::new(
            Arc::clone(cache),
            remote.clone(),
            remote.clone(),
            Arc::new(FileLocks::new()),
        )
    }

    #[tokio::test]
    async fn test_resolve_miss_downloads_and_caches() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"hello", Some(7));

        let file = engine(&remote, &cache).resolve(&book).await.unwrap();

        assert_eq!(file.content, b"hello");
        assert_eq!(file.progress, 7);
        assert_eq!(file.remote_id.as_deref(), Some(book.id.as_str()));
        assert_eq!(cache.get("a.txt").unwrap().unwrap(), file);
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_miss_without_remote_progress_starts_at_zero() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"hello", None);

        let file = engine(&remote, &cache).resolve(&book).await.unwrap();
        assert_eq!(file.progress, 0);
    }

    #[tokio::test]
    async fn test_resolve_fetch_failure_caches_nothing() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"hello", None);
        remote.fail_fetch(true);

        let err = engine(&remote, &cache).resolve(&book).await.unwrap_err();

        assert!(matches!(err, SyncError::RetrievalFailed { .. }));
        assert!(cache.get("a.txt").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_hit_relinks_and_takes_remote_progress() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"remote bytes", Some(30));

        // Legacy entry: no remote id, different content and progress
        cache
            .put(&CachedFile {
                file_name: "a.txt".to_string(),
                title: "a".to_string(),
                mime_type: "text/plain".to_string(),
                content: b"local bytes".to_vec(),
                last_read: 1,
                progress: 10,
                remote_id: None,
            })
            .unwrap();

        let file = engine(&remote, &cache).resolve(&book).await.unwrap();

        assert_eq!(file.content, b"local bytes");
        assert_eq!(file.progress, 30);
        assert_eq!(file.remote_id.as_deref(), Some(book.id.as_str()));
        assert_eq!(cache.get("a.txt").unwrap().unwrap(), file);
        assert_eq!(remote.fetch_count(), 0);
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_hit_remote_zero_progress_wins() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"x", Some(0));

        let engine = engine(&remote, &cache);
        engine.resolve(&book).await.unwrap();
        let mut local = cache.get("a.txt").unwrap().unwrap();
        local.progress = 500;
        cache.put(&local).unwrap();

        let file = engine.resolve(&book).await.unwrap();
        assert_eq!(file.progress, 0);
    }

    #[tokio::test]
    async fn test_resolve_hit_without_remote_progress_keeps_local() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"x", None);

        let engine = engine(&remote, &cache);
        engine.resolve(&book).await.unwrap();
        let mut local = cache.get("a.txt").unwrap().unwrap();
        local.progress = 42;
        cache.put(&local).unwrap();

        assert_eq!(engine.resolve(&book).await.unwrap().progress, 42);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"hello", Some(3));
        let engine = engine(&remote, &cache);

        let first = engine.resolve(&book).await.unwrap();
        let second = engine.resolve(&book).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(remote.fetch_count(), 1);
        assert_eq!(cache.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_remote_then_local() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"hello", None);
        let engine = engine(&remote, &cache);
        engine.resolve(&book).await.unwrap();

        engine.delete(&book).await.unwrap();

        assert!(remote.object(Collection::Books, &book.id).is_none());
        assert!(cache.get("a.txt").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_remote_failure_keeps_local() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"hello", None);
        let engine = engine(&remote, &cache);
        engine.resolve(&book).await.unwrap();
        remote.fail_writes(true);

        let err = engine.delete(&book).await.unwrap_err();

        assert!(matches!(err, SyncError::RemoteWriteFailed { operation: "delete", .. }));
        assert!(cache.get("a.txt").unwrap().is_some());
        assert!(remote.object(Collection::Books, &book.id).is_some());
    }

    #[tokio::test]
    async fn test_delete_already_gone_remotely_drops_local() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"hello", None);
        let engine = engine(&remote, &cache);
        engine.resolve(&book).await.unwrap();

        remote.delete(Collection::Books, &book.id).await.unwrap();

        engine.delete(&book).await.unwrap();
        assert!(cache.get("a.txt").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_without_local_copy() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let book = remote.seed_book("a.txt", b"hello", None);

        engine(&remote, &cache).delete(&book).await.unwrap();
        assert_eq!(remote.len(Collection::Books), 0);
    }

    #[tokio::test]
    async fn test_upload_creates_record_and_caches() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let engine = engine(&remote, &cache);

        let book = engine.upload("三体.txt", "第一章".as_bytes().to_vec()).await.unwrap();

        assert_eq!(book.title, "三体");
        assert_eq!(book.mime_type, "text/plain");
        assert_eq!(book.progress, Some(0));

        let stored = remote.object(Collection::Books, &book.id).unwrap();
        assert_eq!(stored.str_field(book_fields::FILE_NAME), Some("三体.txt"));

        let cached = cache.get("三体.txt").unwrap().unwrap();
        assert_eq!(cached.remote_id.as_deref(), Some(book.id.as_str()));
        assert_eq!(cached.content, "第一章".as_bytes());

        // The stored URL is downloadable
        remote.fetch(&book.file_url).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_rejects_duplicate_name() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        remote.seed_book("a.txt", b"one", None);

        let err = engine(&remote, &cache)
            .upload("a.txt", b"two".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::AlreadyExists { .. }));
        assert_eq!(remote.len(Collection::Books), 1);
        assert!(cache.get("a.txt").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_name() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let err = engine(&remote, &cache)
            .upload("  ", b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_upload_remote_failure_caches_nothing() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        remote.fail_writes(true);

        let err = engine(&remote, &cache)
            .upload("a.txt", b"x".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::RemoteWriteFailed { operation: "upload", .. }));
        assert_eq!(cache.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_succeeds_when_local_cache_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let cache = Arc::new(LocalCache::open_at(&path).unwrap());
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute("DROP TABLE files", [])
            .unwrap();
        let remote = MemoryRemote::new();

        let book = engine(&remote, &cache)
            .upload("a.txt", b"x".to_vec())
            .await
            .unwrap();

        assert_eq!(book.file_name, "a.txt");
        assert!(remote.object(Collection::Books, &book.id).is_some());
    }

    #[tokio::test]
    async fn test_list_books_most_recent_first() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let engine = engine(&remote, &cache);

        let old = remote.seed_book("old.txt", b"x", None);
        let new = remote.seed_book("new.txt", b"x", None);
        remote
            .update(Collection::Books, &new.id, crate::remote::progress_fields(0, 200))
            .await
            .unwrap();
        remote
            .update(Collection::Books, &old.id, crate::remote::progress_fields(0, 100))
            .await
            .unwrap();

        let names: Vec<String> = engine
            .list_books()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.file_name)
            .collect();
        assert_eq!(names, vec!["new.txt", "old.txt"]);
    }

    #[tokio::test]
    async fn test_find_book() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let engine = engine(&remote, &cache);
        let book = remote.seed_book("a.txt", b"x", None);

        assert_eq!(engine.find_book("a.txt").await.unwrap(), Some(book));
        assert_eq!(engine.find_book("b.txt").await.unwrap(), None);

        remote.fail_reads(true);
        assert!(matches!(
            engine.find_book("a.txt").await.unwrap_err(),
            SyncError::RetrievalFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_download_evicts_over_budget() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let engine = engine(&remote, &cache).with_cache_limit(Some(10));

        let first = remote.seed_book("first.txt", &[b'a'; 8], None);
        let second = remote.seed_book("second.txt", &[b'b'; 8], None);

        engine.resolve(&first).await.unwrap();
        // Make the first file clearly older than the second download
        cache.touch("first.txt", 1).unwrap();
        engine.resolve(&second).await.unwrap();

        assert!(cache.get("first.txt").unwrap().is_none());
        assert!(cache.get("second.txt").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_download_keeps_new_file_even_if_larger_than_budget() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let engine = engine(&remote, &cache).with_cache_limit(Some(4));
        let big = remote.seed_book("big.txt", &[b'x'; 16], None);

        engine.resolve(&big).await.unwrap();
        assert!(cache.get("big.txt").unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_resolves_download_once() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let engine = engine(&remote, &cache);
        let book = remote.seed_book("a.txt", b"hello", Some(3));

        let (first, second) = tokio::join!(engine.resolve(&book), engine.resolve(&book));

        assert_eq!(first.unwrap().content, b"hello");
        assert_eq!(second.unwrap().content, b"hello");
        assert_eq!(remote.fetch_count(), 1);
        assert_eq!(cache.count().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_progress_save_waits_for_download() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let locks = Arc::new(FileLocks::new());
        let engine = SyncEngine::new(
            Arc::clone(&cache),
            remote.clone(),
            remote.clone(),
            Arc::clone(&locks),
        );
        let tracker = ProgressTracker::new(Arc::clone(&cache), remote.clone(), locks);
        let book = remote.seed_book("a.txt", b"hello", Some(3));

        // The save queues behind the download instead of seeing an uncached file
        let (resolved, saved) =
            tokio::join!(engine.resolve(&book), tracker.save_progress("a.txt", 42));

        assert_eq!(resolved.unwrap().progress, 3);
        assert_eq!(
            saved.unwrap(),
            ProgressOutcome::Saved(RemoteProgress::Updated { id: book.id.clone() })
        );
        assert_eq!(cache.get("a.txt").unwrap().unwrap().progress, 42);
        let record = remote.object(Collection::Books, &book.id).unwrap();
        assert_eq!(record.i64_field(book_fields::PROGRESS), Some(42));
    }

    #[tokio::test]
    async fn test_operations_wait_for_file_lock() {
        let remote = MemoryRemote::new();
        let cache = memory_cache();
        let locks = Arc::new(FileLocks::new());
        let engine = SyncEngine::new(
            Arc::clone(&cache),
            remote.clone(),
            remote.clone(),
            Arc::clone(&locks),
        );
        let book = remote.seed_book("a.txt", b"hello", None);
        let other = remote.seed_book("b.txt", b"other", None);

        let guard = locks.acquire("a.txt").await;
        assert!(timeout(BLOCKED, engine.resolve(&book)).await.is_err());
        assert!(timeout(BLOCKED, engine.delete(&book)).await.is_err());
        assert!(timeout(BLOCKED, engine.upload("a.txt", b"x".to_vec()))
            .await
            .is_err());
        // Other files are unaffected
        engine.resolve(&other).await.unwrap();
        assert_eq!(remote.fetch_count(), 1);
        assert_eq!(remote.len(Collection::Books), 2);

        drop(guard);
        engine.resolve(&book).await.unwrap();
        assert_eq!(remote.fetch_count(), 2);
    }
}
