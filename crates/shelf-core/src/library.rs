//! The reader's library
//!
//! `Library` wires the local cache, the remote store and the blob fetcher
//! together and exposes what a client does with them: list books, open one
//! for reading, save progress, upload and delete, and manage posts.
//!
//! ## Usage
//!
//! ```ignore
//! let library = Library::open()?;
//!
//! let shelf = library.list_books().await?;
//! let book = &shelf.remote_books()[0];
//!
//! let opened = library.open_book(book).await?;
//! library.save_progress(&opened.session, 1200).await?;
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::decode::TextDecoder;
use crate::error::SyncResult;
use crate::models::{now_millis, BookRecord, CacheEntry, CachedFile, Chapter};
use crate::posts::PostService;
use crate::progress::{ProgressOutcome, ProgressTracker, ReadingSession};
use crate::remote::{BlobFetcher, BmobClient, HttpFetcher, RemoteStore, Unconfigured};
use crate::segment::TextSegmenter;
use crate::storage::LocalCache;
use crate::sync::{FileLocks, SyncEngine};

/// Books available to the reader
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Shelf {
    /// Listing from the remote store, most recently read first
    Remote { books: Vec<BookRecord> },
    /// The remote store was unreachable; only cached books are listed
    Offline {
        files: Vec<CacheEntry>,
        reason: String,
    },
}

impl Shelf {
    pub fn is_offline(&self) -> bool {
        matches!(self, Shelf::Offline { .. })
    }

    /// Remote records, empty when offline
    pub fn remote_books(&self) -> &[BookRecord] {
        match self {
            Shelf::Remote { books } => books,
            Shelf::Offline { .. } => &[],
        }
    }
}

/// Renderable content of an opened book
#[derive(Debug, Clone, PartialEq)]
pub enum BookContent {
    Text(Vec<Chapter>),
    /// Raw PDF bytes for an external renderer
    Pdf(Vec<u8>),
}

/// A book ready for display
#[derive(Debug, Clone)]
pub struct OpenedBook {
    pub session: ReadingSession,
    pub content: BookContent,
}

impl OpenedBook {
    pub fn chapters(&self) -> &[Chapter] {
        match &self.content {
            BookContent::Text(chapters) => chapters,
            BookContent::Pdf(_) => &[],
        }
    }
}

/// Cache usage summary
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub files: u64,
    pub total_bytes: u64,
    pub limit_bytes: Option<u64>,
}

pub struct Library {
    config: Config,
    cache: Arc<LocalCache>,
    engine: SyncEngine,
    tracker: ProgressTracker,
    posts: PostService,
    decoder: TextDecoder,
    segmenter: TextSegmenter,
    remote_configured: bool,
}

impl Library {
    /// Open the library with configuration from the default location
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the library with a specific configuration
    ///
    /// Without remote credentials the library still opens; remote
    /// operations then fail and listings fall back to the cache.
    pub fn open_with_config(config: Config) -> Result<Self> {
        let cache = LocalCache::open(&config).context("Failed to open local cache")?;

        let remote: Arc<dyn RemoteStore> = if config.remote.is_configured() {
            Arc::new(BmobClient::new(&config.remote).context("Failed to create remote client")?)
        } else {
            warn!("Remote credentials not configured, running offline");
            Arc::new(Unconfigured)
        };
        let fetcher = HttpFetcher::new(config.remote.timeout_secs)
            .context("Failed to create HTTP client")?;

        let remote_configured = config.remote.is_configured();
        let mut library = Self::with_parts(config, Arc::new(cache), remote, Arc::new(fetcher))?;
        library.remote_configured = remote_configured;
        Ok(library)
    }

    /// Assemble a library from already-built collaborators
    pub fn with_parts(
        config: Config,
        cache: Arc<LocalCache>,
        remote: Arc<dyn RemoteStore>,
        fetcher: Arc<dyn BlobFetcher>,
    ) -> SyncResult<Self> {
        let decoder = TextDecoder::new(&config.reader.legacy_encoding)?;
        let segmenter = TextSegmenter::new(&config.reader);
        let locks = Arc::new(FileLocks::new());

        let engine = SyncEngine::new(
            Arc::clone(&cache),
            Arc::clone(&remote),
            fetcher,
            Arc::clone(&locks),
        )
        .with_cache_limit(config.cache_limit_bytes());
        let tracker = ProgressTracker::new(Arc::clone(&cache), Arc::clone(&remote), locks);
        let posts = PostService::new(remote);

        Ok(Self {
            config,
            cache,
            engine,
            tracker,
            posts,
            decoder,
            segmenter,
            remote_configured: true,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether remote credentials were configured when the library opened
    pub fn is_remote_configured(&self) -> bool {
        self.remote_configured
    }

    // ==================== Books ====================

    /// List books, falling back to the cache when the remote is unreachable
    pub async fn list_books(&self) -> SyncResult<Shelf> {
        match self.engine.list_books().await {
            Ok(books) => Ok(Shelf::Remote { books }),
            Err(e) => {
                warn!("Listing cached books only: {}", e);
                Ok(Shelf::Offline {
                    files: self.cache.list_entries()?,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// The remote record for `file_name`
    pub async fn find_book(&self, file_name: &str) -> SyncResult<Option<BookRecord>> {
        self.engine.find_book(file_name).await
    }

    /// Upload a new book; it is cached and ready to open afterwards
    pub async fn upload(&self, file_name: &str, content: Vec<u8>) -> SyncResult<BookRecord> {
        self.engine.upload(file_name, content).await
    }

    /// Resolve `book` against the cache and prepare it for reading
    pub async fn open_book(&self, book: &BookRecord) -> SyncResult<OpenedBook> {
        let file = self.engine.resolve(book).await?;
        self.render(file)
    }

    /// Open a book straight from the cache without contacting the remote
    pub fn open_cached(&self, file_name: &str) -> SyncResult<Option<OpenedBook>> {
        match self.cache.get(file_name)? {
            Some(file) => self.render(file).map(Some),
            None => Ok(None),
        }
    }

    fn render(&self, file: CachedFile) -> SyncResult<OpenedBook> {
        if let Err(e) = self.cache.touch(&file.file_name, now_millis()) {
            warn!("Failed to update last read for {}: {}", file.file_name, e);
        }

        let session = ReadingSession::new(&file);
        let content = if file.is_pdf() {
            BookContent::Pdf(file.content)
        } else {
            let text = self.decoder.decode(&file.file_name, &file.content)?;
            BookContent::Text(self.segmenter.segment(&text))
        };

        info!("Opened {} at offset {}", session.file_name, session.progress);
        Ok(OpenedBook { session, content })
    }

    /// Save the reading position of an open book
    pub async fn save_progress(
        &self,
        session: &ReadingSession,
        offset: u64,
    ) -> SyncResult<ProgressOutcome> {
        self.tracker.save_progress(&session.file_name, offset).await
    }

    /// Save the reading position of a cached book by name
    pub async fn save_progress_for(&self, file_name: &str, offset: u64) -> SyncResult<ProgressOutcome> {
        self.tracker.save_progress(file_name, offset).await
    }

    pub fn restore_progress(&self, file_name: &str) -> SyncResult<Option<u64>> {
        self.tracker.restore_progress(file_name)
    }

    /// Delete a book remotely and locally
    pub async fn delete_book(&self, book: &BookRecord) -> SyncResult<()> {
        self.engine.delete(book).await
    }

    // ==================== Posts ====================

    pub fn posts(&self) -> &PostService {
        &self.posts
    }

    // ==================== Cache ====================

    pub fn cached_files(&self) -> SyncResult<Vec<CacheEntry>> {
        Ok(self.cache.list_entries()?)
    }

    pub fn cache_stats(&self) -> SyncResult<CacheStats> {
        Ok(CacheStats {
            files: self.cache.count()?,
            total_bytes: self.cache.total_bytes()?,
            limit_bytes: self.config.cache_limit_bytes(),
        })
    }

    /// Trim the cache to the configured budget
    pub fn evict(&self) -> SyncResult<Vec<String>> {
        self.engine.evict(None)
    }

    /// Drop a file from the cache only; its remote record is untouched
    pub fn remove_cached(&self, file_name: &str) -> SyncResult<bool> {
        Ok(self.cache.delete(file_name)?)
    }
}
