//! Local book cache
//!
//! Durable key-value store of book files keyed by file name, backed by
//! SQLite. Holds the raw bytes plus the reading metadata needed to resume
//! offline. No business logic lives here; the sync engine and progress
//! tracker decide what to write.
//!
//! The connection sits behind a mutex so one `LocalCache` can be shared
//! across tasks. Every write is a single statement or transaction, so
//! writes to the same file name are serialized and last-write-wins.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{CacheEntry, CachedFile};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{init_schema, needs_init};

const FILE_COLUMNS: &str = "file_name, title, mime_type, content, last_read, progress, remote_id";

/// Typed wrapper over the cache database
pub struct LocalCache {
    conn: Mutex<Connection>,
}

impl LocalCache {
    /// Open the cache database configured in `config`
    pub fn open(config: &Config) -> StorageResult<Self> {
        Self::open_at(&config.cache_db_path())
    }

    /// Open or create a cache database at `path`
    pub fn open_at(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
        }

        let conn = Connection::open(path).map_err(|source| StorageError::OpenDatabase {
            path: path.to_path_buf(),
            source,
        })?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        debug!("Opened local cache at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory cache (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Get a cached file by name
    pub fn get(&self, file_name: &str) -> StorageResult<Option<CachedFile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files WHERE file_name = ?",
            FILE_COLUMNS
        ))?;

        let row = stmt
            .query_row(params![file_name], |row| FileRow::from_row(row))
            .optional()?;

        row.map(FileRow::into_cached_file).transpose()
    }

    /// Insert or replace a cached file
    pub fn put(&self, file: &CachedFile) -> StorageResult<()> {
        let progress = i64::try_from(file.progress).map_err(|_| StorageError::InvalidEntry {
            file_name: file.file_name.clone(),
            details: format!("progress {} out of range", file.progress),
        })?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO files (file_name, title, mime_type, content, last_read, progress, remote_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(file_name) DO UPDATE SET
                title = excluded.title,
                mime_type = excluded.mime_type,
                content = excluded.content,
                last_read = excluded.last_read,
                progress = excluded.progress,
                remote_id = excluded.remote_id
            "#,
            params![
                file.file_name,
                file.title,
                file.mime_type,
                file.content,
                file.last_read,
                progress,
                file.remote_id,
            ],
        )?;

        debug!(
            "Cached {} ({} bytes, progress {})",
            file.file_name,
            file.content.len(),
            file.progress
        );
        Ok(())
    }

    /// Delete a cached file
    ///
    /// Returns `false` if nothing was cached under that name.
    pub fn delete(&self, file_name: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM files WHERE file_name = ?", params![file_name])?;
        Ok(removed > 0)
    }

    /// Number of cached files
    pub fn count(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// All cached files, most recently read first
    pub fn list_all(&self) -> StorageResult<Vec<CachedFile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files ORDER BY last_read DESC, file_name",
            FILE_COLUMNS
        ))?;

        let rows = stmt.query_map([], |row| FileRow::from_row(row))?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?.into_cached_file()?);
        }
        Ok(files)
    }

    /// Metadata of all cached files without loading their content
    pub fn list_entries(&self) -> StorageResult<Vec<CacheEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT file_name, title, mime_type, length(content), last_read, progress, remote_id
            FROM files
            ORDER BY last_read DESC, file_name
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (file_name, title, mime_type, size, last_read, progress, remote_id) = row?;
            let progress = checked_progress(&file_name, progress)?;
            entries.push(CacheEntry {
                file_name,
                title,
                mime_type,
                size: size.max(0) as u64,
                last_read,
                progress,
                remote_id,
            });
        }
        Ok(entries)
    }

    /// Total bytes of cached content
    pub fn total_bytes(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(length(content)), 0) FROM files",
            [],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    /// Update only the last-read timestamp of a file
    ///
    /// Returns `false` if the file is not cached.
    pub fn touch(&self, file_name: &str, last_read: i64) -> StorageResult<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE files SET last_read = ? WHERE file_name = ?",
            params![last_read, file_name],
        )?;
        Ok(updated > 0)
    }

    /// Evict least-recently-read files until content fits in `max_bytes`
    ///
    /// `keep` is never evicted, even if it alone exceeds the budget.
    /// Returns the names of evicted files, oldest first.
    pub fn evict_to_fit(&self, max_bytes: u64, keep: Option<&str>) -> StorageResult<Vec<String>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let total: i64 = tx.query_row(
            "SELECT COALESCE(SUM(length(content)), 0) FROM files",
            [],
            |row| row.get(0),
        )?;
        let mut total = total.max(0) as u64;

        let mut evicted = Vec::new();
        if total > max_bytes {
            let candidates: Vec<(String, i64)> = {
                let mut stmt = tx.prepare(
                    "SELECT file_name, length(content) FROM files ORDER BY last_read ASC, file_name",
                )?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<Result<_, _>>()?
            };

            for (file_name, size) in candidates {
                if total <= max_bytes {
                    break;
                }
                if keep == Some(file_name.as_str()) {
                    continue;
                }
                tx.execute("DELETE FROM files WHERE file_name = ?", params![file_name])?;
                total = total.saturating_sub(size.max(0) as u64);
                evicted.push(file_name);
            }
        }

        tx.commit()?;

        if !evicted.is_empty() {
            info!(
                "Evicted {} cached file(s) to fit {} bytes",
                evicted.len(),
                max_bytes
            );
        }
        Ok(evicted)
    }
}

/// Raw row as read from SQLite, before range checks
struct FileRow {
    file_name: String,
    title: String,
    mime_type: String,
    content: Vec<u8>,
    last_read: i64,
    progress: i64,
    remote_id: Option<String>,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            file_name: row.get(0)?,
            title: row.get(1)?,
            mime_type: row.get(2)?,
            content: row.get(3)?,
            last_read: row.get(4)?,
            progress: row.get(5)?,
            remote_id: row.get(6)?,
        })
    }

    fn into_cached_file(self) -> StorageResult<CachedFile> {
        let progress = checked_progress(&self.file_name, self.progress)?;
        Ok(CachedFile {
            file_name: self.file_name,
            title: self.title,
            mime_type: self.mime_type,
            content: self.content,
            last_read: self.last_read,
            progress,
            remote_id: self.remote_id,
        })
    }
}

fn checked_progress(file_name: &str, progress: i64) -> StorageResult<u64> {
    u64::try_from(progress).map_err(|_| StorageError::InvalidEntry {
        file_name: file_name.to_string(),
        details: format!("negative progress {}", progress),
    })
}
