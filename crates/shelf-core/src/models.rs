//! Data models for shelf
//!
//! - `BookRecord`: a book as stored in the remote "Books" collection
//! - `CachedFile`: a book's local copy, keyed by file name
//! - `PostRecord`: a blog post in the remote "Posts" collection
//! - `Chapter`: a navigable span of decoded text (never persisted)
//!
//! Timestamps are milliseconds since the Unix epoch, matching what the
//! remote store holds for `lastRead`.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert epoch milliseconds to a UTC datetime for display
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Guess the MIME type of an uploaded file from its name
pub fn mime_for_file_name(file_name: &str) -> &'static str {
    if file_name.to_ascii_lowercase().ends_with(".pdf") {
        MIME_PDF
    } else {
        MIME_TEXT
    }
}

/// Display title for a file: its name with a `.txt`/`.pdf` suffix removed
pub fn title_from_file_name(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    for ext in [".txt", ".pdf"] {
        if lower.ends_with(ext) && file_name.len() > ext.len() {
            return file_name[..file_name.len() - ext.len()].to_string();
        }
    }
    file_name.to_string()
}

/// A book as known to the remote store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookRecord {
    /// Remote object id
    pub id: String,
    pub title: String,
    /// Natural key shared with the local cache
    pub file_name: String,
    /// Where the book's bytes can be downloaded from
    pub file_url: String,
    pub mime_type: String,
    pub last_read: i64,
    /// Remote progress, if the record carries one
    pub progress: Option<u64>,
}

impl BookRecord {
    pub fn is_pdf(&self) -> bool {
        self.mime_type == MIME_PDF || self.file_name.to_ascii_lowercase().ends_with(".pdf")
    }
}

/// A locally cached book
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedFile {
    /// Primary key
    pub file_name: String,
    pub title: String,
    pub mime_type: String,
    /// Raw book bytes, exactly as downloaded or uploaded
    #[serde(skip)]
    pub content: Vec<u8>,
    pub last_read: i64,
    pub progress: u64,
    /// Id of the matching `BookRecord`, when known
    pub remote_id: Option<String>,
}

impl CachedFile {
    /// Build a fresh cache entry from a remote record and its downloaded bytes
    pub fn from_remote(book: &BookRecord, content: Vec<u8>) -> Self {
        Self {
            file_name: book.file_name.clone(),
            title: book.title.clone(),
            mime_type: book.mime_type.clone(),
            content,
            last_read: now_millis(),
            progress: book.progress.unwrap_or(0),
            remote_id: Some(book.id.clone()),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == MIME_PDF || self.file_name.to_ascii_lowercase().ends_with(".pdf")
    }

    /// Size of the cached content in bytes
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Summary of a cache entry without its content
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub file_name: String,
    pub title: String,
    pub mime_type: String,
    pub size: u64,
    pub last_read: i64,
    pub progress: u64,
    pub remote_id: Option<String>,
}

/// A blog post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Human-facing date set when the post was written
    pub date: String,
    /// Server-assigned creation timestamp
    pub created_at: String,
}

impl PostRecord {
    /// Date to show in listings; falls back to the creation timestamp
    pub fn display_date(&self) -> &str {
        if self.date.is_empty() {
            &self.created_at
        } else {
            &self.date
        }
    }
}

/// A titled span of a text book
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Chapter {
    /// Heading line, preamble title or page title; may be empty
    pub title: String,
    pub content: String,
    /// Position-derived id used for navigation
    pub anchor: String,
}
