//! Remote collaborators
//!
//! - `RemoteStore`: schemaless object store with named collections
//!   ("Books", "Posts"), queried by field equality and ordered by a field
//! - `BlobFetcher`: downloads raw bytes from a URL
//!
//! Both are traits so the sync engine can run against the Bmob REST backend
//! (`bmob`) or an in-memory double in tests.

mod bmob;
mod error;
mod fetch;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::{BookRecord, PostRecord};

pub use bmob::BmobClient;
pub use error::{RemoteError, RemoteResult};
pub use fetch::{normalize_url, HttpFetcher};

/// Field map of a remote object
pub type Fields = Map<String, Value>;

/// Field names used in the "Books" collection
pub mod book_fields {
    pub const TITLE: &str = "title";
    pub const FILE_NAME: &str = "fileName";
    pub const FILE_URL: &str = "fileUrl";
    pub const MIME_TYPE: &str = "type";
    pub const LAST_READ: &str = "lastRead";
    pub const PROGRESS: &str = "progress";
}

/// Field names used in the "Posts" collection
pub mod post_fields {
    pub const TITLE: &str = "title";
    pub const CONTENT: &str = "content";
    pub const DATE: &str = "date";
    pub const CREATED_AT: &str = "createdAt";
}

/// Named collections in the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Books,
    Posts,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Books => "Books",
            Collection::Posts => "Posts",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A remote object: server id, server creation time, and its fields
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub created_at: String,
    pub fields: Fields,
}

impl Record {
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Integer field; fractional numbers are truncated
    pub fn i64_field(&self, name: &str) -> Option<i64> {
        let value = self.fields.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
    }
}

/// Sort order for `find`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

/// Filter and ordering for `find`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Field equality constraints, all of which must hold
    pub equals: Vec<(String, Value)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.equals.push((field.to_string(), value.into()));
        self
    }

    pub fn order_asc(mut self, field: &str) -> Self {
        self.order = Some(Order {
            field: field.to_string(),
            descending: false,
        });
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order = Some(Order {
            field: field.to_string(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Schemaless remote object store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create an object; the returned record carries the server id
    async fn create(&self, collection: Collection, fields: Fields) -> RemoteResult<Record>;

    /// Fetch an object by id; `None` if it does not exist
    async fn get(&self, collection: Collection, id: &str) -> RemoteResult<Option<Record>>;

    /// Overwrite the given fields of an existing object
    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> RemoteResult<()>;

    /// Delete an object; `RemoteError::NotFound` if it is already gone
    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()>;

    /// Objects matching `query`, in the requested (or store-natural) order
    async fn find(&self, collection: Collection, query: &Query) -> RemoteResult<Vec<Record>>;

    /// Store a file and return the URL it can be fetched from
    async fn upload_file(
        &self,
        file_name: &str,
        content: Vec<u8>,
        mime_type: &str,
    ) -> RemoteResult<String>;
}

/// Downloads raw bytes
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> RemoteResult<Vec<u8>>;
}

/// Remote store used when no credentials are configured
///
/// Every call fails with `RemoteError::NotConfigured`, so cached books stay
/// readable while remote operations report what is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl RemoteStore for Unconfigured {
    async fn create(&self, _: Collection, _: Fields) -> RemoteResult<Record> {
        Err(RemoteError::NotConfigured)
    }

    async fn get(&self, _: Collection, _: &str) -> RemoteResult<Option<Record>> {
        Err(RemoteError::NotConfigured)
    }

    async fn update(&self, _: Collection, _: &str, _: Fields) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete(&self, _: Collection, _: &str) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn find(&self, _: Collection, _: &Query) -> RemoteResult<Vec<Record>> {
        Err(RemoteError::NotConfigured)
    }

    async fn upload_file(&self, _: &str, _: Vec<u8>, _: &str) -> RemoteResult<String> {
        Err(RemoteError::NotConfigured)
    }
}

impl TryFrom<&Record> for BookRecord {
    type Error = RemoteError;

    fn try_from(record: &Record) -> RemoteResult<Self> {
        let required = |name: &str| {
            record
                .str_field(name)
                .map(str::to_string)
                .ok_or_else(|| {
                    RemoteError::Malformed(format!(
                        "Books object '{}' has no '{}' field",
                        record.id, name
                    ))
                })
        };

        let file_name = required(book_fields::FILE_NAME)?;
        let file_url = required(book_fields::FILE_URL)?;
        let title = record
            .str_field(book_fields::TITLE)
            .map(str::to_string)
            .unwrap_or_else(|| crate::models::title_from_file_name(&file_name));
        let mime_type = record
            .str_field(book_fields::MIME_TYPE)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| crate::models::mime_for_file_name(&file_name).to_string());

        Ok(BookRecord {
            id: record.id.clone(),
            title,
            file_name,
            file_url,
            mime_type,
            last_read: record.i64_field(book_fields::LAST_READ).unwrap_or(0),
            progress: record
                .i64_field(book_fields::PROGRESS)
                .map(|p| p.max(0) as u64),
        })
    }
}

impl From<&Record> for PostRecord {
    fn from(record: &Record) -> Self {
        let text = |name: &str| record.str_field(name).unwrap_or_default().to_string();
        PostRecord {
            id: record.id.clone(),
            title: text(post_fields::TITLE),
            content: text(post_fields::CONTENT),
            date: text(post_fields::DATE),
            created_at: record.created_at.clone(),
        }
    }
}

/// Fields for a progress update of a Books object
pub fn progress_fields(progress: u64, last_read: i64) -> Fields {
    let mut fields = Fields::new();
    fields.insert(book_fields::PROGRESS.to_string(), Value::from(progress));
    fields.insert(book_fields::LAST_READ.to_string(), Value::from(last_read));
    fields
}
