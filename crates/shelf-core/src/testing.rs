//! In-memory collaborators for tests
//!
//! `MemoryRemote` behaves like the object store (insertion order is the
//! natural order, ids are server-assigned) and also serves blobs, so the
//! same instance can stand in for the remote store and the blob fetcher.
//! Failures are switched on per category.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{BookRecord, MIME_TEXT};
use crate::remote::{
    book_fields, BlobFetcher, Collection, Fields, Query, Record, RemoteError, RemoteResult,
    RemoteStore,
};
use crate::storage::LocalCache;

#[derive(Default)]
pub struct MemoryRemote {
    objects: Mutex<HashMap<Collection, Vec<Record>>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    counter: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_fetch: AtomicBool,
    writes: AtomicUsize,
    fetches: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, AtomicOrdering::SeqCst);
    }

    /// Successful create/update/delete/upload calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    /// Successful blob fetches so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(AtomicOrdering::SeqCst)
    }

    pub fn put_blob(&self, url: &str, content: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(url.to_string(), content.to_vec());
    }

    /// Seed a Books object and its blob without counting as a write
    pub fn seed_book(&self, file_name: &str, content: &[u8], progress: Option<u64>) -> BookRecord {
        let url = format!("https://files.test/seed/{}", file_name);
        self.put_blob(&url, content);

        let mut fields = Fields::new();
        fields.insert(book_fields::TITLE.into(), Value::from(file_name.trim_end_matches(".txt")));
        fields.insert(book_fields::FILE_NAME.into(), Value::from(file_name));
        fields.insert(book_fields::FILE_URL.into(), Value::from(url));
        fields.insert(book_fields::MIME_TYPE.into(), Value::from(MIME_TEXT));
        fields.insert(book_fields::LAST_READ.into(), Value::from(0));
        if let Some(progress) = progress {
            fields.insert(book_fields::PROGRESS.into(), Value::from(progress));
        }

        let record = self.insert(Collection::Books, fields);
        BookRecord::try_from(&record).unwrap()
    }

    /// Current state of an object
    pub fn object(&self, collection: Collection, id: &str) -> Option<Record> {
        self.objects
            .lock()
            .unwrap()
            .get(&collection)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned())
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.objects
            .lock()
            .unwrap()
            .get(&collection)
            .map_or(0, Vec::len)
    }

    fn insert(&self, collection: Collection, fields: Fields) -> Record {
        let n = self.counter.fetch_add(1, AtomicOrdering::SeqCst);
        let record = Record {
            id: uuid::Uuid::new_v4().simple().to_string()[..10].to_string(),
            created_at: format!("2026-01-01 00:{:02}:{:02}", n / 60, n % 60),
            fields,
        };
        self.objects
            .lock()
            .unwrap()
            .entry(collection)
            .or_default()
            .push(record.clone());
        record
    }

    fn check_reads(&self) -> RemoteResult<()> {
        if self.fail_reads.load(AtomicOrdering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                url: "memory://reads".to_string(),
            });
        }
        Ok(())
    }

    fn check_writes(&self) -> RemoteResult<()> {
        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                url: "memory://writes".to_string(),
            });
        }
        Ok(())
    }

    fn not_found(collection: Collection, id: &str) -> RemoteError {
        RemoteError::NotFound {
            collection: collection.name().to_string(),
            id: id.to_string(),
        }
    }
}

fn sort_key(record: &Record, field: &str) -> Value {
    if field == "createdAt" {
        return Value::from(record.created_at.clone());
    }
    record.fields.get(field).cloned().unwrap_or(Value::Null)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn create(&self, collection: Collection, fields: Fields) -> RemoteResult<Record> {
        self.check_writes()?;
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(self.insert(collection, fields))
    }

    async fn get(&self, collection: Collection, id: &str) -> RemoteResult<Option<Record>> {
        self.check_reads()?;
        Ok(self.object(collection, id))
    }

    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> RemoteResult<()> {
        self.check_writes()?;
        let mut objects = self.objects.lock().unwrap();
        let record = objects
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| Self::not_found(collection, id))?;
        record.fields.extend(fields);
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        self.check_writes()?;
        let mut objects = self.objects.lock().unwrap();
        let records = objects.entry(collection).or_default();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(Self::not_found(collection, id));
        }
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn find(&self, collection: Collection, query: &Query) -> RemoteResult<Vec<Record>> {
        self.check_reads()?;
        let objects = self.objects.lock().unwrap();
        let mut records: Vec<Record> = objects
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| {
                        query
                            .equals
                            .iter()
                            .all(|(field, value)| r.fields.get(field) == Some(value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            records.sort_by(|a, b| {
                let ord = compare_values(&sort_key(a, &order.field), &sort_key(b, &order.field));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn upload_file(
        &self,
        file_name: &str,
        content: Vec<u8>,
        _mime_type: &str,
    ) -> RemoteResult<String> {
        self.check_writes()?;
        let n = self.counter.fetch_add(1, AtomicOrdering::SeqCst);
        // Scheme-less, like the real file store sometimes returns
        let url = format!("//files.test/{}/{}", n, file_name);
        self.blobs
            .lock()
            .unwrap()
            .insert(crate::remote::normalize_url(&url), content);
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(url)
    }
}

#[async_trait]
impl BlobFetcher for MemoryRemote {
    async fn fetch(&self, url: &str) -> RemoteResult<Vec<u8>> {
        // Let other tasks run mid-download, like a real network fetch
        tokio::task::yield_now().await;
        let url = crate::remote::normalize_url(url);
        if self.fail_fetch.load(AtomicOrdering::SeqCst) {
            return Err(RemoteError::Status { status: 502, url });
        }
        let content = self
            .blobs
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or(RemoteError::Status { status: 404, url })?;
        self.fetches.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(content)
    }
}

/// Shared in-memory cache
pub fn memory_cache() -> Arc<LocalCache> {
    Arc::new(LocalCache::open_in_memory().unwrap())
}
