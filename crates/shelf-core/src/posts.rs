//! Blog posts
//!
//! Plain CRUD over the remote "Posts" collection. Posts never touch the
//! local cache.

use std::sync::Arc;

use chrono::Local;
use serde_json::Value;
use tracing::info;

use crate::error::{SyncError, SyncResult};
use crate::models::PostRecord;
use crate::remote::{post_fields, Collection, Fields, Query, RemoteStore};

pub struct PostService {
    remote: Arc<dyn RemoteStore>,
}

/// Trimmed title and content, both required
fn validated(title: &str, content: &str) -> SyncResult<(String, String)> {
    let title = title.trim();
    let content = content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(SyncError::InvalidInput(
            "Post title and content cannot be empty".to_string(),
        ));
    }
    Ok((title.to_string(), content.to_string()))
}

impl PostService {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// All posts, newest first
    pub async fn list(&self) -> SyncResult<Vec<PostRecord>> {
        let query = Query::new().order_desc(post_fields::CREATED_AT);
        let records = self
            .remote
            .find(Collection::Posts, &query)
            .await
            .map_err(|e| SyncError::retrieval(Collection::Posts.name(), e))?;
        Ok(records.iter().map(PostRecord::from).collect())
    }

    pub async fn get(&self, id: &str) -> SyncResult<Option<PostRecord>> {
        let record = self
            .remote
            .get(Collection::Posts, id)
            .await
            .map_err(|e| SyncError::retrieval(format!("post {}", id), e))?;
        Ok(record.as_ref().map(PostRecord::from))
    }

    /// Publish a new post dated today
    pub async fn create(&self, title: &str, content: &str) -> SyncResult<PostRecord> {
        let (title, content) = validated(title, content)?;

        let mut fields = Fields::new();
        fields.insert(post_fields::TITLE.into(), Value::from(title.as_str()));
        fields.insert(post_fields::CONTENT.into(), Value::from(content.as_str()));
        fields.insert(
            post_fields::DATE.into(),
            Value::from(Local::now().format("%Y-%m-%d").to_string()),
        );

        let record = self
            .remote
            .create(Collection::Posts, fields)
            .await
            .map_err(|e| SyncError::remote_write("create", title.as_str(), e))?;

        info!("Created post {}", record.id);
        Ok(PostRecord::from(&record))
    }

    /// Replace the title and content of a post; its date is kept
    pub async fn update(&self, id: &str, title: &str, content: &str) -> SyncResult<()> {
        let (title, content) = validated(title, content)?;

        let mut fields = Fields::new();
        fields.insert(post_fields::TITLE.into(), Value::from(title));
        fields.insert(post_fields::CONTENT.into(), Value::from(content));

        self.remote
            .update(Collection::Posts, id, fields)
            .await
            .map_err(|e| SyncError::remote_write("update", format!("post {}", id), e))?;

        info!("Updated post {}", id);
        Ok(())
    }

    /// Delete a post; returns `false` if it did not exist
    pub async fn delete(&self, id: &str) -> SyncResult<bool> {
        match self.remote.delete(Collection::Posts, id).await {
            Ok(()) => {
                info!("Deleted post {}", id);
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(SyncError::remote_write("delete", format!("post {}", id), e)),
        }
    }
}
