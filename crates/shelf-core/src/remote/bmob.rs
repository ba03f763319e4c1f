//! Bmob REST backend
//!
//! Talks to the Bmob cloud REST API:
//! - objects: `/1/classes/{Collection}[/{objectId}]`
//! - files:   `/2/files/{fileName}`
//!
//! Every request carries the application id and REST key headers. Error
//! responses have the shape `{"code": 101, "error": "..."}`; code 101 means
//! the object does not exist.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Collection, Fields, Query, Record, RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteConfig;

const HEADER_APP_ID: &str = "X-Bmob-Application-Id";
const HEADER_API_KEY: &str = "X-Bmob-REST-API-Key";

/// Bmob error code for a missing object
const CODE_OBJECT_NOT_FOUND: i64 = 101;

/// Fields the server manages; never part of `Record::fields`
const RESERVED_FIELDS: &[&str] = &["objectId", "createdAt", "updatedAt", "ACL"];

#[derive(Deserialize)]
struct ApiErrorBody {
    code: i64,
    error: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedBody {
    object_id: String,
    #[serde(default)]
    created_at: String,
}

#[derive(Deserialize)]
struct ResultsBody {
    results: Vec<Value>,
}

#[derive(Deserialize)]
struct FileBody {
    url: String,
}

/// REST client for the Bmob object store
pub struct BmobClient {
    http: reqwest::Client,
    base_url: Url,
    application_id: String,
    rest_api_key: String,
}

impl BmobClient {
    /// Build a client from configuration
    ///
    /// Fails with `NotConfigured` when credentials are missing.
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let (Some(application_id), Some(rest_api_key)) = (
            config.application_id.clone().filter(|s| !s.is_empty()),
            config.rest_api_key.clone().filter(|s| !s.is_empty()),
        ) else {
            return Err(RemoteError::NotConfigured);
        };

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            RemoteError::Malformed(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            application_id,
            rest_api_key,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RemoteError::Malformed(format!("base URL '{}' cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, collection: Collection, id: Option<&str>) -> RemoteResult<Url> {
        match id {
            Some(id) => self.endpoint(&["1", "classes", collection.name(), id]),
            None => self.endpoint(&["1", "classes", collection.name()]),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(HEADER_APP_ID, &self.application_id)
            .header(HEADER_API_KEY, &self.rest_api_key)
    }

    /// Send a request and parse the JSON body, mapping error payloads
    async fn send(&self, builder: RequestBuilder) -> RemoteResult<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        let body = response.bytes().await?;

        if status.is_success() {
            if body.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_slice(&body)?);
        }

        match serde_json::from_slice::<ApiErrorBody>(&body) {
            Ok(err) => Err(RemoteError::Api {
                code: err.code,
                message: err.error,
            }),
            Err(_) => Err(RemoteError::Status {
                status: status.as_u16(),
                url,
            }),
        }
    }
}

/// Turn an object-level "not found" into `RemoteError::NotFound`
fn missing_as_not_found(err: RemoteError, collection: Collection, id: &str) -> RemoteError {
    match err {
        RemoteError::Api { code, .. } if code == CODE_OBJECT_NOT_FOUND => RemoteError::NotFound {
            collection: collection.name().to_string(),
            id: id.to_string(),
        },
        RemoteError::Status { status: 404, .. } => RemoteError::NotFound {
            collection: collection.name().to_string(),
            id: id.to_string(),
        },
        other => other,
    }
}

/// Split a raw Bmob object into a `Record`
fn record_from_value(value: Value) -> RemoteResult<Record> {
    let Value::Object(mut fields) = value else {
        return Err(RemoteError::Malformed("expected a JSON object".to_string()));
    };

    let id = match fields.get("objectId") {
        Some(Value::String(id)) => id.clone(),
        _ => return Err(RemoteError::Malformed("object has no objectId".to_string())),
    };
    let created_at = fields
        .get("createdAt")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    for name in RESERVED_FIELDS {
        fields.remove(*name);
    }

    Ok(Record {
        id,
        created_at,
        fields,
    })
}

/// Encode a query as Bmob URL parameters
fn query_params(query: &Query) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();

    if !query.equals.is_empty() {
        let constraints: Fields = query.equals.iter().cloned().collect();
        params.push(("where", Value::Object(constraints).to_string()));
    }
    if let Some(order) = &query.order {
        let prefix = if order.descending { "-" } else { "" };
        params.push(("order", format!("{}{}", prefix, order.field)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }

    params
}

#[async_trait]
impl RemoteStore for BmobClient {
    async fn create(&self, collection: Collection, fields: Fields) -> RemoteResult<Record> {
        let url = self.object_url(collection, None)?;
        let body = self
            .send(self.request(Method::POST, url).json(&fields))
            .await?;
        let created: CreatedBody = serde_json::from_value(body)?;

        debug!("Created {} object {}", collection, created.object_id);
        Ok(Record {
            id: created.object_id,
            created_at: created.created_at,
            fields,
        })
    }

    async fn get(&self, collection: Collection, id: &str) -> RemoteResult<Option<Record>> {
        let url = self.object_url(collection, Some(id))?;
        match self.send(self.request(Method::GET, url)).await {
            Ok(body) => record_from_value(body).map(Some),
            Err(err) => match missing_as_not_found(err, collection, id) {
                RemoteError::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> RemoteResult<()> {
        let url = self.object_url(collection, Some(id))?;
        self.send(self.request(Method::PUT, url).json(&fields))
            .await
            .map_err(|e| missing_as_not_found(e, collection, id))?;
        debug!("Updated {} object {}", collection, id);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        let url = self.object_url(collection, Some(id))?;
        self.send(self.request(Method::DELETE, url))
            .await
            .map_err(|e| missing_as_not_found(e, collection, id))?;
        debug!("Deleted {} object {}", collection, id);
        Ok(())
    }

    async fn find(&self, collection: Collection, query: &Query) -> RemoteResult<Vec<Record>> {
        let url = self.object_url(collection, None)?;
        let body = self
            .send(self.request(Method::GET, url).query(&query_params(query)))
            .await?;
        let results: ResultsBody = serde_json::from_value(body)?;

        results
            .results
            .into_iter()
            .map(record_from_value)
            .collect()
    }

    async fn upload_file(
        &self,
        file_name: &str,
        content: Vec<u8>,
        mime_type: &str,
    ) -> RemoteResult<String> {
        let url = self.endpoint(&["2", "files", file_name])?;
        let size = content.len();
        let body = self
            .send(
                self.request(Method::POST, url)
                    .header(reqwest::header::CONTENT_TYPE, mime_type)
                    .body(content),
            )
            .await?;
        let file: FileBody = serde_json::from_value(body)?;

        debug!("Uploaded {} ({} bytes) to {}", file_name, size, file.url);
        Ok(file.url)
    }
}
