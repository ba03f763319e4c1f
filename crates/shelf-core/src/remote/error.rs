//! Remote store errors

use thiserror::Error;

/// Errors from the remote object store or blob fetcher
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an error payload
    #[error("Remote store error {code}: {message}")]
    Api { code: i64, message: String },

    /// Non-success HTTP status without a parseable error payload
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// The requested object does not exist
    #[error("{collection} object '{id}' not found")]
    NotFound { collection: String, id: String },

    /// A response or record had an unexpected shape
    #[error("Malformed remote data: {0}")]
    Malformed(String),

    /// Credentials are missing from the configuration
    #[error("Remote store is not configured (set remote.application_id and remote.rest_api_key)")]
    NotConfigured,
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Malformed(e.to_string())
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;
