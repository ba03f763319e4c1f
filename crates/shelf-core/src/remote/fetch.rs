//! HTTP blob fetcher

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{BlobFetcher, RemoteError, RemoteResult};

/// Downloads book files over HTTP(S)
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl BlobFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> RemoteResult<Vec<u8>> {
        let url = normalize_url(url);
        debug!("Fetching {}", url);

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let bytes = response.bytes().await?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

/// Give scheme-less file URLs an https scheme
///
/// The file store sometimes hands back `//host/path` or `host/path`.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://cdn.example.com/a.txt"),
            "https://cdn.example.com/a.txt"
        );
        assert_eq!(
            normalize_url("http://cdn.example.com/a.txt"),
            "http://cdn.example.com/a.txt"
        );
        assert_eq!(
            normalize_url("//cdn.example.com/a.txt"),
            "https://cdn.example.com/a.txt"
        );
        assert_eq!(
            normalize_url(" cdn.example.com/a.txt "),
            "https://cdn.example.com/a.txt"
        );
    }
}
