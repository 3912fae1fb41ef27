//! HTTP version marker source

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::trace;

use super::{SourceError, VersionSource};

/// Fetches the version marker from a static asset path over HTTP.
///
/// Every request carries a cache-busting query token (current epoch millis)
/// so intermediate caches between this process and the deployment never
/// serve a stale marker.
pub struct HttpVersionSource {
    client: reqwest::Client,
    base_url: String,
    version_file: String,
}

impl HttpVersionSource {
    pub fn new(
        base_url: impl Into<String>,
        version_file: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            version_file: version_file.into(),
        })
    }

    fn marker_url(&self) -> String {
        format!(
            "{}/{}?_={}",
            self.base_url,
            self.version_file,
            Utc::now().timestamp_millis()
        )
    }
}

#[async_trait]
impl VersionSource for HttpVersionSource {
    async fn fetch_version(&self) -> Result<String, SourceError> {
        let url = self.marker_url();
        trace!(%url, "fetching version marker");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status(),
            });
        }

        let body = response.text().await?;
        let marker = body.trim();
        if marker.is_empty() {
            return Err(SourceError::EmptyMarker);
        }

        Ok(marker.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_url_appends_cache_buster() {
        let source =
            HttpVersionSource::new("http://localhost:8080/static/", "build-hash.txt", Duration::from_secs(10))
                .unwrap();

        let url = source.marker_url();
        assert!(url.starts_with("http://localhost:8080/static/build-hash.txt?_="));

        let token = url.rsplit("?_=").next().unwrap();
        assert!(token.parse::<i64>().is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_is_normalized() {
        let with_slash =
            HttpVersionSource::new("http://example.test/static/", "build-hash.txt", Duration::from_secs(10))
                .unwrap();
        let without_slash =
            HttpVersionSource::new("http://example.test/static", "build-hash.txt", Duration::from_secs(10))
                .unwrap();

        assert_eq!(with_slash.base_url, without_slash.base_url);
    }
}
