// src/ct_log/client.rs
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::types::{GetEntriesResponse, RawLogEntry, SignedTreeHead};

const DEFAULT_MAX_RETRIES: u32 = 5;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// HTTP client for Certificate Transparency log RFC 6962 API
pub struct CtLogClient {
    base_url: String,
    http_client: reqwest::Client,
    max_retries: u32,
    initial_backoff: Duration,
}

impl CtLogClient {
    /// Create a new CT log client
    pub fn new(log_url: &Url) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: log_url.as_str().trim_end_matches('/').to_string(),
            http_client,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_secs(1),
        })
    }

    /// Override how often and how fast failed requests are retried
    pub fn with_retry_policy(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get Signed Tree Head (current log size and timestamp)
    /// Endpoint: GET {base_url}/ct/v1/get-sth
    pub async fn get_sth(&self) -> Result<SignedTreeHead> {
        let url = format!("{}/ct/v1/get-sth", self.base_url);

        debug!("Fetching STH from {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch STH")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "STH request failed with status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        let sth: SignedTreeHead = response
            .json()
            .await
            .context("Failed to parse STH JSON")?;

        debug!(
            "STH received: tree_size={}, timestamp={}",
            sth.tree_size, sth.timestamp
        );

        Ok(sth)
    }

    /// Get entries from CT log (both bounds inclusive).
    /// Logs may return fewer entries than requested.
    /// Endpoint: GET {base_url}/ct/v1/get-entries?start={start}&end={end}
    pub async fn get_entries(&self, start: u64, end: u64) -> Result<Vec<RawLogEntry>> {
        let url = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            self.base_url, start, end
        );

        debug!("Fetching entries {}-{} from {}", start, end, self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch entries")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!("Rate limited by CT log: {}", self.base_url);
                anyhow::bail!("Rate limited (429)");
            }

            anyhow::bail!(
                "Get entries request failed with status {}: {}",
                status,
                body
            );
        }

        let entries_response: GetEntriesResponse = response
            .json()
            .await
            .context("Failed to parse entries JSON")?;

        debug!(
            "Received {} entries from {}",
            entries_response.entries.len(),
            self.base_url
        );

        Ok(entries_response.entries)
    }

    /// Get entries with retry logic and exponential backoff
    pub async fn get_entries_with_retry(&self, start: u64, end: u64) -> Result<Vec<RawLogEntry>> {
        self.with_retry("entries", || self.get_entries(start, end)).await
    }

    /// Get STH with retry logic
    pub async fn get_sth_with_retry(&self) -> Result<SignedTreeHead> {
        self.with_retry("STH", || self.get_sth()).await
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    retries += 1;

                    if retries >= self.max_retries {
                        return Err(e.context(format!(
                            "Failed after {} retries",
                            self.max_retries
                        )));
                    }

                    warn!(
                        "Error fetching {} (attempt {}/{}): {}. Retrying in {:?}",
                        what, retries, self.max_retries, e, backoff
                    );

                    tokio::time::sleep(backoff).await;

                    // Exponential backoff with max 60 seconds
                    backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CtLogClient {
        let url = Url::parse(&format!("{}/logs/test/", server.uri())).unwrap();
        CtLogClient::new(&url)
            .unwrap()
            .with_retry_policy(3, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_base_url_trailing_slash_trimmed() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        assert!(client.base_url().ends_with("/logs/test"));
    }

    #[tokio::test]
    async fn test_get_sth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logs/test/ct/v1/get-sth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tree_size": 42,
                "timestamp": 1447426803000u64,
                "sha256_root_hash": "root=",
                "tree_head_signature": "sig="
            })))
            .mount(&server)
            .await;

        let sth = client_for(&server).await.get_sth().await.unwrap();
        assert_eq!(sth.tree_size, 42);
    }

    #[tokio::test]
    async fn test_get_entries_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logs/test/ct/v1/get-entries"))
            .and(query_param("start", "10"))
            .and(query_param("end", "11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "entries": [
                    {"leaf_input": "AA==", "extra_data": ""},
                    {"leaf_input": "AQ==", "extra_data": ""}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let entries = client_for(&server).await.get_entries(10, 11).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].leaf_input, "AQ==");
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logs/test/ct/v1/get-sth"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server).await.get_sth_with_retry().await.unwrap_err();
        assert!(err.to_string().contains("Failed after 3 retries"));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logs/test/ct/v1/get-entries"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server).await.get_entries(0, 0).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
