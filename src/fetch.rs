use std::time::Duration;

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use tracing::{debug, warn};

use crate::config::{BROWSER_USER_AGENT, MAX_RETRIES, REQUEST_TIMEOUT_SECS, RETRY_DELAY_SECS};

/// Page and asset fetching. Retries, timeouts, and headers are handled here;
/// exhaustion surfaces as None, never as an error to the pipeline.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Option<String>;
    async fn fetch_bytes(&self, url: &str) -> Option<Vec<u8>>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ar,en-US;q=0.9,en;q=0.8"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    async fn get_with_retry(&self, url: &str) -> Option<reqwest::Response> {
        for attempt in 0..=MAX_RETRIES {
            debug!("Fetching: {}", url);
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Some(response),
                Ok(response) => {
                    warn!("HTTP {} from {}", response.status(), url);
                }
                Err(e) => {
                    warn!("Error fetching {}: {}", url, e);
                }
            }
            if attempt < MAX_RETRIES {
                debug!(
                    "Retrying {} in {}s (attempt {}/{})",
                    url,
                    RETRY_DELAY_SECS,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
            }
        }
        warn!("Giving up on {} after {} retries", url, MAX_RETRIES);
        None
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        let response = self.get_with_retry(url).await?;
        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("Error reading body from {}: {}", url, e);
                None
            }
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Option<Vec<u8>> {
        let response = self.get_with_retry(url).await?;
        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!("Error reading bytes from {}: {}", url, e);
                None
            }
        }
    }
}
