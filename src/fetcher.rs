use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

/// Single-attempt HTTP client for the headline feed.
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("NewsHeadlines/1.0 (RSS Collector)")
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` once and return the body.
    ///
    /// Connection errors, timeouts, non-2xx statuses and undecodable bodies all
    /// come back as `None`; nothing is retried.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        debug!("Fetching feed: {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Feed request to {} failed: {}", url, e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Feed request to {} returned HTTP {}", url, status);
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("Failed to read feed body from {}: {}", url, e);
                None
            }
        }
    }
}
