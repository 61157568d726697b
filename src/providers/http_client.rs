use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

pub struct HttpClient {
    inner: reqwest::Client,
    config: ProviderConfig,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text with rate-limiting and exponential-backoff retry.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.polite_delay().await;

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.request_delay_ms.max(2) / 2)
            .map(jitter)
            .take(self.config.max_retries as usize);

        Retry::spawn(strategy, || self.fetch_once(url))
            .await
            .with_context(|| format!("All retries exhausted for {url}"))
    }

    /// Fetch a URL and deserialize the JSON body.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).with_context(|| format!("Malformed JSON from {url}"))
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            if status.as_u16() == 429 || status.as_u16() == 503 {
                warn!("Rate limited ({}) on {}", status, url);
            }
            anyhow::bail!("HTTP {} from {}", status, url);
        }

        resp.text().await.context("Failed to read response body")
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let extra = rand::rng().random_range(0..=self.config.jitter_ms);
        sleep(Duration::from_millis(self.config.request_delay_ms + extra)).await;
    }
}
