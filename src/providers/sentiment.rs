//! Social sentiment sources: a REST aggregation endpoint plus a
//! deterministic simulated source for offline runs and outage fallback.
//! Synthetic data is always flagged so downstream display can distinguish
//! real from simulated sentiment.

use crate::config::ProviderConfig;
use crate::models::SourceSentiment;
use crate::providers::http_client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Swappable sentiment source abstraction.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fetch_sentiment(&self, symbol: &str) -> Result<Vec<SourceSentiment>>;
}

// ── REST endpoint ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireSentiment {
    sources: Vec<WireSource>,
}

#[derive(Debug, Deserialize)]
struct WireSource {
    source: String,
    mentions: u32,
    polarity: f64,
    #[serde(default)]
    positive: u32,
    #[serde(default)]
    neutral: u32,
    #[serde(default)]
    negative: u32,
}

pub struct RestSentimentSource {
    client: HttpClient,
    base_url: String,
}

impl RestSentimentSource {
    pub fn new(config: &ProviderConfig, base_url: &str) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn sentiment_url(&self, symbol: &str) -> String {
        format!("{}/sentiment/{}", self.base_url, symbol.to_uppercase())
    }
}

#[async_trait]
impl SentimentSource for RestSentimentSource {
    async fn fetch_sentiment(&self, symbol: &str) -> Result<Vec<SourceSentiment>> {
        let url = self.sentiment_url(symbol);
        debug!("Fetching sentiment: {}", url);

        match self.client.get_json::<WireSentiment>(&url).await {
            Ok(wire) => Ok(wire
                .sources
                .into_iter()
                .map(|s| SourceSentiment {
                    source: s.source,
                    mentions: s.mentions,
                    polarity: s.polarity.clamp(-1.0, 1.0),
                    positive: s.positive,
                    neutral: s.neutral,
                    negative: s.negative,
                    is_fallback: false,
                })
                .collect()),
            Err(e) => {
                warn!("{}: sentiment endpoint failed ({:#}), substituting simulated data", symbol, e);
                Ok(simulated_sentiment(symbol))
            }
        }
    }
}

// ── Simulated source ──────────────────────────────────────────────────────────

pub struct SimulatedSentimentSource;

#[async_trait]
impl SentimentSource for SimulatedSentimentSource {
    async fn fetch_sentiment(&self, symbol: &str) -> Result<Vec<SourceSentiment>> {
        Ok(simulated_sentiment(symbol))
    }
}

/// Deterministic synthetic sentiment: the same symbol always yields the same
/// mentions and polarity, so repeated offline runs stay comparable.
pub fn simulated_sentiment(symbol: &str) -> Vec<SourceSentiment> {
    let seed = symbol_seed(symbol);
    vec![
        synthetic_source("reddit-sim", seed),
        synthetic_source("twitter-sim", seed.rotate_left(17)),
    ]
}

fn synthetic_source(name: &str, seed: u64) -> SourceSentiment {
    let mentions = (seed % 40) as u32;
    let polarity = ((seed % 181) as i64 - 90) as f64 / 100.0; // -0.90 ..= 0.90

    let positive = ((mentions as f64) * (polarity + 1.0) / 2.0 * 0.8).round() as u32;
    let positive = positive.min(mentions);
    let negative = (((mentions - positive) as f64) * 0.5).round() as u32;
    let neutral = mentions - positive - negative;

    SourceSentiment {
        source: name.to_string(),
        mentions,
        polarity,
        positive,
        neutral,
        negative,
        is_fallback: true,
    }
}

/// FNV-1a over the symbol: stable across runs and platforms.
fn symbol_seed(symbol: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in symbol.trim().to_uppercase().bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_sentiment_is_deterministic() {
        assert_eq!(simulated_sentiment("QCOM"), simulated_sentiment("QCOM"));
        assert_eq!(simulated_sentiment("qcom "), simulated_sentiment("QCOM"));
    }

    #[test]
    fn simulated_sources_are_flagged_and_bounded() {
        for source in simulated_sentiment("NVDA") {
            assert!(source.is_fallback);
            assert!((-1.0..=1.0).contains(&source.polarity));
            assert_eq!(source.positive + source.neutral + source.negative, source.mentions);
        }
    }

    #[test]
    fn different_symbols_diverge() {
        assert_ne!(simulated_sentiment("AAPL"), simulated_sentiment("MSFT"));
    }

    #[test]
    fn simulated_source_trait_roundtrip() {
        let sources =
            tokio_test::block_on(SimulatedSentimentSource.fetch_sentiment("AMD")).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources, simulated_sentiment("AMD"));
    }
}
