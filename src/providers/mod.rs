pub mod cleaner;
pub mod http_client;
pub mod indicators;
pub mod sentiment;

use crate::config::ProviderConfig;
use crate::models::{DailyBar, Fundamentals};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use self::cleaner::normalise_symbol;
use self::http_client::HttpClient;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable market data source abstraction.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily bars over the trailing window, chronological. An empty vec is
    /// the no-data signal.
    async fn fetch_historical_bars(&self, symbol: &str, lookback_days: u32)
    -> Result<Vec<DailyBar>>;

    /// Fundamentals snapshot; any field may come back unavailable.
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Fundamentals>;
}

// ── REST quote API provider ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireHistory {
    bars: Vec<WireBar>,
}

#[derive(Debug, Deserialize)]
struct WireBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireQuote {
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    pe_ratio: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    high_52w: Option<f64>,
    #[serde(default)]
    low_52w: Option<f64>,
}

pub struct RestMarketProvider {
    client: HttpClient,
    base_url: String,
}

impl RestMarketProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        // Validate the configured base once, up front.
        let base = Url::parse(&config.quote_api_url)
            .with_context(|| format!("Invalid quote API URL {:?}", config.quote_api_url))?;

        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn history_url(&self, symbol: &str, lookback_days: u32) -> String {
        format!(
            "{}/history/{}?days={}",
            self.base_url,
            symbol.to_lowercase(),
            lookback_days
        )
    }

    fn quote_url(&self, symbol: &str) -> String {
        format!("{}/quote/{}", self.base_url, symbol.to_lowercase())
    }
}

#[async_trait]
impl MarketDataSource for RestMarketProvider {
    async fn fetch_historical_bars(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<DailyBar>> {
        let url = self.history_url(symbol, lookback_days);
        debug!("Fetching history: {}", url);

        let wire: WireHistory = self
            .client
            .get_json(&url)
            .await
            .with_context(|| format!("Failed to fetch history for {symbol}"))?;

        let now = Utc::now().naive_utc();
        let symbol = normalise_symbol(symbol);

        let mut bars: Vec<DailyBar> = wire
            .bars
            .into_iter()
            .filter_map(|b| {
                if b.close <= 0.0 || b.high < b.low {
                    warn!("{}: dropping invalid bar on {}", symbol, b.date);
                    return None;
                }
                Some(DailyBar {
                    symbol: symbol.clone(),
                    date: b.date,
                    open: b.open,
                    high: b.high,
                    low: b.low,
                    close: b.close,
                    volume: b.volume,
                    fetched_at: now,
                })
            })
            .collect();

        // Chronological ordering is part of the contract downstream.
        bars.sort_by_key(|b| b.date);

        if bars.is_empty() {
            warn!("{}: no usable bars returned", symbol);
        }
        Ok(bars)
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        let url = self.quote_url(symbol);
        debug!("Fetching quote: {}", url);

        let wire: WireQuote = self
            .client
            .get_json(&url)
            .await
            .with_context(|| format!("Failed to fetch fundamentals for {symbol}"))?;

        Ok(Fundamentals {
            price: wire.price,
            pe_ratio: wire.pe_ratio,
            market_cap: wire.market_cap,
            high_52w: wire.high_52w,
            low_52w: wire.low_52w,
        })
    }
}
