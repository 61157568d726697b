//! Technical indicator extraction from a third-party HTML summary page.
//!
//! Anything the page does not yield stays [`Indicator::Neutral`] — an
//! unmeasured indicator is reported as the explicit placeholder, never as a
//! fabricated reading.

use crate::config::ProviderConfig;
use crate::models::{Indicator, IndicatorSet};
use crate::providers::cleaner::parse_price;
use crate::providers::http_client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};

/// Swappable indicator source abstraction.
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn fetch_indicators(&self, symbol: &str) -> Result<IndicatorSet>;
}

// ── HTML summary page extractor ───────────────────────────────────────────────

pub struct HtmlIndicatorExtractor {
    client: HttpClient,
    base_url: String,
}

impl HtmlIndicatorExtractor {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.indicators_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of a ticker's technical summary page. e.g. QCOM → /qcom.html
    fn summary_url(&self, symbol: &str) -> String {
        format!("{}/{}.html", self.base_url, symbol.to_lowercase())
    }
}

#[async_trait]
impl IndicatorSource for HtmlIndicatorExtractor {
    async fn fetch_indicators(&self, symbol: &str) -> Result<IndicatorSet> {
        let url = self.summary_url(symbol);
        debug!("Fetching indicator page: {}", url);

        match self.client.get_text(&url).await {
            Ok(html) => {
                let set = parse_indicator_table(&html);
                if !set.rsi.is_measured() && !set.macd.is_measured() {
                    debug!("{}: no recognisable indicators on summary page", symbol);
                }
                Ok(set)
            }
            Err(e) => {
                warn!("{}: indicator page unreachable ({:#}), reporting placeholders", symbol, e);
                Ok(IndicatorSet::neutral(true))
            }
        }
    }
}

/// Scan label/value table rows for RSI(14) and the MACD line. The page
/// layout varies, so matching is by label substring, and an RSI outside
/// [0, 100] is treated as a parse miss.
pub fn parse_indicator_table(html: &str) -> IndicatorSet {
    let mut set = IndicatorSet::neutral(false);
    let doc = Html::parse_document(html);

    let Ok(row_sel) = Selector::parse("table tr") else {
        return set;
    };
    let Ok(cell_sel) = Selector::parse("td, th") else {
        return set;
    };

    for tr in doc.select(&row_sel) {
        let cells: Vec<String> = tr
            .select(&cell_sel)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .collect();

        if cells.len() < 2 {
            continue;
        }

        let label = cells[0].to_lowercase();
        let Some(value) = parse_price(&cells[1]) else {
            continue;
        };

        if label.contains("rsi") {
            if (0.0..=100.0).contains(&value) {
                set.rsi = Indicator::Measured(value);
            }
        } else if label.contains("macd") && !label.contains("signal") && !label.contains("histogram")
        {
            set.macd = Indicator::Measured(value);
        }
    }

    set
}

// ── Offline placeholder source ────────────────────────────────────────────────

/// Used in offline runs: every indicator stays the explicit neutral
/// placeholder, flagged as fallback.
pub struct SimulatedIndicators;

#[async_trait]
impl IndicatorSource for SimulatedIndicators {
    async fn fetch_indicators(&self, _symbol: &str) -> Result<IndicatorSet> {
        Ok(IndicatorSet::neutral(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rsi_and_macd_from_label_value_rows() {
        let html = r#"
            <table>
              <tr><th>Indicator</th><th>Value</th></tr>
              <tr><td>RSI (14)</td><td>34.2</td></tr>
              <tr><td>MACD</td><td>-1.25</td></tr>
              <tr><td>MACD Signal</td><td>-0.80</td></tr>
            </table>
        "#;
        let set = parse_indicator_table(html);
        assert_eq!(set.rsi, Indicator::Measured(34.2));
        assert_eq!(set.macd, Indicator::Measured(-1.25));
        assert!(!set.is_fallback);
    }

    #[test]
    fn out_of_range_rsi_is_a_parse_miss() {
        let html = "<table><tr><td>RSI (14)</td><td>340.2</td></tr></table>";
        let set = parse_indicator_table(html);
        assert_eq!(set.rsi, Indicator::Neutral);
    }

    #[test]
    fn unrecognised_page_stays_neutral() {
        let set = parse_indicator_table("<html><body><p>maintenance</p></body></html>");
        assert_eq!(set.rsi, Indicator::Neutral);
        assert_eq!(set.macd, Indicator::Neutral);
    }

    #[test]
    fn offline_source_reports_flagged_placeholders() {
        let set = tokio_test::block_on(SimulatedIndicators.fetch_indicators("QCOM")).unwrap();
        assert_eq!(set, IndicatorSet::neutral(true));
    }
}
