//! Sentiment aggregation: per-source mention counts folded into one
//! standardized 0–100 score plus a trend label.

use crate::analysis::AnalysisError;
use crate::models::{SentimentSummary, SourceSentiment, TrendDirection};

/// Periods of prior standardized scores consulted for the trend comparison.
pub const TREND_WINDOW: usize = 5;

/// Combine raw per-source sentiment into a [`SentimentSummary`].
///
/// Zero mentions is the explicit no-signal case: standardized score pins to
/// exactly 50.0 and the trend is stable. Otherwise the per-source polarity
/// (each in [-1, 1]) is mention-weighted, averaged and rescaled via
/// `(avg + 1) × 50`.
///
/// `history` carries the ticker's standardized scores from prior runs,
/// oldest first; `epsilon` is the flap-damping tolerance for the trend
/// comparison.
pub fn aggregate(
    ticker: &str,
    sources: &[SourceSentiment],
    history: &[f64],
    epsilon: f64,
) -> SentimentSummary {
    let is_fallback = sources.iter().any(|s| s.is_fallback);
    let total_mentions: u32 = sources.iter().map(|s| s.mentions).sum();

    if total_mentions == 0 {
        return SentimentSummary {
            ticker: ticker.to_string(),
            total_mentions: 0,
            pct_positive: 0.0,
            pct_neutral: 0.0,
            pct_negative: 0.0,
            standardized_score: 50.0,
            trend_direction: TrendDirection::Stable,
            is_fallback,
        };
    }

    let weighted_polarity: f64 = sources
        .iter()
        .map(|s| s.polarity * s.mentions as f64)
        .sum::<f64>()
        / total_mentions as f64;
    let standardized_score = ((weighted_polarity + 1.0) * 50.0).clamp(0.0, 100.0);

    let positive: u32 = sources.iter().map(|s| s.positive).sum();
    let neutral: u32 = sources.iter().map(|s| s.neutral).sum();
    let negative: u32 = sources.iter().map(|s| s.negative).sum();
    let pct = |count: u32| round1(count as f64 / total_mentions as f64 * 100.0);

    SentimentSummary {
        ticker: ticker.to_string(),
        total_mentions,
        pct_positive: pct(positive),
        pct_neutral: pct(neutral),
        pct_negative: pct(negative),
        standardized_score,
        trend_direction: trend_direction(standardized_score, history, epsilon),
        is_fallback,
    }
}

/// Compare the current score against the trailing [`TREND_WINDOW`]-period
/// average. An empty history reads as stable: there is nothing to trend
/// against.
pub fn trend_direction(current: f64, history: &[f64], epsilon: f64) -> TrendDirection {
    let window = &history[history.len().saturating_sub(TREND_WINDOW)..];
    if window.is_empty() {
        return TrendDirection::Stable;
    }

    let trailing = window.iter().sum::<f64>() / window.len() as f64;
    if current > trailing + epsilon {
        TrendDirection::Improving
    } else if current < trailing - epsilon {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Typed guard for consumers that must not conflate "no signal" with a
/// neutral signal.
pub fn require_signal(summary: &SentimentSummary) -> Result<&SentimentSummary, AnalysisError> {
    if summary.has_signal() {
        Ok(summary)
    } else {
        Err(AnalysisError::NoSentimentSignal)
    }
}

// ── Portfolio rollup ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSentiment {
    pub total_mentions: u64,
    pub most_positive: Option<String>,
    pub most_negative: Option<String>,
    /// Mention-weighted average standardized score; 50.0 when the whole
    /// portfolio is silent.
    pub average_standardized_score: f64,
}

pub fn summarize_portfolio(summaries: &[SentimentSummary]) -> PortfolioSentiment {
    let total_mentions: u64 = summaries.iter().map(|s| s.total_mentions as u64).sum();

    if total_mentions == 0 {
        return PortfolioSentiment {
            total_mentions: 0,
            most_positive: None,
            most_negative: None,
            average_standardized_score: 50.0,
        };
    }

    let weighted: f64 = summaries
        .iter()
        .map(|s| s.standardized_score * s.total_mentions as f64)
        .sum::<f64>()
        / total_mentions as f64;

    let with_signal = || summaries.iter().filter(|s| s.has_signal());
    let most_positive = with_signal()
        .max_by(|a, b| a.standardized_score.total_cmp(&b.standardized_score))
        .map(|s| s.ticker.clone());
    let most_negative = with_signal()
        .min_by(|a, b| a.standardized_score.total_cmp(&b.standardized_score))
        .map(|s| s.ticker.clone());

    PortfolioSentiment {
        total_mentions,
        most_positive,
        most_negative,
        average_standardized_score: weighted,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, mentions: u32, polarity: f64) -> SourceSentiment {
        let positive = mentions / 2;
        let negative = mentions / 4;
        SourceSentiment {
            source: name.into(),
            mentions,
            polarity,
            positive,
            neutral: mentions - positive - negative,
            negative,
            is_fallback: false,
        }
    }

    #[test]
    fn zero_mentions_is_exactly_neutral_and_stable() {
        let summary = aggregate("AAPL", &[], &[60.0, 70.0], 2.0);
        assert_eq!(summary.total_mentions, 0);
        assert_eq!(summary.standardized_score, 50.0);
        assert_eq!(summary.trend_direction, TrendDirection::Stable);
        assert!(!summary.has_signal());
    }

    #[test]
    fn rescale_maps_polarity_onto_0_100() {
        // Single source, polarity 0.5 → (0.5 + 1) × 50 = 75.
        let summary = aggregate("MSFT", &[source("reddit", 10, 0.5)], &[], 2.0);
        assert_eq!(summary.standardized_score, 75.0);

        let summary = aggregate("MSFT", &[source("reddit", 10, -1.0)], &[], 2.0);
        assert_eq!(summary.standardized_score, 0.0);
    }

    #[test]
    fn polarity_is_mention_weighted_across_sources() {
        // 30 mentions at +1.0 and 10 at -1.0 → avg +0.5 → 75.
        let sources = vec![source("reddit", 30, 1.0), source("twitter", 10, -1.0)];
        let summary = aggregate("NVDA", &sources, &[], 2.0);
        assert_eq!(summary.standardized_score, 75.0);
        assert_eq!(summary.total_mentions, 40);
    }

    #[test]
    fn trend_uses_epsilon_band() {
        let history = vec![50.0, 50.0, 50.0, 50.0, 50.0];
        assert_eq!(trend_direction(51.9, &history, 2.0), TrendDirection::Stable);
        assert_eq!(trend_direction(52.1, &history, 2.0), TrendDirection::Improving);
        assert_eq!(trend_direction(47.9, &history, 2.0), TrendDirection::Declining);
    }

    #[test]
    fn trend_window_ignores_older_history() {
        // Last five periods average 80; earlier junk must not drag it down.
        let history = vec![0.0, 0.0, 80.0, 80.0, 80.0, 80.0, 80.0];
        assert_eq!(trend_direction(70.0, &history, 2.0), TrendDirection::Declining);
    }

    #[test]
    fn require_signal_rejects_only_the_silent_case() {
        let silent = aggregate("AAPL", &[], &[], 2.0);
        assert_eq!(
            require_signal(&silent).unwrap_err(),
            AnalysisError::NoSentimentSignal
        );

        // Neutral-but-real signal passes through.
        let neutral = aggregate("AAPL", &[source("reddit", 10, 0.0)], &[], 2.0);
        assert!(require_signal(&neutral).is_ok());
    }

    #[test]
    fn fallback_flag_propagates_from_any_source() {
        let mut sources = vec![source("reddit", 5, 0.2)];
        sources.push(SourceSentiment {
            is_fallback: true,
            ..source("simulated", 3, 0.0)
        });
        let summary = aggregate("AMD", &sources, &[], 2.0);
        assert!(summary.is_fallback);
    }

    #[test]
    fn percentages_come_from_classification_counts() {
        let s = SourceSentiment {
            source: "reddit".into(),
            mentions: 8,
            polarity: 0.1,
            positive: 4,
            neutral: 2,
            negative: 2,
            is_fallback: false,
        };
        let summary = aggregate("TSLA", &[s], &[], 2.0);
        assert_eq!(summary.pct_positive, 50.0);
        assert_eq!(summary.pct_neutral, 25.0);
        assert_eq!(summary.pct_negative, 25.0);
    }

    #[test]
    fn portfolio_rollup_weights_by_mentions() {
        let a = aggregate("AAA", &[source("reddit", 30, 1.0)], &[], 2.0); // 100.0
        let b = aggregate("BBB", &[source("reddit", 10, -1.0)], &[], 2.0); // 0.0
        let quiet = aggregate("CCC", &[], &[], 2.0);

        let rollup = summarize_portfolio(&[a, b, quiet]);
        assert_eq!(rollup.total_mentions, 40);
        assert_eq!(rollup.average_standardized_score, 75.0);
        assert_eq!(rollup.most_positive.as_deref(), Some("AAA"));
        assert_eq!(rollup.most_negative.as_deref(), Some("BBB"));
    }

    #[test]
    fn silent_portfolio_reads_neutral() {
        let rollup = summarize_portfolio(&[aggregate("AAA", &[], &[], 2.0)]);
        assert_eq!(rollup.average_standardized_score, 50.0);
        assert_eq!(rollup.most_positive, None);
    }
}
