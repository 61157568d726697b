//! Run summary assembly, the terminal report, and CSV export.

use crate::analysis::sentiment::{PortfolioSentiment, summarize_portfolio};
use crate::models::{EvaluationRecord, Recommendation};
use crate::utils::{fmt_number, fmt_opt_price};
use anyhow::{Context, Result};
use std::path::Path;

// ── Summary ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TierCounts {
    pub strong_buy: usize,
    pub buy: usize,
    pub hold: usize,
    pub weak_hold: usize,
    pub avoid: usize,
}

impl TierCounts {
    pub fn tally(records: &[EvaluationRecord]) -> Self {
        let mut counts = Self::default();
        for r in records {
            match r.recommendation {
                Recommendation::StrongBuy => counts.strong_buy += 1,
                Recommendation::Buy => counts.buy += 1,
                Recommendation::Hold => counts.hold += 1,
                Recommendation::WeakHold => counts.weak_hold += 1,
                Recommendation::Avoid => counts.avoid += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub tickers_processed: usize,
    pub errors: usize,
    pub tiers: TierCounts,
    pub top_pick: Option<(String, f64)>,
    pub sentiment: PortfolioSentiment,
}

/// Assemble the aggregate summary. `records` must already be ranked best
/// first.
pub fn build_summary(run_id: i64, records: &[EvaluationRecord], errors: usize) -> RunSummary {
    let sentiments: Vec<_> = records.iter().filter_map(|r| r.sentiment.clone()).collect();

    RunSummary {
        run_id,
        tickers_processed: records.len(),
        errors,
        tiers: TierCounts::tally(records),
        top_pick: records.first().map(|r| (r.ticker.clone(), r.composite_score)),
        sentiment: summarize_portfolio(&sentiments),
    }
}

// ── Terminal report ───────────────────────────────────────────────────────────

pub fn print_report(records: &[EvaluationRecord], summary: &RunSummary) {
    println!("──────────────────────────────────────────────────────────────────");
    println!("  Stock Insight — Evaluation Run {}", summary.run_id);
    println!("──────────────────────────────────────────────────────────────────");
    println!(
        "  {:<8} {:>10} {:>7}  {:>6}  {:<11} {}",
        "TICKER", "PRICE", "SCORE", "SIGNAL", "RATING", "SENTIMENT"
    );

    for r in records {
        let sentiment = match &r.sentiment {
            Some(s) if s.has_signal() => {
                let origin = if s.is_fallback { "*" } else { "" };
                format!("{:.1}{} ({} mentions, {})", s.standardized_score, origin, s.total_mentions, s.trend_direction)
            }
            _ => "no signal".to_string(),
        };
        println!(
            "  {:<8} {:>10} {:>7.1}  {:>6}  {:<11} {}",
            r.ticker,
            fmt_opt_price(r.price),
            r.composite_score,
            if r.flags.buy_signal() { "BUY" } else { "—" },
            r.recommendation.label(),
            sentiment,
        );
        if let Some(note) = &r.note {
            println!("           ! {}", note);
        }
    }

    println!("──────────────────────────────────────────────────────────────────");
    println!(
        "  Tiers     : {} Strong Buy | {} Buy | {} Hold | {} Weak Hold | {} Avoid",
        summary.tiers.strong_buy,
        summary.tiers.buy,
        summary.tiers.hold,
        summary.tiers.weak_hold,
        summary.tiers.avoid,
    );
    match &summary.top_pick {
        Some((ticker, score)) => println!("  Top pick  : {} ({:.1})", ticker, score),
        None => println!("  Top pick  : —"),
    }
    println!(
        "  Sentiment : {} mentions | avg {:.1} | best {} | worst {}",
        fmt_number(summary.sentiment.total_mentions as i64),
        summary.sentiment.average_standardized_score,
        summary.sentiment.most_positive.as_deref().unwrap_or("—"),
        summary.sentiment.most_negative.as_deref().unwrap_or("—"),
    );
    if summary.errors > 0 {
        println!("  Errors    : {}", summary.errors);
    }
    println!("──────────────────────────────────────────────────────────────────");
    println!("  * simulated sentiment");
}

// ── CSV export ────────────────────────────────────────────────────────────────

pub fn export_csv(records: &[EvaluationRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Could not create export file {:?}", path))?;

    writer.write_record([
        "Ticker",
        "Price",
        "PE_Ratio",
        "MarketCap",
        "52w_High",
        "52w_Low",
        "Pivot",
        "Support_1",
        "Resistance_1",
        "Recent_Support",
        "Recent_Resistance",
        "Fib_38_2",
        "Fib_50_0",
        "Fib_61_8",
        "Stop_Loss",
        "Target",
        "Buy_Signal",
        "Score",
        "Recommendation",
        "Sentiment_Score",
        "Sentiment_Mentions",
        "Sentiment_Trend",
        "Commentary",
        "Note",
    ])?;

    for r in records {
        let fib = r.fibonacci;
        writer.write_record([
            r.ticker.clone(),
            fmt_opt_price(r.price),
            fmt_opt_price(r.fundamentals.pe_ratio),
            fmt_opt_price(r.fundamentals.market_cap),
            fmt_opt_price(r.fundamentals.high_52w),
            fmt_opt_price(r.fundamentals.low_52w),
            fmt_opt_price(r.levels.pivot_point),
            fmt_opt_price(r.levels.support_1),
            fmt_opt_price(r.levels.resistance_1),
            fmt_opt_price(r.levels.recent_support),
            fmt_opt_price(r.levels.recent_resistance),
            fmt_opt_price(fib.map(|f| f.level_38_2)),
            fmt_opt_price(fib.map(|f| f.level_50_0)),
            fmt_opt_price(fib.map(|f| f.level_61_8)),
            fmt_opt_price(r.stop_loss),
            fmt_opt_price(r.target),
            if r.flags.buy_signal() { "yes" } else { "no" }.to_string(),
            format!("{:.2}", r.composite_score),
            r.recommendation.label().to_string(),
            r.sentiment
                .as_ref()
                .filter(|s| s.has_signal())
                .map(|s| format!("{:.1}", s.standardized_score))
                .unwrap_or_else(|| "N/A".to_string()),
            r.sentiment
                .as_ref()
                .map(|s| s.total_mentions.to_string())
                .unwrap_or_else(|| "0".to_string()),
            r.sentiment
                .as_ref()
                .map(|s| s.trend_direction.label().to_string())
                .unwrap_or_else(|| "stable".to_string()),
            r.commentary.clone(),
            r.note.clone().unwrap_or_default(),
        ])?;
    }

    writer.flush().context("Failed to flush CSV export")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::degraded;
    use crate::models::{Recommendation, SentimentSummary, TrendDirection};
    use chrono::NaiveDate;

    fn record(ticker: &str, score: f64, rec: Recommendation) -> EvaluationRecord {
        let ts = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(21, 0, 0)
            .unwrap();
        let mut r = degraded(ticker, "test fixture", ts);
        r.composite_score = score;
        r.recommendation = rec;
        r
    }

    fn with_sentiment(mut r: EvaluationRecord, score: f64, mentions: u32) -> EvaluationRecord {
        r.sentiment = Some(SentimentSummary {
            ticker: r.ticker.clone(),
            total_mentions: mentions,
            pct_positive: 50.0,
            pct_neutral: 30.0,
            pct_negative: 20.0,
            standardized_score: score,
            trend_direction: TrendDirection::Stable,
            is_fallback: false,
        });
        r
    }

    #[test]
    fn tier_tally_counts_every_record() {
        let records = vec![
            record("AAA", 80.0, Recommendation::StrongBuy),
            record("BBB", 65.0, Recommendation::Buy),
            record("CCC", 61.0, Recommendation::Buy),
            record("DDD", 50.0, Recommendation::Hold),
            record("EEE", 20.0, Recommendation::Avoid),
        ];
        let tiers = TierCounts::tally(&records);
        assert_eq!(tiers.strong_buy, 1);
        assert_eq!(tiers.buy, 2);
        assert_eq!(tiers.hold, 1);
        assert_eq!(tiers.weak_hold, 0);
        assert_eq!(tiers.avoid, 1);
    }

    #[test]
    fn summary_takes_top_pick_and_portfolio_sentiment() {
        let records = vec![
            with_sentiment(record("AAA", 80.0, Recommendation::StrongBuy), 90.0, 30),
            with_sentiment(record("BBB", 40.0, Recommendation::WeakHold), 10.0, 10),
        ];
        let summary = build_summary(7, &records, 1);

        assert_eq!(summary.run_id, 7);
        assert_eq!(summary.tickers_processed, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.top_pick, Some(("AAA".to_string(), 80.0)));
        assert_eq!(summary.sentiment.total_mentions, 40);
        assert_eq!(summary.sentiment.most_positive.as_deref(), Some("AAA"));
        assert_eq!(summary.sentiment.most_negative.as_deref(), Some("BBB"));
    }

    #[test]
    fn empty_run_still_builds_a_summary() {
        let summary = build_summary(1, &[], 0);
        assert_eq!(summary.top_pick, None);
        assert_eq!(summary.tiers, TierCounts::default());
        assert_eq!(summary.sentiment.average_standardized_score, 50.0);
    }
}
