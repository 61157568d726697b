//! Flag/score evaluator: confirmation flags, weighted composite score,
//! recommendation tier and commentary for one ticker.

use chrono::NaiveDateTime;

use crate::analysis::fibonacci;
use crate::analysis::levels::{MIN_BARS_FOR_RANGE, RANGE_LOOKBACK};
use crate::analysis::sentiment::require_signal;
use crate::config::{EvaluationConfig, ScoreWeights};
use crate::models::{
    ComponentScores, DailyBar, EvaluationRecord, FibonacciLevels, Fundamentals, IndicatorSet,
    Recommendation, SentimentSummary, SignalFlags, TechnicalLevels, TrendDirection,
};

/// Everything the evaluator consumes. All inputs are owned by the caller;
/// evaluation never mutates them, so repeated calls with identical inputs
/// produce bit-identical records (`evaluated_at` is supplied, not sampled).
pub struct EvaluationInputs<'a> {
    pub ticker: &'a str,
    pub bars: &'a [DailyBar],
    pub fundamentals: Fundamentals,
    pub levels: TechnicalLevels,
    pub fibonacci: Option<FibonacciLevels>,
    pub indicators: IndicatorSet,
    pub sentiment: Option<SentimentSummary>,
}

pub fn evaluate(
    inputs: EvaluationInputs<'_>,
    cfg: &EvaluationConfig,
    now: NaiveDateTime,
) -> EvaluationRecord {
    let price = inputs
        .fundamentals
        .price
        .or_else(|| inputs.bars.last().map(|b| b.close));

    let volume_ratio = volume_ratio(inputs.bars);

    let flags = SignalFlags {
        price_action: price_action_flag(
            price,
            &inputs.levels,
            inputs.fibonacci.as_ref(),
            cfg.level_tolerance_pct,
        ),
        rsi: inputs
            .indicators
            .rsi
            .measured()
            .map(|rsi| rsi <= cfg.rsi_oversold),
        macd: inputs.indicators.macd.measured().map(|macd| macd > 0.0),
        volume: volume_ratio.map(|r| r >= cfg.volume_surge_ratio),
    };

    let scores = ComponentScores {
        price_action: price_position_score(price, &inputs.levels),
        rsi: inputs
            .indicators
            .rsi
            .measured()
            .map(|rsi| (100.0 - rsi).clamp(0.0, 100.0)),
        macd: inputs.indicators.macd.measured().map(macd_score),
        volume: volume_ratio.map(|r| (r * 50.0).clamp(0.0, 100.0)),
        sentiment: inputs
            .sentiment
            .as_ref()
            .and_then(|s| require_signal(s).ok())
            .map(sentiment_score),
    };

    let composite_score = composite(&scores, &cfg.weights);
    let recommendation = recommendation_for(composite_score);

    // Risk levels, preferring the recent range over the pivot family.
    let support = inputs.levels.recent_support.or(inputs.levels.support_1);
    let resistance = inputs
        .levels
        .recent_resistance
        .or(inputs.levels.resistance_1);
    let stop_loss = match (support, inputs.fibonacci) {
        (Some(s), Some(fib)) => Some(fibonacci::stop_loss(s, fib.level_38_2)),
        _ => None,
    };
    let target = match (resistance, inputs.fibonacci) {
        (Some(r), Some(fib)) => Some(fibonacci::target(r, fib.level_50_0)),
        _ => None,
    };

    let commentary = commentary(
        inputs.ticker,
        recommendation,
        composite_score,
        &scores,
        &flags,
        inputs.sentiment.as_ref(),
    );

    EvaluationRecord {
        ticker: inputs.ticker.to_string(),
        price,
        fundamentals: inputs.fundamentals,
        levels: inputs.levels,
        fibonacci: inputs.fibonacci,
        stop_loss,
        target,
        flags,
        scores,
        composite_score,
        recommendation,
        commentary,
        sentiment: inputs.sentiment,
        note: None,
        evaluated_at: now,
    }
}

/// Record for a ticker whose inputs could not be assembled: every metric is
/// an explicit unavailable marker, the composite pins to neutral, and `note`
/// names the missing input. The batch never aborts over one ticker.
pub fn degraded(ticker: &str, note: impl Into<String>, now: NaiveDateTime) -> EvaluationRecord {
    let note = note.into();
    EvaluationRecord {
        ticker: ticker.to_string(),
        price: None,
        fundamentals: Fundamentals::default(),
        levels: TechnicalLevels::default(),
        fibonacci: None,
        stop_loss: None,
        target: None,
        flags: SignalFlags::default(),
        scores: ComponentScores::default(),
        composite_score: 50.0,
        recommendation: recommendation_for(50.0),
        commentary: format!(
            "{ticker} could not be fully evaluated ({note}) — rated {} pending data.",
            recommendation_for(50.0)
        ),
        sentiment: None,
        note: Some(note),
        evaluated_at: now,
    }
}

/// Tier boundaries are inclusive on the lower bound.
pub fn recommendation_for(score: f64) -> Recommendation {
    if score >= 75.0 {
        Recommendation::StrongBuy
    } else if score >= 60.0 {
        Recommendation::Buy
    } else if score >= 45.0 {
        Recommendation::Hold
    } else if score >= 30.0 {
        Recommendation::WeakHold
    } else {
        Recommendation::Avoid
    }
}

// ── Flags ─────────────────────────────────────────────────────────────────────

fn near(price: f64, level: f64, tolerance_pct: f64) -> bool {
    level > 0.0 && (price - level).abs() / level * 100.0 <= tolerance_pct
}

/// True when the price sits within the tolerance band of any known level;
/// unconfirmable without a price or without any level at all.
fn price_action_flag(
    price: Option<f64>,
    levels: &TechnicalLevels,
    fib: Option<&FibonacciLevels>,
    tolerance_pct: f64,
) -> Option<bool> {
    let price = price?;

    let mut candidates: Vec<f64> = [
        levels.pivot_point,
        levels.support_1,
        levels.support_2,
        levels.resistance_1,
        levels.resistance_2,
        levels.recent_support,
        levels.recent_resistance,
    ]
    .into_iter()
    .flatten()
    .collect();

    if let Some(fib) = fib {
        candidates.extend([fib.level_23_6, fib.level_38_2, fib.level_50_0, fib.level_61_8]);
    }

    if candidates.is_empty() {
        return None;
    }
    Some(candidates.iter().any(|l| near(price, *l, tolerance_pct)))
}

/// Today's volume relative to the trailing-window average.
fn volume_ratio(bars: &[DailyBar]) -> Option<f64> {
    let last = bars.last()?.volume? as f64;

    let start = bars.len().saturating_sub(RANGE_LOOKBACK);
    let window: Vec<f64> = bars[start..]
        .iter()
        .filter_map(|b| b.volume)
        .map(|v| v as f64)
        .collect();
    if window.len() < MIN_BARS_FOR_RANGE {
        return None;
    }

    let avg = window.iter().sum::<f64>() / window.len() as f64;
    if avg <= 0.0 {
        return None;
    }
    Some(last / avg)
}

// ── Sub-scores ────────────────────────────────────────────────────────────────

/// Position inside the recent range, inverted: sitting on support scores 100,
/// pressing resistance scores 0.
fn price_position_score(price: Option<f64>, levels: &TechnicalLevels) -> Option<f64> {
    let price = price?;
    let support = levels.recent_support?;
    let resistance = levels.recent_resistance?;
    if resistance <= support {
        return None;
    }

    let position = ((price - support) / (resistance - support)).clamp(0.0, 1.0);
    Some((1.0 - position) * 100.0)
}

fn macd_score(macd: f64) -> f64 {
    if macd > 0.0 {
        75.0
    } else if macd < 0.0 {
        25.0
    } else {
        50.0
    }
}

/// Standardized score plus mention-volume and trend adjustments, clamped.
fn sentiment_score(summary: &SentimentSummary) -> f64 {
    let mut score = summary.standardized_score;

    if summary.total_mentions > 50 {
        score += 10.0;
    } else if summary.total_mentions > 20 {
        score += 5.0;
    }

    match summary.trend_direction {
        TrendDirection::Improving => score += 10.0,
        TrendDirection::Declining => score -= 10.0,
        TrendDirection::Stable => {}
    }

    score.clamp(0.0, 100.0)
}

/// Weighted sum over the available sub-scores with the weights renormalized
/// to the available set — an absent component must not drag the composite
/// toward zero. Nothing available at all reads as neutral.
fn composite(scores: &ComponentScores, weights: &ScoreWeights) -> f64 {
    let parts = [
        (scores.price_action, weights.price_action),
        (scores.rsi, weights.rsi),
        (scores.macd, weights.macd),
        (scores.volume, weights.volume),
        (scores.sentiment, weights.sentiment),
    ];

    let mut acc = 0.0;
    let mut total_weight = 0.0;
    for (score, weight) in parts {
        if let Some(score) = score {
            acc += score * weight;
            total_weight += weight;
        }
    }

    if total_weight > 0.0 {
        (acc / total_weight).clamp(0.0, 100.0)
    } else {
        50.0
    }
}

// ── Commentary ────────────────────────────────────────────────────────────────

fn commentary(
    ticker: &str,
    recommendation: Recommendation,
    composite: f64,
    scores: &ComponentScores,
    flags: &SignalFlags,
    sentiment: Option<&SentimentSummary>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(
        if composite >= 70.0 {
            "shows strong overall characteristics"
        } else if composite >= 60.0 {
            "presents moderate investment appeal"
        } else if composite >= 40.0 {
            "shows neutral investment characteristics"
        } else {
            "presents some investment challenges"
        }
        .to_string(),
    );

    let named = [
        ("price action", scores.price_action),
        ("RSI", scores.rsi),
        ("MACD", scores.macd),
        ("volume", scores.volume),
        ("sentiment", scores.sentiment),
    ];
    if let Some((name, value)) = named
        .iter()
        .filter_map(|(name, score)| score.map(|v| (*name, v)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
    {
        parts.push(format!("led by its {name} component ({value:.0})"));
    }

    if flags.buy_signal() {
        parts.push("with every confirmation flag aligned".to_string());
    } else if flags.price_action == Some(true) {
        parts.push("trading near a key technical level".to_string());
    }

    if let Some(s) = sentiment.filter(|s| s.has_signal()) {
        let tone = if s.standardized_score >= 75.0 {
            "very positive"
        } else if s.standardized_score >= 55.0 {
            "positive"
        } else if s.standardized_score <= 25.0 {
            "very negative"
        } else if s.standardized_score <= 45.0 {
            "negative"
        } else {
            "neutral"
        };
        let origin = if s.is_fallback { ", simulated" } else { "" };
        parts.push(format!(
            "with {tone} social sentiment ({} mentions{origin})",
            s.total_mentions
        ));
    }

    format!(
        "{ticker} {} — rated {}.",
        parts.join(", "),
        recommendation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{compute_fibonacci, compute_levels};
    use crate::models::Indicator;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(21, 0, 0)
            .unwrap()
    }

    fn bar(day: u32, high: f64, low: f64, close: f64, volume: i64) -> DailyBar {
        DailyBar {
            symbol: "TEST".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: Some(volume),
            fetched_at: ts(),
        }
    }

    fn sentiment(score: f64, mentions: u32) -> SentimentSummary {
        SentimentSummary {
            ticker: "TEST".into(),
            total_mentions: mentions,
            pct_positive: 50.0,
            pct_neutral: 30.0,
            pct_negative: 20.0,
            standardized_score: score,
            trend_direction: TrendDirection::Stable,
            is_fallback: false,
        }
    }

    #[test]
    fn tier_boundaries_are_lower_inclusive() {
        assert_eq!(recommendation_for(75.0), Recommendation::StrongBuy);
        assert_eq!(recommendation_for(74.99), Recommendation::Buy);
        assert_eq!(recommendation_for(60.0), Recommendation::Buy);
        assert_eq!(recommendation_for(59.99), Recommendation::Hold);
        assert_eq!(recommendation_for(45.0), Recommendation::Hold);
        assert_eq!(recommendation_for(44.99), Recommendation::WeakHold);
        assert_eq!(recommendation_for(30.0), Recommendation::WeakHold);
        assert_eq!(recommendation_for(29.99), Recommendation::Avoid);
    }

    #[test]
    fn composite_renormalizes_over_available_components() {
        let scores = ComponentScores {
            price_action: Some(80.0),
            rsi: Some(60.0),
            macd: None,
            volume: None,
            sentiment: None,
        };
        let weights = ScoreWeights::default();
        // (80×0.30 + 60×0.20) / 0.50 = 72 — not dragged down by the missing
        // components.
        let c = composite(&scores, &weights);
        assert!((c - 72.0).abs() < 1e-9);
    }

    #[test]
    fn composite_with_nothing_available_is_neutral() {
        let c = composite(&ComponentScores::default(), &ScoreWeights::default());
        assert_eq!(c, 50.0);
    }

    #[test]
    fn composite_stays_in_range() {
        let scores = ComponentScores {
            price_action: Some(100.0),
            rsi: Some(100.0),
            macd: Some(75.0),
            volume: Some(100.0),
            sentiment: Some(100.0),
        };
        let c = composite(&scores, &ScoreWeights::default());
        assert!((0.0..=100.0).contains(&c));
    }

    #[test]
    fn neutral_indicators_leave_momentum_unconfirmed() {
        let flags = SignalFlags {
            price_action: Some(true),
            rsi: None, // placeholder
            macd: Some(true),
            volume: Some(true),
        };
        assert_eq!(flags.momentum(), None);
        assert!(!flags.buy_signal());
    }

    #[test]
    fn measured_momentum_confirms_on_oversold_rsi_and_positive_macd() {
        let bars: Vec<DailyBar> = (1..=10).map(|d| bar(d, 110.0, 90.0, 100.0, 3_000_000)).collect();
        let inputs = EvaluationInputs {
            ticker: "TEST",
            bars: &bars,
            fundamentals: Fundamentals::default(),
            levels: compute_levels(&bars),
            fibonacci: None,
            indicators: IndicatorSet {
                rsi: Indicator::Measured(28.0),
                macd: Indicator::Measured(1.2),
                is_fallback: false,
            },
            sentiment: None,
        };
        let record = evaluate(inputs, &EvaluationConfig::default(), ts());

        assert_eq!(record.flags.rsi, Some(true));
        assert_eq!(record.flags.macd, Some(true));
        assert_eq!(record.flags.momentum(), Some(true));
    }

    #[test]
    fn unconfirmed_flag_fails_the_buy_signal_and() {
        let confirmed = SignalFlags {
            price_action: Some(true),
            rsi: Some(true),
            macd: Some(true),
            volume: Some(true),
        };
        assert!(confirmed.buy_signal());

        let weak_rsi = SignalFlags {
            rsi: Some(false),
            ..confirmed
        };
        assert!(!weak_rsi.buy_signal());
    }

    #[test]
    fn price_action_flag_fires_inside_tolerance_band() {
        let bars: Vec<DailyBar> = (1..=10).map(|d| bar(d, 110.0, 90.0, 100.0, 1_000_000)).collect();
        let levels = compute_levels(&bars);

        // recent_support is 90; 2% band → anything at or under 91.8 is near.
        assert_eq!(price_action_flag(Some(91.0), &levels, None, 2.0), Some(true));
        assert_eq!(
            price_action_flag(Some(100.0), &levels, None, 2.0),
            Some(true) // pivot sits at 100
        );
        assert_eq!(price_action_flag(None, &levels, None, 2.0), None);
    }

    #[test]
    fn price_position_score_inverts_range_position() {
        let levels = TechnicalLevels {
            recent_support: Some(90.0),
            recent_resistance: Some(110.0),
            ..TechnicalLevels::default()
        };
        assert_eq!(price_position_score(Some(90.0), &levels), Some(100.0));
        assert_eq!(price_position_score(Some(110.0), &levels), Some(0.0));
        assert_eq!(price_position_score(Some(100.0), &levels), Some(50.0));
    }

    #[test]
    fn sentiment_score_applies_volume_and_trend_adjustments() {
        let mut s = sentiment(60.0, 60);
        s.trend_direction = TrendDirection::Improving;
        // 60 + 10 (mentions > 50) + 10 (improving) = 80
        assert_eq!(sentiment_score(&s), 80.0);

        let mut s = sentiment(95.0, 60);
        s.trend_direction = TrendDirection::Improving;
        assert_eq!(sentiment_score(&s), 100.0); // clamped
    }

    #[test]
    fn full_evaluation_is_idempotent_and_mentions_the_tier() {
        let bars: Vec<DailyBar> = (1..=25)
            .map(|d| bar(d, 105.0 + d as f64 * 0.1, 95.0, 100.0, 2_000_000))
            .collect();
        let levels = compute_levels(&bars);
        let (high, low) = crate::analysis::fibonacci::detect_swing(&bars).unwrap();
        let fib = compute_fibonacci(high, low).unwrap();

        let make_inputs = || EvaluationInputs {
            ticker: "QCOM",
            bars: &bars,
            fundamentals: Fundamentals {
                price: Some(100.0),
                ..Fundamentals::default()
            },
            levels,
            fibonacci: Some(fib),
            indicators: IndicatorSet {
                rsi: Indicator::Measured(34.0),
                macd: Indicator::Measured(0.8),
                is_fallback: false,
            },
            sentiment: Some(sentiment(70.0, 25)),
        };

        let cfg = EvaluationConfig::default();
        let first = evaluate(make_inputs(), &cfg, ts());
        let second = evaluate(make_inputs(), &cfg, ts());
        assert_eq!(first, second);

        assert!((0.0..=100.0).contains(&first.composite_score));
        assert!(first.commentary.contains(first.recommendation.label()));
        assert!(first.commentary.contains("led by its"));
        assert!(first.stop_loss.is_some());
        assert!(first.target.is_some());
    }

    #[test]
    fn degraded_record_keeps_schema_and_names_the_gap() {
        let record = degraded("XYZ", "no historical bars", ts());
        assert_eq!(record.composite_score, 50.0);
        assert_eq!(record.recommendation, Recommendation::Hold);
        assert_eq!(record.note.as_deref(), Some("no historical bars"));
        assert_eq!(record.levels, TechnicalLevels::default());
        assert!(record.commentary.contains("Hold"));
    }
}
