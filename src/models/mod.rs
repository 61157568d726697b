use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Watchlist ticker ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticker {
    pub symbol: String,
    pub name: Option<String>,
    pub added_at: NaiveDateTime,
}

// ── Equity daily bar ──────────────────────────────────────────────────────────

/// One completed trading day. OHLC are all required: rows missing any price
/// component are dropped at the ingest boundary, never stored as zeros.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<i64>,
    pub fetched_at: NaiveDateTime,
}

// ── Fundamentals snapshot ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Fundamentals {
    pub price: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<f64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
}

// ── Derived technical levels ──────────────────────────────────────────────────

/// Pivot-point and recent-range levels. `None` is the explicit "unavailable"
/// marker used when too few bars exist — never a silent zero or NaN.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TechnicalLevels {
    pub pivot_point: Option<f64>,
    pub support_1: Option<f64>,
    pub support_2: Option<f64>,
    pub resistance_1: Option<f64>,
    pub resistance_2: Option<f64>,
    pub recent_support: Option<f64>,
    pub recent_resistance: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FibonacciLevels {
    pub swing_high: f64,
    pub swing_low: f64,
    pub level_23_6: f64,
    pub level_38_2: f64,
    pub level_50_0: f64,
    pub level_61_8: f64,
}

// ── Indicators ────────────────────────────────────────────────────────────────

/// A technical indicator reading. `Neutral` marks an indicator that was never
/// measured (page unreachable, extraction disabled) so callers cannot mistake
/// it for a genuine mid-scale reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Indicator {
    Measured(f64),
    Neutral,
}

impl Indicator {
    pub fn measured(&self) -> Option<f64> {
        match self {
            Indicator::Measured(v) => Some(*v),
            Indicator::Neutral => None,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, Indicator::Measured(_))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSet {
    pub rsi: Indicator,
    pub macd: Indicator,
    pub is_fallback: bool,
}

impl IndicatorSet {
    /// All-neutral set, used when no extraction source is available.
    pub fn neutral(is_fallback: bool) -> Self {
        Self {
            rsi: Indicator::Neutral,
            macd: Indicator::Neutral,
            is_fallback,
        }
    }
}

// ── Signal flags ──────────────────────────────────────────────────────────────

/// Confirmation flags. `None` means the flag could not be confirmed from the
/// available inputs (placeholder indicator, missing volume history).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SignalFlags {
    pub price_action: Option<bool>,
    pub rsi: Option<bool>,
    pub macd: Option<bool>,
    pub volume: Option<bool>,
}

impl SignalFlags {
    /// Momentum confirms only when both oscillator flags are measured; a
    /// placeholder on either side leaves it unconfirmed.
    pub fn momentum(&self) -> Option<bool> {
        match (self.rsi, self.macd) {
            (Some(rsi), Some(macd)) => Some(rsi && macd),
            _ => None,
        }
    }

    /// Buy signal = price action AND momentum AND volume, with an
    /// unconfirmed flag counting as false.
    pub fn buy_signal(&self) -> bool {
        self.price_action.unwrap_or(false)
            && self.momentum().unwrap_or(false)
            && self.volume.unwrap_or(false)
    }
}

// ── Recommendation tiers ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    WeakHold,
    Avoid,
}

impl Recommendation {
    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "Strong Buy",
            Recommendation::Buy => "Buy",
            Recommendation::Hold => "Hold",
            Recommendation::WeakHold => "Weak Hold",
            Recommendation::Avoid => "Avoid",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Sentiment ─────────────────────────────────────────────────────────────────

/// Raw per-source sentiment as returned by a provider: mention count, average
/// polarity in [-1, 1], and the positive/neutral/negative breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSentiment {
    pub source: String,
    pub mentions: u32,
    pub polarity: f64,
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
    pub is_fallback: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    pub fn label(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentSummary {
    pub ticker: String,
    pub total_mentions: u32,
    pub pct_positive: f64,
    pub pct_neutral: f64,
    pub pct_negative: f64,
    /// Mention-weighted polarity rescaled to [0, 100]; 50.0 when no signal.
    pub standardized_score: f64,
    pub trend_direction: TrendDirection,
    pub is_fallback: bool,
}

impl SentimentSummary {
    /// Distinguishes "no signal" (zero mentions) from a genuinely neutral
    /// signal that happens to score 50.
    pub fn has_signal(&self) -> bool {
        self.total_mentions > 0
    }
}

// ── Evaluation record ─────────────────────────────────────────────────────────

/// Per-component sub-scores on the 0–100 scale. `None` means the component
/// was unavailable and was excluded from the composite (with the remaining
/// weights renormalized).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentScores {
    pub price_action: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub volume: Option<f64>,
    pub sentiment: Option<f64>,
}

/// One ticker's full evaluation for one run. Created fresh each run and never
/// mutated; a new record replaces the prior one for that ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRecord {
    pub ticker: String,
    pub price: Option<f64>,
    pub fundamentals: Fundamentals,
    pub levels: TechnicalLevels,
    pub fibonacci: Option<FibonacciLevels>,
    pub stop_loss: Option<f64>,
    pub target: Option<f64>,
    pub flags: SignalFlags,
    pub scores: ComponentScores,
    pub composite_score: f64,
    pub recommendation: Recommendation,
    pub commentary: String,
    pub sentiment: Option<SentimentSummary>,
    /// Names the upstream input that was missing when the record is degraded.
    pub note: Option<String>,
    pub evaluated_at: NaiveDateTime,
}

// ── Raw CSV rows ──────────────────────────────────────────────────────────────

/// investing.com history CSV: Date, Price, Open, High, Low, Vol.
/// (the trailing Change % column is derivable and ignored)
#[derive(Debug, Clone, Default)]
pub struct RawCsvRow {
    pub date: Option<String>,
    pub price: Option<String>, // close
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub volume: Option<String>,
}
