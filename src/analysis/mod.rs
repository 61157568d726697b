//! Derived-metrics core: pure, synchronous, state-free computations.
//!
//! Every function here only reads its inputs and returns a fresh value, so
//! the pipeline may invoke them concurrently across tickers without locking.

pub mod evaluate;
pub mod fibonacci;
pub mod levels;
pub mod sentiment;

pub use evaluate::{EvaluationInputs, degraded, evaluate, recommendation_for};
pub use fibonacci::{compute_fibonacci, detect_swing};
pub use levels::compute_levels;
pub use sentiment::{PortfolioSentiment, aggregate, summarize_portfolio};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    /// Fewer bars than the policy minimum. Handled locally by substituting
    /// "unavailable" field markers, never propagated as a crash.
    #[error("insufficient data: {actual} bars available, {required} required")]
    InsufficientData { required: usize, actual: usize },

    /// swing_high below swing_low indicates a logic error in the upstream
    /// swing-detection step and is surfaced to the caller.
    #[error("invalid swing range: high {high} is below low {low}")]
    InvalidRange { high: f64, low: f64 },

    /// Zero mentions across all sources. Not a failure — callers that need
    /// to distinguish "no signal" from "neutral signal" match on this.
    #[error("no sentiment signal: zero mentions across all sources")]
    NoSentimentSignal,
}
