use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub evaluation: EvaluationConfig,
    pub sentiment: SentimentConfig,
}

/// Market data / extraction endpoints and HTTP politeness knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_quote_api_url")]
    pub quote_api_url: String,

    #[serde(default = "default_indicators_url")]
    pub indicators_url: String,

    /// REST sentiment endpoint; unset means simulated sentiment only.
    #[serde(default)]
    pub sentiment_api_url: Option<String>,

    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Skip all network fetches; indicators and sentiment come from the
    /// deterministic simulated sources, flagged as fallback.
    #[serde(default)]
    pub offline: bool,
}

/// Scoring weights, one per composite component. They sum to 1.0; when a
/// component is unavailable for a ticker the remaining weights are
/// renormalized at evaluation time.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ScoreWeights {
    #[serde(default = "default_w_price_action")]
    pub price_action: f64,

    #[serde(default = "default_w_rsi")]
    pub rsi: f64,

    #[serde(default = "default_w_macd")]
    pub macd: f64,

    #[serde(default = "default_w_volume")]
    pub volume: f64,

    #[serde(default = "default_w_sentiment")]
    pub sentiment: f64,
}

/// Flag/score evaluator tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvaluationConfig {
    /// "Near a level" band as a percentage of the level price.
    #[serde(default = "default_level_tolerance_pct")]
    pub level_tolerance_pct: f64,

    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,

    /// Today's volume must be at least this multiple of the trailing
    /// average before the volume flag confirms.
    #[serde(default = "default_volume_surge_ratio")]
    pub volume_surge_ratio: f64,

    #[serde(default = "default_weights")]
    pub weights: ScoreWeights,
}

/// Sentiment aggregation tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SentimentConfig {
    /// Points of slack around the trailing average before a trend flips
    /// away from stable.
    #[serde(default = "default_trend_epsilon")]
    pub trend_epsilon: f64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_quote_api_url() -> String {
    "https://api.stockinsight.app/v1".to_string()
}
fn default_indicators_url() -> String {
    "https://tech.stockinsight.app/summary".to_string()
}
fn default_lookback_days() -> u32 {
    90
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    1500
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "stock-insight/0.1 (personal watchlist research)".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/insight.duckdb")
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    3
}
fn default_level_tolerance_pct() -> f64 {
    2.0
}
fn default_rsi_oversold() -> f64 {
    30.0
}
fn default_volume_surge_ratio() -> f64 {
    1.5
}
fn default_w_price_action() -> f64 {
    0.30
}
fn default_w_rsi() -> f64 {
    0.20
}
fn default_w_macd() -> f64 {
    0.20
}
fn default_w_volume() -> f64 {
    0.10
}
fn default_w_sentiment() -> f64 {
    0.20
}
fn default_weights() -> ScoreWeights {
    ScoreWeights::default()
}
fn default_trend_epsilon() -> f64 {
    2.0
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("INSIGHT").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            storage: StorageConfig {
                db_path: default_db_path(),
                run_migrations: true,
            },
            pipeline: PipelineConfig {
                concurrency: default_concurrency(),
                offline: false,
            },
            evaluation: EvaluationConfig::default(),
            sentiment: SentimentConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            quote_api_url: default_quote_api_url(),
            indicators_url: default_indicators_url(),
            sentiment_api_url: None,
            lookback_days: default_lookback_days(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price_action: default_w_price_action(),
            rsi: default_w_rsi(),
            macd: default_w_macd(),
            volume: default_w_volume(),
            sentiment: default_w_sentiment(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            level_tolerance_pct: default_level_tolerance_pct(),
            rsi_oversold: default_rsi_oversold(),
            volume_surge_ratio: default_volume_surge_ratio(),
            weights: ScoreWeights::default(),
        }
    }
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            trend_epsilon: default_trend_epsilon(),
        }
    }
}
