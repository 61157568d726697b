//! Pipeline orchestrator: ties providers → analysis core → storage together.
//!
//! ## Run modes
//!
//! `run_update()` — daily bar refresh (cron use): for each watchlist symbol,
//!   fetch the trailing history from the quote API → upsert into daily_bars.
//!   Idempotent: re-running the same day inserts 0 new rows.
//!
//! `run_evaluation()` — full evaluation pass: per ticker, read stored bars,
//!   extract indicators, aggregate sentiment, compute levels/fibonacci and
//!   the composite score, persist one record per ticker. A failing ticker
//!   degrades to a neutral record with a note; the batch never aborts.

use crate::analysis::{self, AnalysisError, EvaluationInputs, sentiment::TREND_WINDOW};
use crate::config::{AppConfig, EvaluationConfig};
use crate::models::{EvaluationRecord, Fundamentals, IndicatorSet};
use crate::providers::indicators::{HtmlIndicatorExtractor, IndicatorSource, SimulatedIndicators};
use crate::providers::sentiment::{RestSentimentSource, SentimentSource, SimulatedSentimentSource};
use crate::providers::{MarketDataSource, RestMarketProvider};
use crate::report::{self, RunSummary};
use crate::storage::Repository;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug)]
pub struct UpdateStats {
    pub tickers_processed: usize,
    pub bars_inserted: usize,
    pub errors: usize,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn open_repository(&self) -> Result<Arc<Repository>> {
        let repo = Arc::new(
            Repository::open(&self.config.storage.db_path).context("Failed to open DuckDB")?,
        );
        if self.config.storage.run_migrations {
            repo.run_migrations()?;
        }
        Ok(repo)
    }

    fn watchlist(&self, repo: &Repository) -> Result<Vec<String>> {
        let symbols = repo.list_symbols()?;
        if symbols.is_empty() {
            anyhow::bail!("watchlist is empty — run `stock-insight add` or `load-csv` first");
        }
        Ok(symbols)
    }

    // ── Daily bar refresh ─────────────────────────────────────────────────────

    pub async fn run_update(&self) -> Result<UpdateStats> {
        let repo = self.open_repository()?;
        let symbols = self.watchlist(&repo)?;

        let provider = Arc::new(
            RestMarketProvider::new(&self.config.provider)
                .context("Failed to build market data provider")?,
        );

        info!("=== Updating bars for {} tickers ===", symbols.len());
        let lookback = self.config.provider.lookback_days;
        let sem = Arc::new(Semaphore::new(self.config.pipeline.concurrency));
        let mut handles = Vec::new();

        for symbol in &symbols {
            let label = symbol.clone();
            let symbol = symbol.clone();
            let provider = Arc::clone(&provider);
            let repo = Arc::clone(&repo);
            let sem = Arc::clone(&sem);

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;

                let bars = provider
                    .fetch_historical_bars(&symbol, lookback)
                    .await
                    .with_context(|| format!("fetch_historical_bars({})", symbol))?;

                let n = repo
                    .upsert_daily_bars(&bars)
                    .with_context(|| format!("upsert_daily_bars({})", symbol))?;

                info!(
                    "{}: {} bars (latest: {:?})",
                    symbol,
                    n,
                    bars.iter().map(|b| b.date).max()
                );

                Ok::<usize, anyhow::Error>(n)
            });

            handles.push((label, handle));
        }

        let mut total_bars = 0usize;
        let mut errors = 0usize;
        for (symbol, handle) in handles {
            match handle.await {
                Ok(Ok(n)) => total_bars += n,
                Ok(Err(e)) => {
                    warn!("{}: {:#}", symbol, e);
                    errors += 1;
                }
                Err(e) => {
                    error!("Task panic for {}: {}", symbol, e);
                    errors += 1;
                }
            }
        }

        let (min_date, max_date) = repo.date_range().unwrap_or((None, None));
        info!(
            "=== Done: {} tickers | {} bars | {} errors | DB range: {:?} → {:?} ===",
            symbols.len(),
            total_bars,
            errors,
            min_date,
            max_date,
        );

        Ok(UpdateStats {
            tickers_processed: symbols.len(),
            bars_inserted: total_bars,
            errors,
        })
    }

    // ── Evaluation pass ───────────────────────────────────────────────────────

    pub async fn run_evaluation(&self) -> Result<(RunSummary, Vec<EvaluationRecord>)> {
        let repo = self.open_repository()?;
        let symbols = self.watchlist(&repo)?;
        let run_id = repo.begin_eval_run()?;

        let offline = self.config.pipeline.offline;
        let indicator_source: Arc<dyn IndicatorSource> = if offline {
            Arc::new(SimulatedIndicators)
        } else {
            Arc::new(HtmlIndicatorExtractor::new(&self.config.provider)?)
        };
        let sentiment_source: Arc<dyn SentimentSource> =
            match (&self.config.provider.sentiment_api_url, offline) {
                (Some(base), false) => {
                    Arc::new(RestSentimentSource::new(&self.config.provider, base)?)
                }
                _ => Arc::new(SimulatedSentimentSource),
            };
        let fundamentals_source: Option<Arc<RestMarketProvider>> = if offline {
            None
        } else {
            Some(Arc::new(RestMarketProvider::new(&self.config.provider)?))
        };

        let evaluation_cfg = Arc::new(self.config.evaluation.clone());
        let trend_epsilon = self.config.sentiment.trend_epsilon;
        let lookback = self.config.provider.lookback_days as usize;

        info!("=== Evaluation run {} ({} tickers) ===", run_id, symbols.len());

        let sem = Arc::new(Semaphore::new(self.config.pipeline.concurrency));
        let mut handles = Vec::new();

        for symbol in &symbols {
            let label = symbol.clone();
            let symbol = symbol.clone();
            let repo = Arc::clone(&repo);
            let sem = Arc::clone(&sem);
            let indicator_source = Arc::clone(&indicator_source);
            let sentiment_source = Arc::clone(&sentiment_source);
            let fundamentals_source = fundamentals_source.clone();
            let evaluation_cfg = Arc::clone(&evaluation_cfg);

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;

                let record = evaluate_one(
                    &symbol,
                    &repo,
                    run_id,
                    lookback,
                    fundamentals_source.as_deref(),
                    &*indicator_source,
                    &*sentiment_source,
                    &evaluation_cfg,
                    trend_epsilon,
                )
                .await;

                info!(
                    "{}: score {:.1} → {}",
                    symbol, record.composite_score, record.recommendation
                );

                Ok::<EvaluationRecord, anyhow::Error>(record)
            });

            handles.push((label, handle));
        }

        let mut records = Vec::new();
        let mut errors = 0usize;
        for (symbol, handle) in handles {
            match handle.await {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(e)) => {
                    warn!("{}: {:#}", symbol, e);
                    errors += 1;
                    records.push(analysis::degraded(
                        &symbol,
                        format!("task failed: {e:#}"),
                        Utc::now().naive_utc(),
                    ));
                }
                Err(e) => {
                    error!("Task panic for {}: {}", symbol, e);
                    errors += 1;
                    records.push(analysis::degraded(
                        &symbol,
                        "task panicked",
                        Utc::now().naive_utc(),
                    ));
                }
            }
        }

        records.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
        repo.insert_evaluations(run_id, &records)?;

        let summary = report::build_summary(run_id, &records, errors);
        let error_note = if errors > 0 {
            Some(format!("{} errors", errors))
        } else {
            None
        };
        repo.finish_eval_run(run_id, summary.tickers_processed, errors, error_note.as_deref())
            .ok();

        info!(
            "=== Done: run {} | {} tickers | {} errors | top: {:?} ===",
            run_id, summary.tickers_processed, summary.errors, summary.top_pick,
        );

        Ok((summary, records))
    }
}

/// One ticker, end to end. Infallible by design: any missing upstream input
/// degrades the record instead of failing the batch.
#[allow(clippy::too_many_arguments)]
async fn evaluate_one(
    symbol: &str,
    repo: &Repository,
    run_id: i64,
    lookback: usize,
    fundamentals_source: Option<&RestMarketProvider>,
    indicator_source: &dyn IndicatorSource,
    sentiment_source: &dyn SentimentSource,
    evaluation_cfg: &EvaluationConfig,
    trend_epsilon: f64,
) -> EvaluationRecord {
    let now = Utc::now().naive_utc();

    let bars = match repo.bars_for_symbol(symbol, lookback) {
        Ok(bars) => bars,
        Err(e) => {
            warn!("{}: bar lookup failed: {:#}", symbol, e);
            return analysis::degraded(symbol, format!("bar lookup failed: {e:#}"), now);
        }
    };
    if bars.is_empty() {
        let cause = AnalysisError::InsufficientData {
            required: 1,
            actual: 0,
        };
        return analysis::degraded(symbol, cause.to_string(), now);
    }

    let fundamentals = match fundamentals_source {
        Some(provider) => provider
            .fetch_fundamentals(symbol)
            .await
            .unwrap_or_else(|e| {
                warn!("{}: fundamentals unavailable: {:#}", symbol, e);
                Fundamentals::default()
            }),
        None => Fundamentals::default(),
    };

    let indicators = indicator_source
        .fetch_indicators(symbol)
        .await
        .unwrap_or_else(|e| {
            warn!("{}: indicator fetch failed: {:#}", symbol, e);
            IndicatorSet::neutral(true)
        });

    let sources = sentiment_source
        .fetch_sentiment(symbol)
        .await
        .unwrap_or_else(|e| {
            warn!("{}: sentiment fetch failed: {:#}", symbol, e);
            Vec::new()
        });
    let history = repo.sentiment_scores(symbol, TREND_WINDOW).unwrap_or_default();
    let sentiment = analysis::aggregate(symbol, &sources, &history, trend_epsilon);
    if let Err(e) = repo.insert_sentiment(run_id, &sentiment, now) {
        warn!("{}: failed to record sentiment history: {:#}", symbol, e);
    }

    let levels = analysis::compute_levels(&bars);
    let fibonacci = match analysis::detect_swing(&bars)
        .map(|(high, low)| analysis::compute_fibonacci(high, low))
    {
        Some(Ok(fib)) => Some(fib),
        Some(Err(e)) => {
            warn!("{}: {}", symbol, e);
            None
        }
        None => None,
    };

    analysis::evaluate(
        EvaluationInputs {
            ticker: symbol,
            bars: &bars,
            fundamentals,
            levels,
            fibonacci,
            indicators,
            sentiment: Some(sentiment),
        },
        evaluation_cfg,
        now,
    )
}
