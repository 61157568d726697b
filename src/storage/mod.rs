use crate::models::{DailyBar, EvaluationRecord, SentimentSummary, Ticker};
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use duckdb::{Connection, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS tickers (
    symbol      VARCHAR PRIMARY KEY,
    name        VARCHAR,
    added_at    TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_bars (
    symbol      VARCHAR  NOT NULL,
    date        DATE     NOT NULL,
    open        DOUBLE   NOT NULL,
    high        DOUBLE   NOT NULL,
    low         DOUBLE   NOT NULL,
    close       DOUBLE   NOT NULL,
    volume      BIGINT,
    fetched_at  TIMESTAMP NOT NULL,
    PRIMARY KEY (symbol, date)
);

CREATE TABLE IF NOT EXISTS sentiment_history (
    symbol              VARCHAR NOT NULL,
    run_id              BIGINT  NOT NULL,
    standardized_score  DOUBLE  NOT NULL,
    total_mentions      INTEGER NOT NULL,
    is_fallback         BOOLEAN NOT NULL,
    recorded_at         TIMESTAMP NOT NULL,
    PRIMARY KEY (symbol, run_id)
);

CREATE TABLE IF NOT EXISTS evaluations (
    run_id             BIGINT  NOT NULL,
    symbol             VARCHAR NOT NULL,
    price              DOUBLE,
    pe_ratio           DOUBLE,
    market_cap         DOUBLE,
    high_52w           DOUBLE,
    low_52w            DOUBLE,
    pivot_point        DOUBLE,
    support_1          DOUBLE,
    support_2          DOUBLE,
    resistance_1       DOUBLE,
    resistance_2       DOUBLE,
    recent_support     DOUBLE,
    recent_resistance  DOUBLE,
    fib_23_6           DOUBLE,
    fib_38_2           DOUBLE,
    fib_50_0           DOUBLE,
    fib_61_8           DOUBLE,
    stop_loss          DOUBLE,
    target_price       DOUBLE,
    price_action_flag  BOOLEAN,
    rsi_flag           BOOLEAN,
    macd_flag          BOOLEAN,
    volume_flag        BOOLEAN,
    buy_signal         BOOLEAN NOT NULL,
    composite_score    DOUBLE  NOT NULL,
    recommendation     VARCHAR NOT NULL,
    sentiment_score    DOUBLE,
    sentiment_mentions INTEGER,
    sentiment_fallback BOOLEAN,
    commentary         VARCHAR NOT NULL,
    note               VARCHAR,
    evaluated_at       TIMESTAMP NOT NULL,
    PRIMARY KEY (run_id, symbol)
);

CREATE TABLE IF NOT EXISTS eval_runs (
    id                  BIGINT PRIMARY KEY,
    started_at          TIMESTAMP NOT NULL,
    finished_at         TIMESTAMP,
    status              VARCHAR NOT NULL DEFAULT 'running',
    tickers_processed   INTEGER DEFAULT 0,
    errors              INTEGER DEFAULT 0,
    error_msg           VARCHAR
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_bars_date    ON daily_bars (date);
CREATE INDEX IF NOT EXISTS idx_bars_symbol  ON daily_bars (symbol);
CREATE INDEX IF NOT EXISTS idx_eval_run     ON evaluations (run_id);
CREATE INDEX IF NOT EXISTS idx_sent_symbol  ON sentiment_history (symbol);
"#;

// ── Repository ────────────────────────────────────────────────────────────────

/// DuckDB access behind a mutex so the pipeline can share one handle across
/// concurrent per-ticker tasks.
pub struct Repository {
    conn: Mutex<Connection>,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database handle poisoned"))
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        let conn = self.conn()?;
        conn.execute_batch(DDL).context("DDL failed")?;
        conn.execute_batch(INDEXES).context("Index creation failed")?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Watchlist ─────────────────────────────────────────────────────────────

    pub fn upsert_tickers(&self, tickers: &[Ticker]) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        for t in tickers {
            tx.execute(
                r#"INSERT INTO tickers (symbol, name, added_at)
                   VALUES (?, ?, ?)
                   ON CONFLICT (symbol) DO UPDATE SET
                       name = COALESCE(excluded.name, tickers.name)"#,
                params![t.symbol, t.name, t.added_at],
            )
            .with_context(|| format!("upsert ticker {}", t.symbol))?;
        }
        tx.commit()?;
        Ok(tickers.len())
    }

    /// Register bare symbols on the watchlist.
    pub fn add_symbols(&self, symbols: &[String]) -> Result<usize> {
        let now = Utc::now().naive_utc();
        let tickers: Vec<Ticker> = symbols
            .iter()
            .map(|s| Ticker {
                symbol: s.trim().to_uppercase(),
                name: None,
                added_at: now,
            })
            .filter(|t| !t.symbol.is_empty())
            .collect();
        self.upsert_tickers(&tickers)
    }

    pub fn list_symbols(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT symbol FROM tickers ORDER BY symbol")?;
        let syms: Vec<String> = stmt
            .query_map([], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(syms)
    }

    // ── Daily bars ────────────────────────────────────────────────────────────

    /// Upsert bars — idempotent, safe to re-run on same data.
    pub fn upsert_daily_bars(&self, bars: &[DailyBar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let sql = r#"
            INSERT INTO daily_bars
                (symbol, date, open, high, low, close, volume, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (symbol, date) DO UPDATE SET
                open       = excluded.open,
                high       = excluded.high,
                low        = excluded.low,
                close      = excluded.close,
                volume     = COALESCE(excluded.volume, daily_bars.volume),
                fetched_at = excluded.fetched_at
        "#;

        for bar in bars {
            tx.execute(
                sql,
                params![
                    bar.symbol,
                    bar.date,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.fetched_at,
                ],
            )
            .with_context(|| format!("insert bar {} {}", bar.symbol, bar.date))?;
        }

        tx.commit()?;
        Ok(bars.len())
    }

    /// Trailing bars for a symbol, chronological (oldest first).
    pub fn bars_for_symbol(&self, symbol: &str, limit: usize) -> Result<Vec<DailyBar>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT symbol, date, open, high, low, close, volume, fetched_at
               FROM daily_bars WHERE symbol = ?
               ORDER BY date DESC LIMIT ?"#,
        )?;

        let mut bars: Vec<DailyBar> = stmt
            .query_map(params![symbol, limit as i64], |r| {
                Ok(DailyBar {
                    symbol: r.get(0)?,
                    date: r.get(1)?,
                    open: r.get(2)?,
                    high: r.get(3)?,
                    low: r.get(4)?,
                    close: r.get(5)?,
                    volume: r.get(6)?,
                    fetched_at: r.get(7)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        bars.reverse();
        Ok(bars)
    }

    pub fn bar_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let mut s = conn.prepare("SELECT COUNT(*) FROM daily_bars")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn ticker_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let mut s = conn.prepare("SELECT COUNT(*) FROM tickers")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn date_range(
        &self,
    ) -> Result<(Option<chrono::NaiveDate>, Option<chrono::NaiveDate>)> {
        let conn = self.conn()?;
        let mut s = conn.prepare("SELECT MIN(date), MAX(date) FROM daily_bars")?;
        Ok(s.query_row([], |r| Ok((r.get(0)?, r.get(1)?)))?)
    }

    // ── Sentiment history ─────────────────────────────────────────────────────

    pub fn insert_sentiment(
        &self,
        run_id: i64,
        summary: &SentimentSummary,
        recorded_at: NaiveDateTime,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO sentiment_history
                   (symbol, run_id, standardized_score, total_mentions, is_fallback, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT (symbol, run_id) DO UPDATE SET
                   standardized_score = excluded.standardized_score,
                   total_mentions     = excluded.total_mentions,
                   is_fallback        = excluded.is_fallback,
                   recorded_at        = excluded.recorded_at"#,
            params![
                summary.ticker,
                run_id,
                summary.standardized_score,
                summary.total_mentions,
                summary.is_fallback,
                recorded_at,
            ],
        )
        .with_context(|| format!("insert sentiment {}", summary.ticker))?;
        Ok(())
    }

    /// The most recent standardized scores for a symbol, oldest first —
    /// the trailing window the trend comparison consumes.
    pub fn sentiment_scores(&self, symbol: &str, window: usize) -> Result<Vec<f64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT standardized_score FROM sentiment_history
               WHERE symbol = ? ORDER BY run_id DESC LIMIT ?"#,
        )?;

        let mut scores: Vec<f64> = stmt
            .query_map(params![symbol, window as i64], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        scores.reverse();
        Ok(scores)
    }

    // ── Evaluations ───────────────────────────────────────────────────────────

    pub fn insert_evaluations(&self, run_id: i64, records: &[EvaluationRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let sql = r#"
            INSERT INTO evaluations
                (run_id, symbol, price, pe_ratio, market_cap, high_52w, low_52w,
                 pivot_point, support_1, support_2, resistance_1, resistance_2,
                 recent_support, recent_resistance,
                 fib_23_6, fib_38_2, fib_50_0, fib_61_8,
                 stop_loss, target_price,
                 price_action_flag, rsi_flag, macd_flag, volume_flag, buy_signal,
                 composite_score, recommendation,
                 sentiment_score, sentiment_mentions, sentiment_fallback,
                 commentary, note, evaluated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        for r in records {
            tx.execute(
                sql,
                params![
                    run_id,
                    r.ticker,
                    r.price,
                    r.fundamentals.pe_ratio,
                    r.fundamentals.market_cap,
                    r.fundamentals.high_52w,
                    r.fundamentals.low_52w,
                    r.levels.pivot_point,
                    r.levels.support_1,
                    r.levels.support_2,
                    r.levels.resistance_1,
                    r.levels.resistance_2,
                    r.levels.recent_support,
                    r.levels.recent_resistance,
                    r.fibonacci.map(|f| f.level_23_6),
                    r.fibonacci.map(|f| f.level_38_2),
                    r.fibonacci.map(|f| f.level_50_0),
                    r.fibonacci.map(|f| f.level_61_8),
                    r.stop_loss,
                    r.target,
                    r.flags.price_action,
                    r.flags.rsi,
                    r.flags.macd,
                    r.flags.volume,
                    r.flags.buy_signal(),
                    r.composite_score,
                    r.recommendation.label(),
                    r.sentiment.as_ref().map(|s| s.standardized_score),
                    r.sentiment.as_ref().map(|s| s.total_mentions),
                    r.sentiment.as_ref().map(|s| s.is_fallback),
                    r.commentary,
                    r.note,
                    r.evaluated_at,
                ],
            )
            .with_context(|| format!("insert evaluation {}", r.ticker))?;
        }

        tx.commit()?;
        Ok(records.len())
    }

    // ── Evaluation run log ────────────────────────────────────────────────────

    pub fn begin_eval_run(&self) -> Result<i64> {
        let conn = self.conn()?;
        let id: i64 = conn.query_row(
            "SELECT COALESCE(MAX(id), 0) + 1 FROM eval_runs",
            [],
            |r| r.get(0),
        )?;
        conn.execute(
            "INSERT INTO eval_runs (id, started_at, status) VALUES (?, ?, 'running')",
            params![id, Utc::now().naive_utc()],
        )?;
        Ok(id)
    }

    pub fn finish_eval_run(
        &self,
        run_id: i64,
        tickers: usize,
        errors: usize,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE eval_runs SET
               finished_at = ?, status = ?,
               tickers_processed = ?, errors = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if error.is_none() { "success" } else { "error" },
                tickers as i64,
                errors as i64,
                error,
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn eval_run_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let mut s = conn.prepare("SELECT COUNT(*) FROM eval_runs")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(symbol: &str, day: u32, close: f64) -> DailyBar {
        DailyBar {
            symbol: symbol.into(),
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: Some(1_000),
            fetched_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn add_symbols_is_idempotent() {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();

        repo.add_symbols(&["qcom".into(), "NVDA".into()]).unwrap();
        repo.add_symbols(&["QCOM".into()]).unwrap();

        assert_eq!(repo.list_symbols().unwrap(), vec!["NVDA", "QCOM"]);
    }

    #[test]
    fn bar_upsert_is_idempotent_and_reads_back_chronological() {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();

        let bars = vec![bar("QCOM", 3, 162.0), bar("QCOM", 1, 160.0), bar("QCOM", 2, 161.0)];
        repo.upsert_daily_bars(&bars).unwrap();
        repo.upsert_daily_bars(&bars).unwrap();

        assert_eq!(repo.bar_count().unwrap(), 3);

        let stored = repo.bars_for_symbol("QCOM", 10).unwrap();
        let dates: Vec<u32> = stored
            .iter()
            .map(|b| b.date.format("%d").to_string().parse().unwrap())
            .collect();
        assert_eq!(dates, vec![1, 2, 3]);
    }

    #[test]
    fn sentiment_window_returns_most_recent_scores_oldest_first() {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        let now = Utc::now().naive_utc();

        for (run, score) in [(1i64, 40.0), (2, 50.0), (3, 60.0)] {
            let summary = SentimentSummary {
                ticker: "QCOM".into(),
                total_mentions: 10,
                pct_positive: 50.0,
                pct_neutral: 30.0,
                pct_negative: 20.0,
                standardized_score: score,
                trend_direction: crate::models::TrendDirection::Stable,
                is_fallback: false,
            };
            repo.insert_sentiment(run, &summary, now).unwrap();
        }

        assert_eq!(repo.sentiment_scores("QCOM", 2).unwrap(), vec![50.0, 60.0]);
        assert_eq!(repo.sentiment_scores("QCOM", 10).unwrap(), vec![40.0, 50.0, 60.0]);
    }

    #[test]
    fn eval_run_ids_increment() {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();

        let first = repo.begin_eval_run().unwrap();
        let second = repo.begin_eval_run().unwrap();
        assert_eq!(second, first + 1);

        repo.finish_eval_run(second, 5, 0, None).unwrap();
        assert_eq!(repo.eval_run_count().unwrap(), 2);
    }
}
