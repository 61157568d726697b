mod analysis;
mod config;
mod loader;
mod models;
mod pipeline;
mod providers;
mod report;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::loader::{discover_csv_files, load_csv, load_watchlist_csv};
use crate::pipeline::Pipeline;
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "stock-insight", about = "Personal stock watchlist evaluation", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Add ticker symbols to the watchlist
    Add {
        symbols: Vec<String>,
    },

    /// Import watchlist symbols from a CSV with a Ticker/Symbol column
    Import {
        file: PathBuf,
    },

    /// Bulk-load history CSV files from a directory (investing.com format)
    LoadCsv {
        /// Path to directory containing CSV files (default: data/)
        #[arg(short, long, default_value = "data")]
        dir: PathBuf,
    },

    /// Fetch recent bars for all watchlist tickers (daily update mode)
    Update,

    /// Run a full evaluation pass and print the ranked report
    Evaluate {
        /// Export the ranked records to a CSV file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip network fetches; indicators and sentiment come from the
        /// simulated fallback sources
        #[arg(long)]
        offline: bool,
    },

    /// Show database statistics
    Stats,

    /// List all watchlist symbols
    Symbols,

    /// Apply schema migrations without loading data
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "stock_insight=info,warn",
        1 => "stock_insight=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Add { symbols } => {
            if symbols.is_empty() {
                println!("Nothing to add — pass one or more ticker symbols.");
                return Ok(());
            }
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;
            let n = repo.add_symbols(&symbols)?;
            println!("{} symbols on the watchlist updated.", n);
        }

        Command::Import { file } => {
            let symbols = load_watchlist_csv(&file)?;
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;
            let n = repo.add_symbols(&symbols)?;
            println!("Imported {} symbols from {:?}.", n, file);
        }

        Command::LoadCsv { dir } => {
            let _t = utils::Timer::start("CSV bulk load");
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;

            let files = discover_csv_files(&dir)?;
            info!("Found {} CSV files in {:?}", files.len(), dir);

            let mut total_bars = 0usize;
            let mut errors = 0usize;

            for path in &files {
                match load_csv(path) {
                    Ok((symbol, bars)) => {
                        repo.add_symbols(std::slice::from_ref(&symbol))?;
                        repo.upsert_daily_bars(&bars)?;
                        total_bars += bars.len();
                    }
                    Err(e) => {
                        info!("Error loading {:?}: {:#}", path, e);
                        errors += 1;
                    }
                }
            }

            info!("Done: {} bars inserted, {} errors", total_bars, errors);
        }

        Command::Update => {
            let _t = utils::Timer::start("Daily update");
            let stats = Pipeline::new(config).run_update().await?;
            info!(
                "Done: {} tickers, {} bars, {} errors",
                stats.tickers_processed, stats.bars_inserted, stats.errors
            );
        }

        Command::Evaluate { out, offline } => {
            let mut config = config;
            if offline {
                config.pipeline.offline = true;
            }
            let _t = utils::Timer::start("Evaluation run");
            let (summary, records) = Pipeline::new(config).run_evaluation().await?;
            report::print_report(&records, &summary);

            if let Some(path) = out {
                report::export_csv(&records, &path)?;
                println!("Exported {} records to {:?}.", records.len(), path);
            }
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            let bars = repo.bar_count()?;
            let tickers = repo.ticker_count()?;
            let runs = repo.eval_run_count()?;
            let (min, max) = repo.date_range().unwrap_or((None, None));
            println!("─────────────────────────────────");
            println!("  Stock Insight — Database Stats");
            println!("─────────────────────────────────");
            println!("  Tickers   : {}", utils::fmt_number(tickers));
            println!("  EOD bars  : {}", utils::fmt_number(bars));
            println!("  Eval runs : {}", utils::fmt_number(runs));
            println!("  From      : {}", min.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("  To        : {}", max.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("─────────────────────────────────");
        }

        Command::Symbols => {
            let repo = Repository::open(&config.storage.db_path)?;
            let syms = repo.list_symbols()?;
            if syms.is_empty() {
                println!("No symbols — run `stock-insight add` or `load-csv` first.");
            } else {
                println!("{} symbols:", syms.len());
                for s in &syms {
                    println!("  {}", s);
                }
            }
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
