//! Cardex Sync - manual catalog/price synchronization

use anyhow::{bail, Result};
use cardex_common::logging::{init_logging, LogConfig, LogLevel};
use cardex_common::types::Cadence;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use cardex_server::{
    config::Config,
    db,
    ingest::{self, CadenceOutcome, CycleOptions},
};

#[derive(Parser, Debug)]
#[command(name = "cardex-sync")]
#[command(author, version, about = "Run or inspect catalog and price synchronization")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sync tick now
    Run {
        /// Run even if the checkpoint is fresh
        #[arg(long)]
        force: bool,

        /// Restrict the tick to one cadence (catalog or price)
        #[arg(long)]
        only: Option<Cadence>,

        /// Reuse an existing download and keep it afterwards
        #[arg(long)]
        keep_download: bool,
    },

    /// Show checkpoints and whether each cadence is due
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("cardex-sync")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _log_guard = init_logging(&log_config)?;

    let config = Config::load()?;
    let pool = db::connect(&config.database).await?;
    db::migrate(&pool).await?;

    let store = Arc::new(ingest::PgCatalogStore::new(pool.clone()));
    let fetcher = ingest::BulkFetcher::new(config.sync.http_connect_timeout())?;

    match cli.command {
        Command::Run {
            force,
            only,
            keep_download,
        } => {
            let scheduler = ingest::CadenceScheduler::new(config.sync, store, fetcher)?
                .with_options(CycleOptions { keep_download });

            info!(force, only = ?only, keep_download, "Running manual sync");
            let outcomes = scheduler.tick(force, only).await;

            let mut failed = 0;
            for (cadence, outcome) in &outcomes {
                match outcome {
                    CadenceOutcome::Ran(report) => println!(
                        "{:<8} ran      persisted={} excluded={} skipped={} swept={} in {:.1}s",
                        cadence.as_str(),
                        report.write.persisted,
                        report.write.excluded,
                        report.write.skipped,
                        report.swept.unwrap_or(0),
                        report.duration.as_secs_f64()
                    ),
                    CadenceOutcome::Skipped { next_due, .. } => println!(
                        "{:<8} skipped  next due {}",
                        cadence.as_str(),
                        next_due.to_rfc3339()
                    ),
                    CadenceOutcome::Failed(e) => {
                        failed += 1;
                        println!("{:<8} failed   {}: {}", cadence.as_str(), e.kind(), e);
                    }
                }
            }

            pool.close().await;
            if failed > 0 {
                bail!("{} cadence(s) failed", failed);
            }
        }
        Command::Status { json } => {
            let scheduler = ingest::CadenceScheduler::new(config.sync, store, fetcher)?;
            let statuses = scheduler.status(Utc::now()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                for status in &statuses {
                    let last = status
                        .last_success
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string());
                    println!(
                        "{:<8} last_success={} threshold={}s due={}",
                        status.cadence.as_str(),
                        last,
                        status.threshold_secs,
                        status.due
                    );
                }
            }

            pool.close().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from(["cardex-sync", "run", "--force", "--only", "price"]).unwrap();
        match cli.command {
            Command::Run {
                force,
                only,
                keep_download,
            } => {
                assert!(force);
                assert_eq!(only, Some(Cadence::Price));
                assert!(!keep_download);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_cadence_is_rejected() {
        assert!(Cli::try_parse_from(["cardex-sync", "run", "--only", "decks"]).is_err());
    }
}
