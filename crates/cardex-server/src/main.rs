//! Cardex Server - background sync daemon

use anyhow::Result;
use cardex_common::logging::{init_logging, LogConfig};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use cardex_server::{config::Config, db, ingest};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("cardex-server")
        .filter_directives("cardex_server=debug,sqlx=warn,reqwest=info")
        .build();
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _log_guard = init_logging(&log_config)?;

    info!("Starting Cardex Server");

    let config = Config::load()?;
    info!(
        catalog_url = %config.sync.catalog_url,
        price_url = %config.sync.price_url,
        data_dir = %config.sync.data_dir.display(),
        "Configuration loaded"
    );

    let pool = db::connect(&config.database).await?;
    db::health_check(&pool).await?;
    db::migrate(&pool).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_handle = if config.sync.enabled {
        let store = Arc::new(ingest::PgCatalogStore::new(pool.clone()));
        let fetcher = ingest::BulkFetcher::new(config.sync.http_connect_timeout())?;
        let scheduler = ingest::CadenceScheduler::new(config.sync.clone(), store, fetcher)?;

        info!("Sync is enabled, starting scheduler");
        Some(Arc::new(scheduler).start(shutdown_rx))
    } else {
        info!("Sync is disabled (CARDEX_SYNC_ENABLED=false)");
        None
    };

    shutdown_signal().await;

    // Receiver may already be gone if the scheduler task ended
    let _ = shutdown_tx.send(true);

    if let Some(handle) = scheduler_handle {
        info!("Waiting for the running sync tick to finish");
        if let Err(e) = handle.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
    }

    pool.close().await;
    info!("Cardex Server shut down gracefully");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
