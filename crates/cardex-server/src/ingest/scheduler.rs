//! Cadence scheduler
//!
//! Decides per cadence whether a cycle is due, runs due cycles one after the
//! other and persists checkpoints. Cycle failures are contained here: they are
//! logged, reported as `CadenceOutcome::Failed` and never stop the loop.

use cardex_common::types::Cadence;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info};

use super::fetcher::BulkFetcher;
use super::pipeline::{CycleOptions, CycleReport, SyncPipeline};
use super::store::CatalogStore;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Result of one cadence invocation
#[derive(Debug)]
pub enum CadenceOutcome {
    Ran(CycleReport),
    Skipped {
        last_success: DateTime<Utc>,
        next_due: DateTime<Utc>,
    },
    Failed(SyncError),
}

impl CadenceOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CadenceOutcome::Failed(_))
    }
}

/// Freshness of one cadence
#[derive(Debug, Clone, Serialize)]
pub struct CadenceStatus {
    pub cadence: Cadence,
    pub last_success: Option<DateTime<Utc>>,
    pub threshold_secs: i64,
    pub due: bool,
}

/// A cycle is due when it never ran or its checkpoint is at least `threshold` old
pub fn is_due(
    last_success: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: chrono::Duration,
) -> bool {
    match last_success {
        None => true,
        Some(at) => now - at >= threshold,
    }
}

pub struct CadenceScheduler {
    pipeline: SyncPipeline,
    options: CycleOptions,
}

impl CadenceScheduler {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn CatalogStore>,
        fetcher: BulkFetcher,
    ) -> SyncResult<Self> {
        Ok(Self {
            pipeline: SyncPipeline::new(config, store, fetcher)?,
            options: CycleOptions::default(),
        })
    }

    pub fn with_options(mut self, options: CycleOptions) -> Self {
        self.options = options;
        self
    }

    fn config(&self) -> &SyncConfig {
        self.pipeline.config()
    }

    fn store(&self) -> &Arc<dyn CatalogStore> {
        self.pipeline.store()
    }

    /// Run `cadence` if it is due (or `force`), saving the checkpoint on success
    ///
    /// `now` is the cycle's start time and becomes its checkpoint.
    pub async fn run_cadence(&self, cadence: Cadence, force: bool, now: DateTime<Utc>) -> CadenceOutcome {
        match self.try_run_cadence(cadence, force, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    cadence = cadence.as_str(),
                    error_kind = e.kind(),
                    error = %e,
                    "Sync cycle failed, checkpoint left unchanged"
                );
                CadenceOutcome::Failed(e)
            }
        }
    }

    async fn try_run_cadence(
        &self,
        cadence: Cadence,
        force: bool,
        now: DateTime<Utc>,
    ) -> SyncResult<CadenceOutcome> {
        let threshold = self.config().threshold(cadence);
        let last_success = self.store().checkpoint(cadence).await?;

        match last_success {
            Some(at) if !force && !is_due(last_success, now, threshold) => {
                let next_due = at + threshold;
                info!(
                    cadence = cadence.as_str(),
                    last_success = %at,
                    next_due = %next_due,
                    "Sync not due, skipping"
                );
                return Ok(CadenceOutcome::Skipped {
                    last_success: at,
                    next_due,
                });
            }
            _ => {}
        }

        let reason = if force {
            "forced"
        } else if last_success.is_none() {
            "never_run"
        } else {
            "stale"
        };
        info!(cadence = cadence.as_str(), reason, "Starting sync cycle");

        let report = self.pipeline.run_cycle(cadence, now, self.options).await?;
        // Start time, not completion: a long cycle must not push the next one back
        self.store().save_checkpoint(cadence, now).await?;
        report.log();

        Ok(CadenceOutcome::Ran(report))
    }

    /// Run every selected cadence once, catalog before price
    pub async fn tick(&self, force: bool, only: Option<Cadence>) -> Vec<(Cadence, CadenceOutcome)> {
        let mut outcomes = Vec::with_capacity(Cadence::ALL.len());

        for cadence in Cadence::ALL {
            if only.is_some_and(|selected| selected != cadence) {
                continue;
            }
            let outcome = self.run_cadence(cadence, force, Utc::now()).await;
            outcomes.push((cadence, outcome));
        }

        outcomes
    }

    /// Checkpoint and due state of every cadence
    pub async fn status(&self, now: DateTime<Utc>) -> SyncResult<Vec<CadenceStatus>> {
        let mut statuses = Vec::with_capacity(Cadence::ALL.len());

        for cadence in Cadence::ALL {
            let threshold = self.config().threshold(cadence);
            let last_success = self.store().checkpoint(cadence).await?;
            statuses.push(CadenceStatus {
                cadence,
                last_success,
                threshold_secs: threshold.num_seconds(),
                due: is_due(last_success, now, threshold),
            });
        }

        Ok(statuses)
    }

    /// Spawn the periodic loop
    ///
    /// Waits the startup delay, ticks immediately, then once per tick
    /// interval. Shutdown is observed between ticks; a running cycle is
    /// never interrupted.
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let startup_delay = self.config().startup_delay();
            let tick_interval = self.config().tick_interval();

            info!(
                startup_delay_secs = startup_delay.as_secs(),
                tick_interval_secs = tick_interval.as_secs(),
                "Sync scheduler started"
            );

            tokio::select! {
                _ = sleep(startup_delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Sync scheduler stopped before first tick");
                    return;
                }
            }

            let mut ticker = interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown) => {
                        info!("Sync scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let outcomes = self.tick(false, None).await;
                        let failed = outcomes.iter().filter(|(_, o)| o.is_failed()).count();
                        info!(cadences = outcomes.len(), failed, "Sync tick complete");
                    }
                }
            }
        })
    }
}

/// Resolves once shutdown is signalled or the sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::store::MemoryStore;
    use chrono::Duration;
    use tempfile::TempDir;

    fn scheduler(store: Arc<MemoryStore>, dir: &TempDir) -> CadenceScheduler {
        let config = SyncConfig {
            // Nothing listens here; a due cycle fails at fetch time
            catalog_url: "http://127.0.0.1:1/AllPrintings.json.gz".to_string(),
            price_url: "http://127.0.0.1:1/AllPricesToday.json.gz".to_string(),
            data_dir: dir.path().to_path_buf(),
            ..SyncConfig::default()
        };
        CadenceScheduler::new(config, store, BulkFetcher::with_client(reqwest::Client::new()))
            .unwrap()
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let week = Duration::days(7);

        assert!(is_due(None, now, week));
        assert!(!is_due(Some(now - Duration::hours(2)), now, week));
        assert!(is_due(Some(now - Duration::days(7)), now, week));
        assert!(is_due(Some(now - Duration::days(8)), now, week));
    }

    #[tokio::test]
    async fn test_fresh_checkpoint_skips() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let last = now - Duration::hours(2);
        store.save_checkpoint(Cadence::Catalog, last).await.unwrap();

        let outcome = scheduler(store, &dir).run_cadence(Cadence::Catalog, false, now).await;

        match outcome {
            CadenceOutcome::Skipped { last_success, next_due } => {
                assert_eq!(last_success, last);
                assert_eq!(next_due, last + Duration::days(7));
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_leaves_checkpoint_and_other_cadence_runs() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let last = Utc::now() - Duration::days(30);
        store.save_checkpoint(Cadence::Catalog, last).await.unwrap();

        let outcomes = scheduler(store.clone(), &dir).tick(false, None).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, Cadence::Catalog);
        assert_eq!(outcomes[1].0, Cadence::Price);
        assert!(outcomes.iter().all(|(_, o)| o.is_failed()));
        assert_eq!(store.checkpoint(Cadence::Catalog).await.unwrap(), Some(last));
        assert_eq!(store.checkpoint(Cadence::Price).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_only_restricts_tick() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());

        let outcomes = scheduler(store, &dir).tick(false, Some(Cadence::Price)).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, Cadence::Price);
    }

    #[tokio::test]
    async fn test_status_reports_due() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.save_checkpoint(Cadence::Price, now - Duration::hours(1)).await.unwrap();

        let statuses = scheduler(store, &dir).status(now).await.unwrap();

        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].due);
        assert_eq!(statuses[0].last_success, None);
        assert!(!statuses[1].due);
        assert_eq!(statuses[1].threshold_secs, 24 * 60 * 60);
    }

    #[tokio::test]
    async fn test_start_stops_on_shutdown_before_first_tick() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = watch::channel(false);

        let handle = Arc::new(scheduler(store.clone(), &dir)).start(rx);
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(store.checkpoint(Cadence::Catalog).await.unwrap(), None);
        assert!(store.batch_sizes().is_empty());
    }
}
