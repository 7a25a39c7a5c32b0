//! One synchronization cycle per cadence
//!
//! A cycle fetches the cadence's bulk file, streams it through the decoder and
//! transformer into the batch writer, and for catalog cycles finishes with the
//! consistency sweep. The checkpoint is not touched here; the scheduler saves
//! it once a cycle has returned successfully.

use cardex_common::types::{Cadence, ExclusionRules};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::decoder::{decode_catalog, decode_prices};
use super::fetcher::BulkFetcher;
use super::store::CatalogStore;
use super::sweep::ConsistencySweep;
use super::transform::{transform_card, transform_price};
use super::writer::{BatchWriter, InsertCatalog, UpdatePrices, WriteStats};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Per-invocation cycle options
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOptions {
    /// Reuse an already downloaded file and keep it after the cycle
    pub keep_download: bool,
}

/// Summary of a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub cadence: Cadence,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// Zero when a kept download was reused
    pub bytes_downloaded: u64,
    pub write: WriteStats,
    /// Rows removed by the consistency sweep (catalog cycles only)
    pub swept: Option<u64>,
}

impl CycleReport {
    /// Log the summary
    pub fn log(&self) {
        info!(
            cycle_id = %self.cycle_id,
            cadence = self.cadence.as_str(),
            duration_ms = self.duration.as_millis() as u64,
            bytes_downloaded = self.bytes_downloaded,
            seen = self.write.seen,
            submitted = self.write.submitted,
            persisted = self.write.persisted,
            excluded = self.write.excluded,
            skipped = self.write.skipped,
            batches = self.write.batches,
            swept = self.swept.unwrap_or(0),
            "Sync cycle complete"
        );
    }
}

/// Runs fetch/decode/write cycles against one store
pub struct SyncPipeline {
    config: SyncConfig,
    store: Arc<dyn CatalogStore>,
    fetcher: BulkFetcher,
    rules: ExclusionRules,
    writer: BatchWriter,
}

impl SyncPipeline {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn CatalogStore>,
        fetcher: BulkFetcher,
    ) -> SyncResult<Self> {
        let rules = config
            .exclusion_rules()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        let writer = BatchWriter::new(config.batch_size, config.progress_every_batches);

        Ok(Self {
            config,
            store,
            fetcher,
            rules,
            writer,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Run one cycle of `cadence`
    ///
    /// The downloaded file is removed afterwards, whether the cycle succeeded
    /// or not, unless `options.keep_download` is set.
    pub async fn run_cycle(
        &self,
        cadence: Cadence,
        started_at: DateTime<Utc>,
        options: CycleOptions,
    ) -> SyncResult<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("sync_cycle", cycle_id = %cycle_id, cadence = cadence.as_str());

        async move {
            let timer = Instant::now();
            let path = self.config.download_path(cadence);

            let bytes_downloaded = self.acquire(cadence, &path, options).await?;
            let outcome = self.process(cadence, &path).await;

            if !options.keep_download {
                remove_download(&path).await;
            }

            let (write, swept) = outcome?;

            Ok(CycleReport {
                cycle_id,
                cadence,
                started_at,
                duration: timer.elapsed(),
                bytes_downloaded,
                write,
                swept,
            })
        }
        .instrument(span)
        .await
    }

    async fn acquire(&self, cadence: Cadence, path: &Path, options: CycleOptions) -> SyncResult<u64> {
        if options.keep_download && tokio::fs::try_exists(path).await? {
            info!(path = %path.display(), "Reusing kept download");
            return Ok(0);
        }

        self.fetcher
            .fetch_to_file(self.config.source_url(cadence), path)
            .await
    }

    async fn process(&self, cadence: Cadence, path: &Path) -> SyncResult<(WriteStats, Option<u64>)> {
        let capacity = self.config.decode_buffer;

        match cadence {
            Cadence::Catalog => {
                let language = self.config.localized_language.as_str();
                let rules = &self.rules;
                let decoded = decode_catalog(path, capacity);
                let progress = decoded.progress();
                let records =
                    decoded.map(move |item| item.map(|raw| transform_card(&raw, rules, language)));

                let sink = InsertCatalog::new(self.store.clone());
                let stats = self.writer.write(records, &sink).await?;
                debug!(decoded = progress.emitted(), "Catalog file drained");

                let swept = ConsistencySweep::new(self.store.clone(), self.rules.clone())
                    .run()
                    .await?;

                Ok((stats, Some(swept)))
            }
            Cadence::Price => {
                let decoded = decode_prices(path, capacity);
                let progress = decoded.progress();
                let updates = decoded.map(|item| item.map(transform_price));

                let sink = UpdatePrices::new(self.store.clone());
                let stats = self.writer.write(updates, &sink).await?;
                debug!(decoded = progress.emitted(), "Price file drained");

                Ok((stats, None))
            }
        }
    }
}

async fn remove_download(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove download"),
    }
}
