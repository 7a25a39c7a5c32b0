//! Batched persistence with backpressure
//!
//! The writer pulls admissions one at a time and only pulls again once the
//! current batch has room. While a batch is being persisted nothing is pulled,
//! so the decoder behind the stream fills its channel and blocks. Memory stays
//! bounded by one batch plus the decoder's channel capacity.

use async_trait::async_trait;
use cardex_common::types::{CatalogRecord, PriceUpdate};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::Admission;
use super::store::CatalogStore;
use crate::error::SyncResult;

/// Destination of full batches
#[async_trait]
pub trait BatchSink<T: Sync>: Send + Sync {
    /// Short name used in log lines
    fn label(&self) -> &'static str;

    /// Persist one batch, returning the number of rows affected
    async fn persist(&self, batch: &[T]) -> SyncResult<u64>;
}

/// Catalog cycle sink: skip-on-conflict bulk inserts
pub struct InsertCatalog {
    store: Arc<dyn CatalogStore>,
}

impl InsertCatalog {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchSink<CatalogRecord> for InsertCatalog {
    fn label(&self) -> &'static str {
        "insert_catalog"
    }

    async fn persist(&self, batch: &[CatalogRecord]) -> SyncResult<u64> {
        self.store.insert_cards(batch).await
    }
}

/// Price cycle sink: one transaction of coalescing updates per batch
pub struct UpdatePrices {
    store: Arc<dyn CatalogStore>,
}

impl UpdatePrices {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchSink<PriceUpdate> for UpdatePrices {
    fn label(&self) -> &'static str {
        "update_prices"
    }

    async fn persist(&self, batch: &[PriceUpdate]) -> SyncResult<u64> {
        self.store.update_prices(batch).await
    }
}

/// Counters of one write pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    /// Records pulled from the stream
    pub seen: u64,
    /// Records handed to the sink
    pub submitted: u64,
    /// Rows the sink reported as affected
    pub persisted: u64,
    /// Records dropped by the digital-content filter
    pub excluded: u64,
    /// Records with nothing to persist
    pub skipped: u64,
    pub batches: u64,
    /// Largest number of accepted records held at once
    pub peak_buffered: usize,
}

#[derive(Debug, Clone)]
pub struct BatchWriter {
    batch_size: usize,
    progress_every: u64,
}

impl BatchWriter {
    /// `progress_every` is the number of batches between progress log lines;
    /// zero disables them.
    pub fn new(batch_size: usize, progress_every: u64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            progress_every,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Drain `stream` into `sink`
    ///
    /// The first error, from the stream or the sink, ends the pass and drops
    /// the stream. Batches persisted before it stay persisted.
    pub async fn write<T, S, K>(&self, stream: S, sink: &K) -> SyncResult<WriteStats>
    where
        T: Send + Sync,
        S: Stream<Item = SyncResult<Admission<T>>> + Send,
        K: BatchSink<T> + ?Sized,
    {
        futures::pin_mut!(stream);

        let mut stats = WriteStats::default();
        let mut buffer: Vec<T> = Vec::with_capacity(self.batch_size);

        let outcome = async {
            while let Some(item) = stream.next().await {
                let admission = item?;
                stats.seen += 1;

                match admission {
                    Admission::Accept(record) => {
                        buffer.push(record);
                        stats.peak_buffered = stats.peak_buffered.max(buffer.len());
                        if buffer.len() >= self.batch_size {
                            self.flush(&mut buffer, sink, &mut stats).await?;
                        }
                    }
                    Admission::Exclude => stats.excluded += 1,
                    Admission::Skip => stats.skipped += 1,
                }
            }

            if !buffer.is_empty() {
                self.flush(&mut buffer, sink, &mut stats).await?;
            }
            SyncResult::Ok(())
        }
        .await;

        if let Err(e) = outcome {
            warn!(
                sink = sink.label(),
                error = %e,
                seen = stats.seen,
                persisted = stats.persisted,
                batches = stats.batches,
                "Write pass aborted"
            );
            return Err(e);
        }

        Ok(stats)
    }

    async fn flush<T, K>(&self, buffer: &mut Vec<T>, sink: &K, stats: &mut WriteStats) -> SyncResult<()>
    where
        T: Send + Sync,
        K: BatchSink<T> + ?Sized,
    {
        let persisted = sink.persist(buffer).await?;

        stats.batches += 1;
        stats.submitted += buffer.len() as u64;
        stats.persisted += persisted;
        buffer.clear();

        if self.progress_every > 0 && stats.batches % self.progress_every == 0 {
            info!(
                sink = sink.label(),
                batches = stats.batches,
                seen = stats.seen,
                persisted = stats.persisted,
                excluded = stats.excluded,
                "Write progress"
            );
        }

        Ok(())
    }
}
