//! Catalog persistence
//!
//! `CatalogStore` is the only seam between the ingestion pipeline and the
//! database. Components receive it as `Arc<dyn CatalogStore>`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgCatalogStore;

use async_trait::async_trait;
use cardex_common::types::{Cadence, CatalogRecord, ExclusionRules, PriceUpdate};
use chrono::{DateTime, Utc};

use crate::error::SyncResult;

/// Storage backend for catalog rows and update checkpoints
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert new rows, leaving rows whose `uuid` already exists untouched
    ///
    /// Returns the number of rows actually inserted.
    async fn insert_cards(&self, batch: &[CatalogRecord]) -> SyncResult<u64>;

    /// Apply price updates keyed by `uuid` in a single transaction
    ///
    /// Absent prices never overwrite stored ones. Returns the number of rows
    /// that matched an identifier.
    async fn update_prices(&self, batch: &[PriceUpdate]) -> SyncResult<u64>;

    /// Delete every row the rules exclude, plus rows flagged online-only
    async fn delete_excluded(&self, rules: &ExclusionRules) -> SyncResult<u64>;

    /// Last successful cycle start for `cadence`, `None` if it never ran
    async fn checkpoint(&self, cadence: Cadence) -> SyncResult<Option<DateTime<Utc>>>;

    /// Upsert the checkpoint for `cadence`
    async fn save_checkpoint(&self, cadence: Cadence, at: DateTime<Utc>) -> SyncResult<()>;

    /// Number of catalog rows
    async fn card_count(&self) -> SyncResult<u64>;
}
