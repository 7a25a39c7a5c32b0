//! Post-catalog consistency sweep

use cardex_common::types::ExclusionRules;
use std::sync::Arc;
use tracing::info;

use super::store::CatalogStore;
use crate::error::SyncResult;

/// Removes stored rows that the digital-content filter would reject
///
/// Catches rows inserted before a rule existed or by an older filter. Runs
/// after every successful catalog cycle; running it twice removes nothing
/// the second time.
pub struct ConsistencySweep {
    store: Arc<dyn CatalogStore>,
    rules: ExclusionRules,
}

impl ConsistencySweep {
    pub fn new(store: Arc<dyn CatalogStore>, rules: ExclusionRules) -> Self {
        Self { store, rules }
    }

    /// Delete excluded rows and return how many were removed
    pub async fn run(&self) -> SyncResult<u64> {
        let removed = self.store.delete_excluded(&self.rules).await?;
        info!(removed, "Consistency sweep complete");
        Ok(removed)
    }
}
