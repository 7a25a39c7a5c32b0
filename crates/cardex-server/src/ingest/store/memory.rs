//! In-memory catalog store
//!
//! Mirrors the Postgres semantics (skip-on-conflict inserts, coalescing price
//! updates, all-or-nothing price batches) without a database. Slow writes and
//! failing batches can be injected to exercise the pipeline's error paths.

use async_trait::async_trait;
use cardex_common::types::{Cadence, CatalogRecord, ExclusionRules, PriceUpdate};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::CatalogStore;
use crate::error::{SyncError, SyncResult};

#[derive(Default)]
struct MemoryState {
    cards: BTreeMap<String, CatalogRecord>,
    checkpoints: HashMap<Cadence, DateTime<Utc>>,
    batch_sizes: Vec<usize>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    write_delay: Option<Duration>,
    fail_on_batch: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before every write batch
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Fail the `n`th write batch (1-based, counted across inserts and updates)
    pub fn failing_on_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    /// Put a row in place as if an earlier cycle had stored it
    pub fn seed(&self, record: CatalogRecord) {
        self.lock().cards.insert(record.uuid.clone(), record);
    }

    pub fn card(&self, uuid: &str) -> Option<CatalogRecord> {
        self.lock().cards.get(uuid).cloned()
    }

    /// All rows, ordered by `uuid`
    pub fn cards(&self) -> Vec<CatalogRecord> {
        self.lock().cards.values().cloned().collect()
    }

    /// Sizes of every write batch received so far, failed ones included
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn begin_batch(&self, size: usize) -> SyncResult<()> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.batch_sizes.push(size);
        if self.fail_on_batch == Some(state.batch_sizes.len()) {
            return Err(SyncError::Persistence(format!(
                "injected failure on batch {}",
                state.batch_sizes.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_cards(&self, batch: &[CatalogRecord]) -> SyncResult<u64> {
        self.begin_batch(batch.len()).await?;

        let mut state = self.lock();
        let mut inserted = 0u64;
        for record in batch {
            if !state.cards.contains_key(&record.uuid) {
                state.cards.insert(record.uuid.clone(), record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn update_prices(&self, batch: &[PriceUpdate]) -> SyncResult<u64> {
        self.begin_batch(batch.len()).await?;

        let mut state = self.lock();
        let mut matched = 0u64;
        for update in batch {
            for card in state.cards.values_mut().filter(|card| update.targets(card)) {
                update.apply_to(card);
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn delete_excluded(&self, rules: &ExclusionRules) -> SyncResult<u64> {
        let mut state = self.lock();
        let before = state.cards.len();
        state
            .cards
            .retain(|_, card| !rules.is_excluded(&card.name, &card.set_name, card.is_online_only));
        Ok((before - state.cards.len()) as u64)
    }

    async fn checkpoint(&self, cadence: Cadence) -> SyncResult<Option<DateTime<Utc>>> {
        Ok(self.lock().checkpoints.get(&cadence).copied())
    }

    async fn save_checkpoint(&self, cadence: Cadence, at: DateTime<Utc>) -> SyncResult<()> {
        self.lock().checkpoints.insert(cadence, at);
        Ok(())
    }

    async fn card_count(&self) -> SyncResult<u64> {
        Ok(self.lock().cards.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(uuid: &str, name: &str) -> CatalogRecord {
        CatalogRecord {
            uuid: uuid.to_string(),
            name: name.to_string(),
            localized_name: None,
            set_code: "TST".to_string(),
            set_name: "Test Set".to_string(),
            rarity: "common".to_string(),
            colors: vec![],
            mana_cost: None,
            mana_value: 0.0,
            type_line: "Creature".to_string(),
            text: None,
            scryfall_id: None,
            collector_number: "1".to_string(),
            is_online_only: false,
            release_date: None,
            price_usd: None,
            price_usd_foil: None,
            price_eur: None,
            price_eur_foil: None,
        }
    }

    #[tokio::test]
    async fn test_insert_skips_existing_rows() {
        let store = MemoryStore::new();
        let mut original = record("u-1", "Test Bolt");
        original.rarity = "rare".to_string();
        store.seed(original);

        let inserted = store
            .insert_cards(&[record("u-1", "Renamed Bolt"), record("u-2", "Test Bear")])
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(store.card("u-1").unwrap().name, "Test Bolt");
        assert_eq!(store.card_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_rows_untouched() {
        let store = MemoryStore::new().failing_on_batch(2);

        store.insert_cards(&[record("u-1", "Test Bolt")]).await.unwrap();
        let err = store.insert_cards(&[record("u-2", "Test Bear")]).await.unwrap_err();

        assert_eq!(err.kind(), "persistence");
        assert_eq!(store.card_count().await.unwrap(), 1);
        assert_eq!(store.batch_sizes(), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_price_update_matches_scryfall_id() {
        let store = MemoryStore::new();
        let mut bolt = record("u-1", "Test Bolt");
        bolt.scryfall_id = Some("sf-bolt".to_string());
        store.seed(bolt);
        store.seed(record("u-2", "Test Bear"));

        let matched = store
            .update_prices(&[
                PriceUpdate {
                    uuid: "sf-bolt".to_string(),
                    usd: Some(0.5),
                    usd_foil: None,
                    eur: None,
                    eur_foil: None,
                },
                PriceUpdate {
                    uuid: "u-2".to_string(),
                    usd: None,
                    usd_foil: None,
                    eur: Some(0.3),
                    eur_foil: None,
                },
            ])
            .await
            .unwrap();

        assert_eq!(matched, 2);
        assert_eq!(store.card("u-1").unwrap().price_usd, Some(0.5));
        assert_eq!(store.card("u-2").unwrap().price_eur, Some(0.3));
    }

    #[tokio::test]
    async fn test_delete_excluded_matches_rules() {
        let store = MemoryStore::new();
        store.seed(record("u-1", "Test Bolt"));
        store.seed(record("u-2", "A-Test Bolt"));
        let mut arena = record("u-3", "Test Bear");
        arena.set_name = "Arena Base Set".to_string();
        store.seed(arena);

        let removed = store.delete_excluded(&ExclusionRules::default()).await.unwrap();

        assert_eq!(removed, 2);
        assert!(store.card("u-1").is_some());
    }

    #[tokio::test]
    async fn test_checkpoints_are_per_cadence() {
        let store = MemoryStore::new();
        let at = Utc::now();

        store.save_checkpoint(Cadence::Price, at).await.unwrap();

        assert_eq!(store.checkpoint(Cadence::Price).await.unwrap(), Some(at));
        assert_eq!(store.checkpoint(Cadence::Catalog).await.unwrap(), None);
    }
}
