//! PostgreSQL catalog store

use async_trait::async_trait;
use cardex_common::types::{Cadence, CatalogRecord, ExclusionRules, PriceUpdate};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, warn};

use super::CatalogStore;
use crate::error::SyncResult;

/// Bind parameters per inserted row
const INSERT_COLUMNS: usize = 19;

/// Postgres caps a statement at 65535 bind parameters
const MAX_ROWS_PER_INSERT: usize = u16::MAX as usize / INSERT_COLUMNS;

/// `CatalogStore` backed by the `catalog_cards` and `settings` tables
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn insert_cards(&self, batch: &[CatalogRecord]) -> SyncResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for chunk in batch.chunks(MAX_ROWS_PER_INSERT) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"
                INSERT INTO catalog_cards (
                    uuid, name, localized_name, set_code, set_name, rarity, colors,
                    mana_cost, mana_value, type_line, text, scryfall_id, collector_number,
                    is_online_only, release_date,
                    price_usd, price_usd_foil, price_eur, price_eur_foil
                )
                "#,
            );

            query_builder.push_values(chunk.iter(), |mut b, record| {
                b.push_bind(&record.uuid)
                    .push_bind(&record.name)
                    .push_bind(&record.localized_name)
                    .push_bind(&record.set_code)
                    .push_bind(&record.set_name)
                    .push_bind(&record.rarity)
                    .push_bind(&record.colors)
                    .push_bind(&record.mana_cost)
                    .push_bind(record.mana_value)
                    .push_bind(&record.type_line)
                    .push_bind(&record.text)
                    .push_bind(&record.scryfall_id)
                    .push_bind(&record.collector_number)
                    .push_bind(record.is_online_only)
                    .push_bind(record.release_date)
                    .push_bind(record.price_usd)
                    .push_bind(record.price_usd_foil)
                    .push_bind(record.price_eur)
                    .push_bind(record.price_eur_foil);
            });
            query_builder.push(" ON CONFLICT (uuid) DO NOTHING");

            let result = query_builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        debug!(submitted = batch.len(), inserted, "Inserted catalog batch");
        Ok(inserted)
    }

    async fn update_prices(&self, batch: &[PriceUpdate]) -> SyncResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut matched = 0u64;

        for update in batch {
            let result = sqlx::query(
                r#"
                UPDATE catalog_cards SET
                    price_usd = COALESCE($2, price_usd),
                    price_usd_foil = COALESCE($3, price_usd_foil),
                    price_eur = COALESCE($4, price_eur),
                    price_eur_foil = COALESCE($5, price_eur_foil),
                    updated_at = NOW()
                WHERE uuid = $1 OR scryfall_id = $1
                "#,
            )
            .bind(&update.uuid)
            .bind(update.usd)
            .bind(update.usd_foil)
            .bind(update.eur)
            .bind(update.eur_foil)
            .execute(&mut *tx)
            .await?;

            matched += result.rows_affected();
        }

        tx.commit().await?;

        debug!(submitted = batch.len(), matched, "Applied price batch");
        Ok(matched)
    }

    async fn delete_excluded(&self, rules: &ExclusionRules) -> SyncResult<u64> {
        let set_patterns: Vec<String> = rules
            .set_denylist()
            .iter()
            .map(|needle| format!("%{}%", escape_like(needle)))
            .collect();
        let name_patterns: Vec<String> = rules
            .digital_prefixes()
            .iter()
            .map(|prefix| format!("{}%", escape_like(prefix)))
            .collect();

        let result = sqlx::query(
            r#"
            DELETE FROM catalog_cards
            WHERE is_online_only
               OR set_name ILIKE ANY($1)
               OR name LIKE ANY($2)
            "#,
        )
        .bind(&set_patterns)
        .bind(&name_patterns)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn checkpoint(&self, cadence: Cadence) -> SyncResult<Option<DateTime<Utc>>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
                .bind(cadence.checkpoint_key())
                .fetch_optional(&self.pool)
                .await?;

        let Some(value) = value else {
            return Ok(None);
        };

        match DateTime::parse_from_rfc3339(&value) {
            Ok(at) => Ok(Some(at.with_timezone(&Utc))),
            Err(e) => {
                warn!(
                    key = cadence.checkpoint_key(),
                    value = %value,
                    error = %e,
                    "Unreadable checkpoint, treating cadence as never run"
                );
                Ok(None)
            }
        }
    }

    async fn save_checkpoint(&self, cadence: Cadence, at: DateTime<Utc>) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(cadence.checkpoint_key())
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn card_count(&self) -> SyncResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_cards")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

/// Escape `LIKE` metacharacters (backslash is the default escape)
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
