//! Catalog rows and price updates

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CardexError, Result};

/// One printed (or digital) variant of a card, as stored in the catalog
///
/// `uuid` is the provider-assigned natural identifier and is unique across
/// the catalog. Required attributes are never absent: missing source values
/// are normalized to empty strings, empty sets or zero before a record is
/// built. The four price columns are independently nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub uuid: String,
    pub name: String,
    pub localized_name: Option<String>,
    pub set_code: String,
    pub set_name: String,
    pub rarity: String,
    pub colors: Vec<String>,
    pub mana_cost: Option<String>,
    pub mana_value: f64,
    pub type_line: String,
    pub text: Option<String>,
    /// External image reference (Scryfall id)
    pub scryfall_id: Option<String>,
    pub collector_number: String,
    /// Set when the card only exists in a digital product
    pub is_online_only: bool,
    pub release_date: Option<NaiveDate>,
    pub price_usd: Option<f64>,
    pub price_usd_foil: Option<f64>,
    pub price_eur: Option<f64>,
    pub price_eur_foil: Option<f64>,
}

/// Latest market prices for one card
///
/// A `None` field means the source had no value for it. Applying an update
/// never clears a stored price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Price-file key: the card's natural identifier or its `scryfall_id`
    pub uuid: String,
    pub usd: Option<f64>,
    pub usd_foil: Option<f64>,
    pub eur: Option<f64>,
    pub eur_foil: Option<f64>,
}

impl PriceUpdate {
    /// Whether at least one of the four prices is present
    pub fn has_any(&self) -> bool {
        self.usd.is_some() || self.usd_foil.is_some() || self.eur.is_some() || self.eur_foil.is_some()
    }

    /// Whether this update belongs to `record`
    pub fn targets(&self, record: &CatalogRecord) -> bool {
        record.uuid == self.uuid || record.scryfall_id.as_deref() == Some(self.uuid.as_str())
    }

    /// Apply this update to a stored record, keeping fields the update lacks
    pub fn apply_to(&self, record: &mut CatalogRecord) {
        if let Some(v) = self.usd {
            record.price_usd = Some(v);
        }
        if let Some(v) = self.usd_foil {
            record.price_usd_foil = Some(v);
        }
        if let Some(v) = self.eur {
            record.price_eur = Some(v);
        }
        if let Some(v) = self.eur_foil {
            record.price_eur_foil = Some(v);
        }
    }
}

/// Parse a provider release date (`YYYY-MM-DD`)
pub fn parse_release_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| CardexError::InvalidDate(format!("{}: {}", value, e)))
}
