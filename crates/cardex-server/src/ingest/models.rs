//! Provider record shapes
//!
//! Raw structures as they appear in the bulk files, plus the admission
//! decision the transformer attaches to each of them. Unknown provider keys
//! are ignored so additive schema changes never fail a cycle.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Parent set attributes shared by every card of the set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetInfo {
    pub code: String,
    pub name: String,
    pub release_date: Option<String>,
    pub is_online_only: bool,
}

/// One set entry of the catalog file (`data.<SET>`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSet {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub is_online_only: Option<bool>,
    #[serde(default)]
    pub cards: Vec<RawCard>,
}

impl RawSet {
    /// Split into shared set info and the card list
    ///
    /// `key` is the map key the set was found under; it stands in for a
    /// missing `code`.
    pub fn into_parts(self, key: &str) -> (Arc<SetInfo>, Vec<RawCard>) {
        let info = SetInfo {
            code: self.code.unwrap_or_else(|| key.to_string()),
            name: self.name.unwrap_or_default(),
            release_date: self.release_date,
            is_online_only: self.is_online_only.unwrap_or(false),
        };
        (Arc::new(info), self.cards)
    }
}

/// One card entry of a set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCard {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub colors: Option<Vec<String>>,
    #[serde(default)]
    pub mana_cost: Option<String>,
    #[serde(default)]
    pub mana_value: Option<f64>,
    #[serde(default, rename = "type")]
    pub type_line: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub is_online_only: Option<bool>,
    #[serde(default)]
    pub original_release_date: Option<String>,
    #[serde(default)]
    pub foreign_data: Vec<RawForeignData>,
    #[serde(default)]
    pub identifiers: RawIdentifiers,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawForeignData {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIdentifiers {
    #[serde(default)]
    pub scryfall_id: Option<String>,
}

/// A card paired with its parent set, as yielded by the catalog decoder
#[derive(Debug, Clone)]
pub struct RawCatalogCard {
    pub set: Arc<SetInfo>,
    pub card: RawCard,
}

/// Dated price points, keyed by `YYYY-MM-DD`
pub type DatedPrices = BTreeMap<String, f64>;

/// `paper.<provider>.retail` price points per finish
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRetail {
    #[serde(default)]
    pub normal: Option<DatedPrices>,
    #[serde(default)]
    pub foil: Option<DatedPrices>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProviderPrices {
    #[serde(default)]
    pub retail: Option<RawRetail>,
}

/// Paper-market providers; `tcgplayer` quotes USD, `cardmarket` quotes EUR
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPaperPrices {
    #[serde(default)]
    pub tcgplayer: Option<RawProviderPrices>,
    #[serde(default)]
    pub cardmarket: Option<RawProviderPrices>,
}

/// Price formats for one card (`data.<uuid>`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPriceFormats {
    #[serde(default)]
    pub paper: Option<RawPaperPrices>,
}

/// One identifier's price blob, as yielded by the price decoder
#[derive(Debug, Clone)]
pub struct RawPriceRecord {
    pub uuid: String,
    pub formats: RawPriceFormats,
}

/// What the transformer decided for one raw record
#[derive(Debug, Clone, PartialEq)]
pub enum Admission<T> {
    /// Forward to the batch writer
    Accept(T),
    /// Digital-only content, counted as excluded
    Exclude,
    /// Nothing worth persisting (e.g. no prices at all)
    Skip,
}
