//! Refresh cadences and their checkpoint keys

use serde::{Deserialize, Serialize};

use crate::error::CardexError;

/// An independently scheduled refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// Card metadata refresh (weekly by default)
    Catalog,
    /// Market price refresh (daily by default)
    Price,
}

impl Cadence {
    /// Every cadence, in the order a scheduler tick runs them
    pub const ALL: [Cadence; 2] = [Cadence::Catalog, Cadence::Price];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Catalog => "catalog",
            Cadence::Price => "price",
        }
    }

    /// Key of this cadence's checkpoint row in the settings store
    pub fn checkpoint_key(&self) -> &'static str {
        match self {
            Cadence::Catalog => "last_catalog_update",
            Cadence::Price => "last_price_update",
        }
    }
}

impl std::str::FromStr for Cadence {
    type Err = CardexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "catalog" | "cards" => Ok(Cadence::Catalog),
            "price" | "prices" => Ok(Cadence::Price),
            other => Err(CardexError::UnknownCadence(other.to_string())),
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
