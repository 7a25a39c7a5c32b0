//! Common types used across Cardex

mod cadence;
mod card;
mod exclusion;

pub use cadence::Cadence;
pub use card::{parse_release_date, CatalogRecord, PriceUpdate};
pub use exclusion::{ExclusionRules, DEFAULT_DIGITAL_PREFIXES, DEFAULT_SET_DENYLIST};
