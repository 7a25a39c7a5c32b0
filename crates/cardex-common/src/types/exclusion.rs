//! Digital-content exclusion rules
//!
//! The physical catalog must never expose cards that only exist in an
//! online product. The same predicate decides what the ingest filter drops
//! and what the post-refresh sweep deletes, so both live here.

use serde::{Deserialize, Serialize};

use crate::error::{CardexError, Result};

/// Set-name substrings marking digital-only product lines (case-insensitive)
///
/// Arena entries name the client's own products; a bare "arena" would also
/// hit the paper Arena League promos.
pub const DEFAULT_SET_DENYLIST: &[&str] = &[
    "alchemy",
    "mtg arena",
    "arena base set",
    "arena beginner set",
    "arena new player",
    "mtgo",
    "magic online",
    "treasure chest",
];

/// Name prefixes carried by digital rebalanced variants
pub const DEFAULT_DIGITAL_PREFIXES: &[&str] = &["A-"];

/// Predicate deciding whether a card belongs to the physical catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRules {
    /// Lowercased set-name substrings
    set_denylist: Vec<String>,
    /// Name prefixes, matched case-sensitively
    digital_prefixes: Vec<String>,
}

impl ExclusionRules {
    /// Build rules from raw lists, trimming entries and dropping blanks
    ///
    /// At least one rule must remain; an empty rule set would silently admit
    /// every digital card.
    pub fn new<S: AsRef<str>>(set_denylist: &[S], digital_prefixes: &[S]) -> Result<Self> {
        let set_denylist: Vec<String> = set_denylist
            .iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        let digital_prefixes: Vec<String> = digital_prefixes
            .iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if set_denylist.is_empty() && digital_prefixes.is_empty() {
            return Err(CardexError::Config(
                "exclusion rules need at least one set substring or name prefix".to_string(),
            ));
        }

        Ok(Self {
            set_denylist,
            digital_prefixes,
        })
    }

    pub fn set_denylist(&self) -> &[String] {
        &self.set_denylist
    }

    pub fn digital_prefixes(&self) -> &[String] {
        &self.digital_prefixes
    }

    /// Whether the set name contains any denylisted substring
    pub fn is_denylisted_set(&self, set_name: &str) -> bool {
        let lowered = set_name.to_lowercase();
        self.set_denylist.iter().any(|needle| lowered.contains(needle.as_str()))
    }

    /// Whether the card name carries a digital-variant prefix
    pub fn has_digital_prefix(&self, name: &str) -> bool {
        self.digital_prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Full exclusion predicate
    ///
    /// `online_only` is the union of the card's and its set's online-only flags.
    pub fn is_excluded(&self, name: &str, set_name: &str, online_only: bool) -> bool {
        online_only || self.is_denylisted_set(set_name) || self.has_digital_prefix(name)
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            set_denylist: DEFAULT_SET_DENYLIST.iter().map(|s| s.to_string()).collect(),
            digital_prefixes: DEFAULT_DIGITAL_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}
