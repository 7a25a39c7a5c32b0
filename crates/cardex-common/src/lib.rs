//! Cardex Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling and logging for the Cardex workspace.
//!
//! # Overview
//!
//! This crate holds what every Cardex component agrees on:
//!
//! - **Types**: the stored catalog row, price updates, refresh cadences and the
//!   digital-content exclusion rules that define the physical catalog
//! - **Error Handling**: the shared error type and result alias
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//!
//! # Example
//!
//! ```no_run
//! use cardex_common::types::{Cadence, ExclusionRules};
//!
//! let rules = ExclusionRules::default();
//! assert!(rules.is_excluded("A-Lightning Bolt", "Alchemy: Innistrad", false));
//!
//! let cadence: Cadence = "price".parse().unwrap();
//! assert_eq!(cadence.checkpoint_key(), "last_price_update");
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CardexError, Result};
