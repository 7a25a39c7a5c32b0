//! Cardex Server Library
//!
//! Keeps a local catalog of card metadata and market prices in sync with a
//! remote bulk-data provider.
//!
//! # Overview
//!
//! - **Ingestion**: streaming download, decode, filter and batched persistence
//!   of the provider's bulk files (`ingest`)
//! - **Scheduling**: two independent cadences (weekly catalog, daily prices)
//!   gated by checkpoints stored in the database
//! - **Database**: PostgreSQL through SQLx, schema managed by migrations
//! - **Configuration**: environment-based, with `.env` support
//!
//! # Example
//!
//! ```no_run
//! use cardex_server::{config::Config, db, ingest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::connect(&config.database).await?;
//!     db::migrate(&pool).await?;
//!
//!     let store = Arc::new(ingest::PgCatalogStore::new(pool));
//!     let fetcher = ingest::BulkFetcher::new(config.sync.http_connect_timeout())?;
//!     let scheduler = ingest::CadenceScheduler::new(config.sync, store, fetcher)?;
//!     scheduler.tick(false, None).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;

// Re-export commonly used types
pub use error::{SyncError, SyncResult};
