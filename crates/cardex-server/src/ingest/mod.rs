//! Catalog and price ingestion
//!
//! # Architecture
//!
//! - **fetcher**: streams a bulk file from the provider to the data directory
//! - **decoder**: gzip + incremental JSON decoding into a bounded record stream
//! - **transform**: normalization and the digital-content filter
//! - **writer**: batch accumulation with backpressure against the decoder
//! - **store**: persistence seam (`CatalogStore`), Postgres and in-memory backends
//! - **sweep**: post-catalog removal of rows that should have been excluded
//! - **pipeline**: one fetch/decode/write cycle per cadence
//! - **scheduler**: freshness gating, the periodic tick and sync status
//!
//! Control flow of a cycle: scheduler -> fetcher -> decoder -> transform ->
//! writer -> (catalog only) sweep -> scheduler saves the checkpoint.

pub mod decoder;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod sweep;
pub mod transform;
pub mod writer;

pub use decoder::{decode_catalog, decode_prices, DecodeProgress, RecordStream};
pub use fetcher::BulkFetcher;
pub use models::{Admission, RawCatalogCard, RawPriceRecord};
pub use pipeline::{CycleOptions, CycleReport, SyncPipeline};
pub use scheduler::{CadenceOutcome, CadenceScheduler, CadenceStatus};
pub use store::{CatalogStore, MemoryStore, PgCatalogStore};
pub use sweep::ConsistencySweep;
pub use transform::{transform_card, transform_price};
pub use writer::{BatchSink, BatchWriter, InsertCatalog, UpdatePrices, WriteStats};
