//! Shared helpers for the sync integration tests
//!
//! - gzip bulk-file fixtures built from small JSON documents
//! - a `SyncConfig` pointed at a wiremock provider and a temp data dir
//! - a PostgreSQL test container with migrations applied

#![allow(dead_code)]

use anyhow::{Context, Result};
use cardex_server::config::SyncConfig;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CATALOG_PATH: &str = "/api/v5/AllPrintings.json.gz";
pub const PRICE_PATH: &str = "/api/v5/AllPricesToday.json.gz";

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cardex_server=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn gzip(value: &Value) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(value.to_string().as_bytes())
        .expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Sync configuration targeting `server` with files under `dir`
pub fn sync_config(server: &MockServer, dir: &TempDir, batch_size: usize) -> SyncConfig {
    SyncConfig {
        catalog_url: format!("{}{}", server.uri(), CATALOG_PATH),
        price_url: format!("{}{}", server.uri(), PRICE_PATH),
        data_dir: dir.path().to_path_buf(),
        batch_size,
        decode_buffer: 4,
        startup_delay_secs: 0,
        ..SyncConfig::default()
    }
}

pub async fn mount_catalog(server: &MockServer, document: &Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(CATALOG_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(document)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_prices(server: &MockServer, document: &Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(PRICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(document)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Catalog card entry
pub fn card(uuid: &str, name: &str) -> Value {
    json!({
        "uuid": uuid,
        "name": name,
        "rarity": "common",
        "colors": ["R"],
        "manaCost": "{R}",
        "manaValue": 1.0,
        "type": "Instant",
        "text": "Test Bolt deals 3 damage to any target.",
        "number": "1",
        "identifiers": {"scryfallId": format!("sf-{}", uuid)},
        "foreignData": [{"language": "Japanese", "name": format!("{}-ja", name)}],
        "legalities": {"modern": "Legal"}
    })
}

/// Catalog document with one entry per `(code, name, online_only, cards)`
pub fn catalog(sets: Vec<(&str, &str, bool, Vec<Value>)>) -> Value {
    let mut data = Map::new();
    for (code, name, online_only, cards) in sets {
        data.insert(
            code.to_string(),
            json!({
                "baseSetSize": cards.len(),
                "cards": cards,
                "code": code,
                "isOnlineOnly": online_only,
                "name": name,
                "releaseDate": "2026-09-26",
                "tokens": []
            }),
        );
    }
    json!({"meta": {"date": "2026-10-16", "version": "5.2.2+20261016"}, "data": data})
}

/// One set of `n` plain cards, uuids `u-0..u-n`
pub fn catalog_of(n: usize) -> Value {
    let cards = (0..n)
        .map(|i| card(&format!("u-{}", i), &format!("Test Card {}", i)))
        .collect();
    catalog(vec![("TST", "Test Set", false, cards)])
}

/// Price entry; `None` leaves the finish out entirely
pub fn price(
    usd: Option<f64>,
    usd_foil: Option<f64>,
    eur: Option<f64>,
    eur_foil: Option<f64>,
) -> Value {
    // The older point must lose to the latest date
    fn dated(value: f64) -> Value {
        json!({"2026-10-09": value + 100.0, "2026-10-16": value})
    }

    let mut tcgplayer = Map::new();
    if let Some(v) = usd {
        tcgplayer.insert("normal".into(), dated(v));
    }
    if let Some(v) = usd_foil {
        tcgplayer.insert("foil".into(), dated(v));
    }
    let mut cardmarket = Map::new();
    if let Some(v) = eur {
        cardmarket.insert("normal".into(), dated(v));
    }
    if let Some(v) = eur_foil {
        cardmarket.insert("foil".into(), dated(v));
    }

    json!({
        "paper": {
            "tcgplayer": {"retail": tcgplayer, "currency": "USD"},
            "cardmarket": {"retail": cardmarket, "currency": "EUR"}
        },
        "mtgo": {"cardhoarder": {"retail": {"normal": {"2026-10-16": 0.01}}}}
    })
}

pub fn prices(entries: Vec<(&str, Value)>) -> Value {
    let data: Map<String, Value> = entries
        .into_iter()
        .map(|(uuid, value)| (uuid.to_string(), value))
        .collect();
    json!({"meta": {"date": "2026-10-16"}, "data": data})
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with migrations applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
