//! Streaming decoder for gzip-compressed bulk JSON files
//!
//! Both bulk files share one layout, `{"meta": {...}, "data": {<key>: <entry>, ...}}`,
//! and can be far larger than memory. Decompression and parsing run in one pass on a
//! blocking worker that walks the `data` map entry by entry and hands records to the
//! async side through a bounded channel. When the consumer stops pulling, the channel
//! fills and the worker blocks, so at most `capacity` records (plus the entry being
//! decoded) are held at any time. Dropping the stream stops the worker.
//!
//! Catalog entries are whole sets: one set is materialized, then its cards are
//! emitted one by one. Price entries are emitted as they are parsed.

use flate2::read::GzDecoder;
use futures::Stream;
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::models::{RawCatalogCard, RawPriceFormats, RawPriceRecord, RawSet};
use crate::error::{SyncError, SyncResult};

const CONSUMER_GONE: &str = "record consumer dropped";

/// Lazy, forward-only sequence of decoded records
///
/// Yields `Err(SyncError::Decode)` at most once, as its last item.
pub struct RecordStream<T> {
    rx: mpsc::Receiver<SyncResult<T>>,
    worker: Option<JoinHandle<()>>,
    progress: DecodeProgress,
}

impl<T> RecordStream<T> {
    /// Handle that keeps reporting after the stream has been moved
    pub fn progress(&self) -> DecodeProgress {
        self.progress.clone()
    }
}

impl<T> Unpin for RecordStream<T> {}

/// Number of records the worker has handed to the channel so far
#[derive(Debug, Clone, Default)]
pub struct DecodeProgress {
    emitted: Arc<AtomicU64>,
}

impl DecodeProgress {
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Acquire)
    }

    fn record(&self) {
        self.emitted.fetch_add(1, Ordering::AcqRel);
    }
}

impl<T> Stream for RecordStream<T> {
    type Item = SyncResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(item) = ready!(this.rx.poll_recv(cx)) {
            return Poll::Ready(Some(item));
        }

        // Channel closed: surface a worker panic instead of a silent early end
        let Some(worker) = this.worker.as_mut() else {
            return Poll::Ready(None);
        };
        let joined = ready!(Pin::new(worker).poll(cx));
        this.worker = None;

        match joined {
            Ok(()) => Poll::Ready(None),
            Err(e) => Poll::Ready(Some(Err(SyncError::Decode(format!(
                "decoder worker failed: {}",
                e
            ))))),
        }
    }
}

/// Decode a gzip catalog file into one record per card
///
/// Must be called from within a tokio runtime.
pub fn decode_catalog(path: impl AsRef<Path>, capacity: usize) -> RecordStream<RawCatalogCard> {
    spawn_decoder(path.as_ref().to_path_buf(), capacity, |path, tx, progress| {
        let outcome = drive_document(path, |key: String, set: RawSet| {
            let (info, cards) = set.into_parts(&key);
            for card in cards {
                tx.blocking_send(Ok(RawCatalogCard {
                    set: info.clone(),
                    card,
                }))
                .map_err(|_| ConsumerGone)?;
                progress.record();
            }
            Ok(())
        });
        debug!(emitted = progress.emitted(), "Catalog decoder finished");
        outcome
    })
}

/// Decode a gzip price file into one record per identifier
///
/// Must be called from within a tokio runtime.
pub fn decode_prices(path: impl AsRef<Path>, capacity: usize) -> RecordStream<RawPriceRecord> {
    spawn_decoder(path.as_ref().to_path_buf(), capacity, |path, tx, progress| {
        let outcome = drive_document(path, |uuid: String, formats: RawPriceFormats| {
            tx.blocking_send(Ok(RawPriceRecord { uuid, formats }))
                .map_err(|_| ConsumerGone)?;
            progress.record();
            Ok(())
        });
        debug!(emitted = progress.emitted(), "Price decoder finished");
        outcome
    })
}

fn spawn_decoder<T, F>(path: PathBuf, capacity: usize, decode: F) -> RecordStream<T>
where
    T: Send + 'static,
    F: FnOnce(&Path, &mpsc::Sender<SyncResult<T>>, &DecodeProgress) -> SyncResult<()>
        + Send
        + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let progress = DecodeProgress::default();
    let worker_progress = progress.clone();

    let worker = tokio::task::spawn_blocking(move || {
        if let Err(err) = decode(&path, &tx, &worker_progress) {
            if tx.is_closed() {
                debug!(path = %path.display(), "Decoder stopped after consumer went away");
            } else {
                // Receiver may vanish in between; nothing left to report to then
                let _ = tx.blocking_send(Err(err));
            }
        }
    });

    RecordStream {
        rx,
        worker: Some(worker),
        progress,
    }
}

/// Marker returned by entry callbacks when the receiving side is gone
struct ConsumerGone;

/// Parse `path` as gzip JSON, calling `on_entry` for every `data` entry in order
fn drive_document<V, F>(path: &Path, on_entry: F) -> SyncResult<()>
where
    V: for<'de> Deserialize<'de>,
    F: FnMut(String, V) -> Result<(), ConsumerGone>,
{
    let file = File::open(path)?;
    let reader = BufReader::new(GzDecoder::new(BufReader::new(file)));
    let mut de = serde_json::Deserializer::from_reader(reader);

    let found = Document {
        data: DataMap {
            on_entry,
            _entry: PhantomData,
        },
    }
    .deserialize(&mut de)?;
    de.end()?;

    if !found {
        return Err(SyncError::Decode(format!(
            "{} has no `data` section",
            path.display()
        )));
    }

    Ok(())
}

/// Top-level object: skips everything but `data`, which goes to the inner seed
struct Document<S> {
    data: S,
}

impl<'de, S> DeserializeSeed<'de> for Document<S>
where
    S: DeserializeSeed<'de, Value = ()>,
{
    type Value = bool;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<bool, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, S> Visitor<'de> for Document<S>
where
    S: DeserializeSeed<'de, Value = ()>,
{
    type Value = bool;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a bulk document object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<bool, A::Error> {
        let mut data = Some(self.data);

        while let Some(key) = map.next_key::<String>()? {
            if key == "data" {
                let seed = data
                    .take()
                    .ok_or_else(|| <A::Error as de::Error>::duplicate_field("data"))?;
                map.next_value_seed(seed)?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }

        Ok(data.is_none())
    }
}

/// The `data` map, visited one entry at a time
struct DataMap<V, F> {
    on_entry: F,
    _entry: PhantomData<fn() -> V>,
}

impl<'de, V, F> DeserializeSeed<'de> for DataMap<V, F>
where
    V: Deserialize<'de>,
    F: FnMut(String, V) -> Result<(), ConsumerGone>,
{
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, V, F> Visitor<'de> for DataMap<V, F>
where
    V: Deserialize<'de>,
    F: FnMut(String, V) -> Result<(), ConsumerGone>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of provider entries")
    }

    fn visit_map<A: MapAccess<'de>>(mut self, mut map: A) -> Result<(), A::Error> {
        while let Some(key) = map.next_key::<String>()? {
            let value: V = map.next_value()?;
            (self.on_entry)(key, value).map_err(|_| <A::Error as de::Error>::custom(CONSUMER_GONE))?;
        }
        Ok(())
    }
}
