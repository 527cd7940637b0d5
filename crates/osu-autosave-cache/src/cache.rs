//! In-memory map mirrored to a JSON file by a debounced background save.
//!
//! Save lifecycle:
//!
//! ```text
//!            request            task starts          rename ok
//!   Idle ------------> Scheduled ----------> Active ------------> Idle
//!                                             |  ^
//!                                     request |  | rename ok (next cycle
//!                                             v  |  with the current map)
//!                                            Queued
//! ```
//!
//! Requests made while `Scheduled` or `Queued` are absorbed. At most one write
//! is in flight, and a burst of requests during a write costs exactly one more
//! write. A failed or panicking write or rename disables persistence for the
//! instance; the failure is reported by `set`, `request_save` and `flush`.

use anyhow::{anyhow, bail, Result};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, trace, warn};

use crate::metrics::{SaveMetrics, SaveMetricsSnapshot};
use crate::store::{temp_path, DurableStore, FsStore};

/// Lifecycle of the cache's save pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveState {
    /// Nothing pending.
    Idle,
    /// A save task has been spawned but has not started writing.
    Scheduled,
    /// A snapshot is being written.
    Active,
    /// A snapshot is being written and another one is needed afterwards.
    Queued,
}

/// Bounds required of cache keys.
pub trait CacheKey: Ord + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
impl<T> CacheKey for T where T: Ord + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Bounds required of cache values.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

struct CacheState<K, V> {
    entries: BTreeMap<K, V>,
    save: SaveState,
    failure: Option<String>,
}

struct Shared<K, V> {
    path: PathBuf,
    temp_path: PathBuf,
    store: Arc<dyn DurableStore>,
    /// Map, save state and failure live behind one lock so that mutation,
    /// snapshotting and state transitions are serialized.
    state: Mutex<CacheState<K, V>>,
    idle: Notify,
    metrics: SaveMetrics,
}

/// Key/value cache persisted as a JSON array of `[key, value]` pairs.
///
/// Cloning is cheap and yields a handle to the same cache. Mutations require
/// a Tokio runtime, onto which the save task is spawned.
pub struct PersistentCache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for PersistentCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: CacheKey, V: CacheValue> PersistentCache<K, V> {
    /// Create an empty cache persisted at `path`.
    pub fn new<P: AsRef<Path>>(path: P, store: Arc<dyn DurableStore>) -> Self {
        Self::with_entries(path, store, std::iter::empty())
    }

    /// Create a cache seeded with `entries` without scheduling a save.
    pub fn with_entries<P, I>(path: P, store: Arc<dyn DurableStore>, entries: I) -> Self
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (K, V)>,
    {
        let path = path.as_ref().to_path_buf();
        Self {
            shared: Arc::new(Shared {
                temp_path: temp_path(&path),
                path,
                store,
                state: Mutex::new(CacheState {
                    entries: entries.into_iter().collect(),
                    save: SaveState::Idle,
                    failure: None,
                }),
                idle: Notify::new(),
                metrics: SaveMetrics::default(),
            }),
        }
    }

    /// Load the snapshot at `path`, starting empty if it is missing or invalid.
    pub async fn load<P: AsRef<Path>>(path: P, store: Arc<dyn DurableStore>) -> Self {
        let path = path.as_ref();
        let entries = match store
            .read(path)
            .await
            .and_then(|bytes| decode::<K, V>(&bytes))
        {
            Ok(entries) => {
                debug!(path = %path.display(), entries = entries.len(), "loaded cache snapshot");
                entries
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "starting with an empty cache");
                Vec::new()
            }
        };
        Self::with_entries(path, store, entries)
    }

    /// [`load`](Self::load) from the local filesystem.
    pub async fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path, Arc::new(FsStore)).await
    }

    /// Canonical snapshot location.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.shared.state.lock().entries.get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.shared.state.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries in key order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.shared
            .state
            .lock()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn save_state(&self) -> SaveState {
        self.shared.state.lock().save
    }

    /// Reason persistence was disabled, if a save has failed.
    pub fn failure(&self) -> Option<String> {
        self.shared.state.lock().failure.clone()
    }

    pub fn metrics(&self) -> SaveMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Insert or replace an entry and request a save.
    ///
    /// The in-memory map is updated before this returns. Fails without
    /// touching the map when called outside a Tokio runtime or after a save
    /// has failed.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| anyhow!("PersistentCache::set requires a Tokio runtime: {}", e))?;
        let mut state = self.shared.state.lock();
        self.shared.ensure_durable(&state)?;
        state.entries.insert(key, value);
        self.schedule(&mut state, &runtime);
        Ok(())
    }

    /// Ask for the current map to be persisted.
    pub fn request_save(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| anyhow!("PersistentCache::request_save requires a Tokio runtime: {}", e))?;
        let mut state = self.shared.state.lock();
        self.shared.ensure_durable(&state)?;
        self.schedule(&mut state, &runtime);
        Ok(())
    }

    /// Wait until no save is scheduled or running.
    ///
    /// Returns the save failure, if any. This is the teardown point for an
    /// owner that needs the last mutation on disk before exiting.
    pub async fn flush(&self) -> Result<()> {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.shared.state.lock();
                if state.save == SaveState::Idle {
                    return self.shared.ensure_durable(&state);
                }
            }
            notified.await;
        }
    }

    fn schedule(&self, state: &mut CacheState<K, V>, runtime: &tokio::runtime::Handle) {
        self.shared.metrics.record_request();
        match state.save {
            SaveState::Idle => {
                state.save = SaveState::Scheduled;
                trace!(path = %self.shared.path.display(), "scheduled cache save");
                let shared = Arc::clone(&self.shared);
                runtime.spawn(async move {
                    // Let the rest of the current burst land first.
                    tokio::task::yield_now().await;
                    let cycles = AssertUnwindSafe(Arc::clone(&shared).run_saves());
                    if let Err(panic) = cycles.catch_unwind().await {
                        let reason = anyhow!("Cache save panicked: {}", panic_message(panic.as_ref()));
                        shared.end_cycle(Err(reason), Duration::ZERO);
                        shared.idle.notify_waiters();
                    }
                });
            }
            SaveState::Active => {
                state.save = SaveState::Queued;
                self.shared.metrics.record_queued();
            }
            SaveState::Scheduled | SaveState::Queued => {
                self.shared.metrics.record_coalesced();
            }
        }
    }
}

impl<K: CacheKey, V: CacheValue> Shared<K, V> {
    fn ensure_durable(&self, state: &CacheState<K, V>) -> Result<()> {
        match &state.failure {
            Some(reason) => bail!(
                "Cache {} is no longer persisted: {}",
                self.path.display(),
                reason
            ),
            None => Ok(()),
        }
    }

    async fn run_saves(self: Arc<Self>) {
        loop {
            let start = Instant::now();
            let snapshot = self.begin_cycle();
            let result = match snapshot {
                Ok(bytes) => self.persist(&bytes).await.map(|()| bytes.len()),
                Err(e) => Err(e),
            };
            if !self.end_cycle(result, start.elapsed()) {
                break;
            }
        }
        self.idle.notify_waiters();
    }

    /// Enter `Active` and serialize the map as it is right now.
    fn begin_cycle(&self) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.save = SaveState::Active;
        let start = Instant::now();
        let encoded = encode(&state.entries)?;
        trace!(
            path = %self.path.display(),
            entries = state.entries.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "serialized cache snapshot"
        );
        Ok(encoded)
    }

    async fn persist(&self, contents: &[u8]) -> Result<()> {
        self.store.write(&self.temp_path, contents).await?;
        self.store.rename(&self.temp_path, &self.path).await
    }

    /// Settle a finished cycle; returns true when another cycle must run.
    fn end_cycle(&self, result: Result<usize>, elapsed: Duration) -> bool {
        let mut state = self.state.lock();
        match result {
            Ok(bytes) => {
                self.metrics.record_write(bytes, elapsed);
                debug!(
                    path = %self.path.display(),
                    entries = state.entries.len(),
                    bytes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "persisted cache snapshot"
                );
                if state.save == SaveState::Queued {
                    state.save = SaveState::Active;
                    return true;
                }
            }
            Err(e) => {
                self.metrics.record_failure();
                error!(
                    path = %self.path.display(),
                    error = %format!("{:#}", e),
                    "cache save failed; persistence disabled"
                );
                state.failure = Some(format!("{:#}", e));
            }
        }
        state.save = SaveState::Idle;
        false
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

fn encode<K: Serialize, V: Serialize>(entries: &BTreeMap<K, V>) -> Result<Vec<u8>> {
    let pairs: Vec<(&K, &V)> = entries.iter().collect();
    serde_json::to_vec(&pairs).map_err(|e| anyhow!("Failed to serialize cache snapshot: {}", e))
}

fn decode<K: DeserializeOwned, V: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<(K, V)>> {
    serde_json::from_slice(bytes).map_err(|e| anyhow!("Failed to parse cache snapshot: {}", e))
}
