//! Crash-safe persistent key/value cache.
//!
//! A [`PersistentCache`] keeps its entries in memory and mirrors them to a
//! JSON file. Every mutation requests a save; requests are coalesced so that
//! at most one write is in flight and a burst of mutations costs one extra
//! write at most. Each save writes a sibling temp file and renames it over the
//! canonical path, so the file on disk is always a complete snapshot.
//!
//! # Example
//!
//! ```no_run
//! use osu_autosave_cache::PersistentCache;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let cache: PersistentCache<String, f64> = PersistentCache::open(".osu-map-diffs.json").await;
//! cache.set("129891,16".to_string(), 412.7)?;
//! cache.flush().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod metrics;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use cache::{CacheKey, CacheValue, PersistentCache, SaveState};
pub use metrics::{SaveMetrics, SaveMetricsSnapshot};
pub use store::{temp_path, DurableStore, FsStore};
