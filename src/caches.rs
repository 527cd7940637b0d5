//! Process-wide caches: beatmap metadata and modded difficulty ceilings.

use anyhow::{ensure, Context, Result};
use futures::stream::{self, StreamExt};
use osu_autosave_cache::PersistentCache;
use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::beatmap_meta::{
    local_beatmap_path, read_header_window, scrape_beatmap_id, scrape_metadata, song_folder_set_ids,
    song_folders, BeatmapMeta,
};
use crate::config::AccuracyConfig;
use crate::report::round_pp;

/// Oldest beatmap set whose files carry metadata inside the header window.
pub const MIN_SCRAPED_SET_ID: u64 = 60_000;

/// Beatmap headers read in parallel while refreshing metadata.
const SCRAPE_CONCURRENCY: usize = 16;

/// Difficulty cache key for a map played with a mod combination.
pub fn difficulty_key(map_id: u64, mods: u32) -> String {
    format!("{},{}", map_id, mods)
}

/// Outcome of [`AccuracyCaches::refresh_metadata`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataRefresh {
    /// Entries stored in the metadata cache.
    pub stored: usize,
    /// Beatmap files that could not be read or did not scrape.
    pub failed: usize,
}

pub struct AccuracyCaches {
    /// Beatmap id -> metadata.
    pub metadata: PersistentCache<u64, BeatmapMeta>,
    /// `"{map_id},{mods}"` -> pp ceiling.
    pub difficulties: PersistentCache<String, f64>,
    local_sets: BTreeSet<u64>,
}

impl AccuracyCaches {
    /// Load both caches from `config.cache_dir`, starting empty when a
    /// snapshot is missing or unreadable, and index the local song folders.
    pub async fn open(config: &AccuracyConfig) -> Result<Self> {
        let start = Instant::now();
        let metadata = PersistentCache::open(config.metadata_cache_path()).await;
        let difficulties = PersistentCache::open(config.difficulty_cache_path()).await;

        let local_sets = match config.songs_path() {
            Some(songs) => song_folder_set_ids(&songs)
                .await
                .context("Failed to index local song folders")?,
            None => {
                warn!("OSU_PATH not set; local beatmaps are unavailable");
                BTreeSet::new()
            }
        };

        debug!(
            metadata = metadata.len(),
            difficulties = difficulties.len(),
            local_sets = local_sets.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "opened accuracy caches"
        );
        Ok(Self {
            metadata,
            difficulties,
            local_sets,
        })
    }

    pub fn has_local_set(&self, set_id: u64) -> bool {
        self.local_sets.contains(&set_id)
    }

    pub fn local_sets(&self) -> &BTreeSet<u64> {
        &self.local_sets
    }

    /// Path of a locally installed beatmap, if its metadata is cached and its
    /// set is present in the songs directory.
    pub fn local_beatmap(&self, config: &AccuracyConfig, map_id: u64) -> Option<PathBuf> {
        let songs = config.songs_path()?;
        let meta = self.metadata.get(&map_id)?;
        if !self.has_local_set(meta.set_id) {
            return None;
        }
        Some(local_beatmap_path(&songs, &meta))
    }

    pub fn cached_max_pp(&self, map_id: u64, mods: u32) -> Option<f64> {
        self.difficulties.get(&difficulty_key(map_id, mods))
    }

    /// Cached pp ceiling for `(map_id, mods)`, computing and storing it on a miss.
    ///
    /// The computed value is rounded to one decimal before it is stored.
    pub async fn max_pp_or_insert_with<F, Fut>(&self, map_id: u64, mods: u32, compute: F) -> Result<f64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<f64>>,
    {
        let key = difficulty_key(map_id, mods);
        if let Some(pp) = self.difficulties.get(&key) {
            return Ok(pp);
        }

        let pp = compute()
            .await
            .with_context(|| format!("Failed to compute pp ceiling for {}", key))?;
        ensure!(pp.is_finite(), "Non-finite pp ceiling {} for {}", pp, key);

        let pp = round_pp(pp);
        self.difficulties.set(key, pp)?;
        Ok(pp)
    }

    /// Re-scrape local beatmap headers when the game database changed since
    /// the last refresh.
    pub async fn refresh_metadata(&self, config: &AccuracyConfig) -> Result<MetadataRefresh> {
        let (Some(songs), Some(db)) = (config.songs_path(), config.db_path()) else {
            return Ok(MetadataRefresh::default());
        };

        let Some(mtime) = modified_millis(&db).await else {
            debug!(db = %db.display(), "game database not found; skipping metadata refresh");
            return Ok(MetadataRefresh::default());
        };
        let mtime_path = config.db_mtime_path();
        let previous = read_recorded_mtime(&mtime_path).await;
        if mtime <= previous {
            debug!(mtime, previous, "game database unchanged; skipping metadata refresh");
            return Ok(MetadataRefresh::default());
        }

        let start = Instant::now();
        let mut files = Vec::new();
        for (set_id, folder) in song_folders(&songs).await? {
            if set_id < MIN_SCRAPED_SET_ID {
                continue;
            }
            files.extend(beatmap_files(&folder).await?.into_iter().map(|f| (set_id, f)));
        }

        let scraped: Vec<_> = stream::iter(files)
            .map(|(set_id, path)| async move {
                let window = read_header_window(&path).await;
                (set_id, path, window)
            })
            .buffer_unordered(SCRAPE_CONCURRENCY)
            .collect()
            .await;

        let mut summary = MetadataRefresh::default();
        for (set_id, path, window) in scraped {
            let window = match window {
                Ok(window) => window,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable beatmap");
                    summary.failed += 1;
                    continue;
                }
            };
            match (scrape_beatmap_id(&window), scrape_metadata(&window)) {
                (Some(map_id), Some(meta)) => {
                    self.metadata.set(map_id, BeatmapMeta { set_id, ..meta })?;
                    summary.stored += 1;
                }
                _ => {
                    debug!(path = %path.display(), "beatmap header did not scrape");
                    summary.failed += 1;
                }
            }
        }

        if let Some(parent) = mtime_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&mtime_path, mtime.to_string())
            .await
            .with_context(|| format!("Failed to record {}", mtime_path.display()))?;

        if summary.failed > 0 {
            warn!(
                failed = summary.failed,
                stored = summary.stored,
                "some beatmap headers could not be scraped"
            );
        }
        debug!(
            stored = summary.stored,
            failed = summary.failed,
            mtime,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "refreshed beatmap metadata"
        );
        Ok(summary)
    }

    /// Save pipeline report for both caches.
    pub fn save_report(&self) -> String {
        format!(
            "[metadata] {}\n{}\n[difficulties] {}\n{}",
            self.metadata.path().display(),
            self.metadata.metrics().format_report(),
            self.difficulties.path().display(),
            self.difficulties.metrics().format_report()
        )
    }

    /// Wait for both caches to reach disk.
    pub async fn flush(&self) -> Result<()> {
        let metadata = self.metadata.flush().await;
        let difficulties = self.difficulties.flush().await;
        debug!(
            metadata_writes = self.metadata.metrics().writes,
            difficulty_writes = self.difficulties.metrics().writes,
            "flushed accuracy caches"
        );
        metadata.and(difficulties)
    }
}

async fn modified_millis(path: &Path) -> Option<u64> {
    let modified = tokio::fs::metadata(path).await.ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_millis() as u64)
}

async fn read_recorded_mtime(path: &Path) -> u64 {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text.trim().parse().unwrap_or(0),
        Err(_) => 0,
    }
}

async fn beatmap_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(folder)
        .await
        .with_context(|| format!("Failed to list {}", folder.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "osu") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
