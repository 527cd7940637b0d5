//! Runtime configuration resolved from the environment.

use osu_stream_splitter::{SplitterConfig, DEFAULT_BUFFER_SIZE};
use std::path::{Path, PathBuf};

use crate::env_utils::{env_path, env_var_or};

/// Game install directory.
pub const OSU_PATH_ENV: &str = "OSU_PATH";
/// Override for the cache directory.
pub const CACHE_DIR_ENV: &str = "OSU_ACCURACY_CACHE_DIR";
/// Initial record splitter buffer in bytes.
pub const SPLITTER_BUFFER_ENV: &str = "OSU_ACCURACY_SPLITTER_BUFFER";

pub const METADATA_CACHE_FILE: &str = ".osu-map-metadata.json";
pub const DIFFICULTY_CACHE_FILE: &str = ".osu-map-diffs.json";
pub const DB_MTIME_FILE: &str = ".osu-db-mtime.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyConfig {
    /// Game install directory, if known.
    pub osu_path: Option<PathBuf>,
    /// Directory holding the cache snapshots.
    pub cache_dir: PathBuf,
    /// Initial buffer size for beatmap line splitting.
    pub splitter_buffer: usize,
}

impl AccuracyConfig {
    /// Resolve `OSU_PATH`, `OSU_ACCURACY_CACHE_DIR` and
    /// `OSU_ACCURACY_SPLITTER_BUFFER`.
    pub fn from_env() -> Self {
        Self {
            osu_path: env_path(OSU_PATH_ENV),
            cache_dir: env_path(CACHE_DIR_ENV).unwrap_or_else(default_cache_dir),
            splitter_buffer: env_var_or(SPLITTER_BUFFER_ENV, DEFAULT_BUFFER_SIZE).max(1),
        }
    }

    /// Configuration rooted at explicit directories.
    pub fn new(osu_path: Option<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            osu_path,
            cache_dir: cache_dir.into(),
            splitter_buffer: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn songs_path(&self) -> Option<PathBuf> {
        self.osu_path.as_ref().map(|p| p.join("Songs"))
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        self.osu_path.as_ref().map(|p| p.join("osu!.db"))
    }

    pub fn metadata_cache_path(&self) -> PathBuf {
        self.cache_dir.join(METADATA_CACHE_FILE)
    }

    pub fn difficulty_cache_path(&self) -> PathBuf {
        self.cache_dir.join(DIFFICULTY_CACHE_FILE)
    }

    pub fn db_mtime_path(&self) -> PathBuf {
        self.cache_dir.join(DB_MTIME_FILE)
    }

    /// Splitter settings for `separator` using the configured buffer size.
    pub fn splitter_config(&self, separator: impl Into<Vec<u8>>) -> SplitterConfig {
        SplitterConfig::new(separator).with_buffer_size(self.splitter_buffer)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// `<user cache dir>/osu-accuracy`, or `.osu-accuracy` when the platform has
/// no cache directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("osu-accuracy"))
        .unwrap_or_else(|| PathBuf::from(".osu-accuracy"))
}
