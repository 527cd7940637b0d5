//! osu! range accuracy
//!
//! Robust accuracy statistics over a player's top plays, split by how hard
//! each played map was:
//!
//! - **Configuration**: install and cache locations from the environment
//! - **Beatmap metadata**: header scraping and local song folder naming
//! - **Caches**: persisted beatmap metadata and modded pp ceilings
//! - **Report**: hard half vs easy half median accuracy plus robust spread
//!   and trend
//!
//! The building blocks live in their own crates and are re-exported here:
//! [`osu_stream_splitter`] for line splitting, [`osu_stats`] for the
//! statistics and [`osu_autosave_cache`] for persistence.

pub mod beatmap_meta;
pub mod caches;
pub mod config;
pub mod env_utils;
pub mod report;

pub use beatmap_meta::BeatmapMeta;
pub use caches::{difficulty_key, AccuracyCaches, MetadataRefresh};
pub use config::AccuracyConfig;
pub use report::{round_pp, AccuracyReport, HitCounts, Play};

pub use osu_autosave_cache;
pub use osu_stats;
pub use osu_stream_splitter;
