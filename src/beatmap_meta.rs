//! Local beatmap files: header scraping, song folder naming and line reading.
//!
//! The `[Metadata]` section of a `.osu` file sits near the top of the file,
//! so the scraper only looks at a fixed window of the header instead of
//! parsing the whole beatmap.

use anyhow::{anyhow, Context, Result};
use osu_stream_splitter::split_file;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::trace;

use crate::config::AccuracyConfig;

/// Offset of the scraped header window.
pub const HEADER_WINDOW_OFFSET: u64 = 256;
/// Length of the scraped header window.
pub const HEADER_WINDOW_LEN: u64 = 512;

const SECTION_METADATA: &[u8] = b"\n[Metadata]";
const VALUE_TITLE: &[u8] = b"\nTitle:";
const VALUE_ARTIST: &[u8] = b"\nArtist:";
const VALUE_CREATOR: &[u8] = b"\nCreator:";
const VALUE_VERSION: &[u8] = b"\nVersion:";
const VALUE_BEATMAP_ID: &[u8] = b"\nBeatmapID:";
const VALUE_SET_ID: &[u8] = b"\nBeatmapSetID:";

/// Identity of a beatmap difficulty as stored in the metadata cache.
///
/// Persisted as `[setId, artist, title, creator, version]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MetaTuple", into = "MetaTuple")]
pub struct BeatmapMeta {
    pub set_id: u64,
    pub artist: String,
    pub title: String,
    pub creator: String,
    pub version: String,
}

type MetaTuple = (u64, String, String, String, String);

impl From<MetaTuple> for BeatmapMeta {
    fn from((set_id, artist, title, creator, version): MetaTuple) -> Self {
        Self {
            set_id,
            artist,
            title,
            creator,
            version,
        }
    }
}

impl From<BeatmapMeta> for MetaTuple {
    fn from(meta: BeatmapMeta) -> Self {
        (meta.set_id, meta.artist, meta.title, meta.creator, meta.version)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// Value following `marker` (searched from `from`) up to the next line feed,
/// with a trailing `\r` removed. Returns the value and the line feed position.
fn value_after<'a>(window: &'a [u8], marker: &[u8], from: usize) -> Option<(&'a [u8], usize)> {
    let start = find(window, marker, from)? + marker.len();
    let lf = find(window, b"\n", start)?;
    let value = &window[start..lf];
    Some((value.strip_suffix(b"\r").unwrap_or(value), lf))
}

fn text(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn number(value: &[u8]) -> Option<u64> {
    std::str::from_utf8(value).ok()?.trim().parse().ok()
}

/// Scrape title, artist, creator, version and set id, in file order, from a
/// header window.
///
/// Returns `None` if any field is missing or its line is cut off by the end
/// of the window.
pub fn scrape_metadata(window: &[u8]) -> Option<BeatmapMeta> {
    let (_, lf) = value_after(window, SECTION_METADATA, 0)?;
    let (title, lf) = value_after(window, VALUE_TITLE, lf)?;
    let (artist, lf) = value_after(window, VALUE_ARTIST, lf)?;
    let (creator, lf) = value_after(window, VALUE_CREATOR, lf)?;
    let (version, lf) = value_after(window, VALUE_VERSION, lf)?;
    let (set_id, _) = value_after(window, VALUE_SET_ID, lf)?;

    Some(BeatmapMeta {
        set_id: number(set_id)?,
        artist: text(artist),
        title: text(title),
        creator: text(creator),
        version: text(version),
    })
}

/// Scrape the `BeatmapID` of the `[Metadata]` section from a header window.
pub fn scrape_beatmap_id(window: &[u8]) -> Option<u64> {
    let (_, lf) = value_after(window, SECTION_METADATA, 0)?;
    let (id, _) = value_after(window, VALUE_BEATMAP_ID, lf)?;
    number(id)
}

/// Read the header window of a `.osu` file. Short files yield what exists.
pub async fn read_header_window<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    file.seek(SeekFrom::Start(HEADER_WINDOW_OFFSET))
        .await
        .with_context(|| format!("Failed to seek in {}", path.display()))?;

    let mut window = Vec::with_capacity(HEADER_WINDOW_LEN as usize);
    file.take(HEADER_WINDOW_LEN)
        .read_to_end(&mut window)
        .await
        .with_context(|| format!("Failed to read header of {}", path.display()))?;
    Ok(window)
}

/// Read and scrape the metadata of a local `.osu` file.
pub async fn read_metadata<P: AsRef<Path>>(path: P) -> Result<Option<BeatmapMeta>> {
    let window = read_header_window(path).await?;
    Ok(scrape_metadata(&window))
}

/// Sanitize a song folder name (`is_folder`) or a beatmap file stem the way
/// the game does when it extracts a beatmap set.
pub fn sanitize_path_name(name: &str, is_folder: bool) -> String {
    if is_folder {
        let mut out = String::with_capacity(name.len());
        let mut in_run = false;
        for c in name.chars() {
            if matches!(c, '\\' | '?' | '"' | '<' | '>' | '|') {
                if !in_run {
                    out.push('_');
                }
                in_run = true;
                continue;
            }
            in_run = false;
            if !matches!(c, '.' | '*' | ':' | '/') {
                out.push(c);
            }
        }
        out
    } else {
        name.chars()
            .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
            .collect()
    }
}

/// Expected location of a difficulty inside the `Songs` directory.
pub fn local_beatmap_path(songs_path: &Path, meta: &BeatmapMeta) -> PathBuf {
    let folder = sanitize_path_name(
        &format!("{} {} - {}", meta.set_id, meta.artist, meta.title),
        true,
    );
    let stem = sanitize_path_name(
        &format!(
            "{} - {} ({}) [{}]",
            meta.artist, meta.title, meta.creator, meta.version
        ),
        false,
    );
    songs_path.join(folder).join(format!("{}.osu", stem))
}

/// Set id of a song folder name, or `None` for folders that are not
/// `"<setId> ..."` or that carry a duplicate suffix such as `" (2)"`.
pub fn folder_set_id(name: &str) -> Option<u64> {
    if !name.starts_with(|c: char| c.is_ascii_digit()) || has_duplicate_suffix(name) {
        return None;
    }
    name.split(' ').next()?.parse().ok()
}

fn has_duplicate_suffix(name: &str) -> bool {
    let Some(rest) = name.strip_suffix(')') else {
        return false;
    };
    let Some(open) = rest.rfind(" (") else {
        return false;
    };
    let digits = &rest[open + 2..];
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Song folders under `songs_path` with their set ids, sorted by name.
pub async fn song_folders(songs_path: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(songs_path)
        .await
        .map_err(|e| anyhow!("Failed to list {}: {}", songs_path.display(), e))?;

    let mut folders = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list {}", songs_path.display()))?
    {
        let name = entry.file_name();
        match name.to_str().and_then(folder_set_id) {
            Some(set_id) => folders.push((set_id, entry.path())),
            None => trace!(folder = ?name, "skipping song folder"),
        }
    }
    folders.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(folders)
}

/// Set ids of every song folder under `songs_path`.
pub async fn song_folder_set_ids(songs_path: &Path) -> Result<BTreeSet<u64>> {
    Ok(song_folders(songs_path)
        .await?
        .into_iter()
        .map(|(set_id, _)| set_id)
        .collect())
}

/// Read a local beatmap as lines for a beatmap parser.
pub async fn read_beatmap_lines<P: AsRef<Path>>(
    path: P,
    config: &AccuracyConfig,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    split_file(path, config.splitter_config(b"\n".to_vec()), |record| {
        let line = record.bytes.strip_suffix(b"\r").unwrap_or(record.bytes);
        lines.push(text(line));
        Ok(())
    })
    .await?;
    Ok(lines)
}
