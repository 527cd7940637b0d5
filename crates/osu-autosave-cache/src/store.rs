//! Durable storage seam for cache snapshots.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Whole-file storage used by [`PersistentCache`](crate::PersistentCache).
///
/// `rename` must replace `to` atomically: readers observe either the old or
/// the new content, never a mix.
#[async_trait::async_trait]
pub trait DurableStore: Send + Sync {
    /// Read a whole file.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write a whole file, replacing any previous content.
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Atomically move `from` over `to`.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// Temporary sibling used while writing `path` (`<path>.tmp`).
///
/// It lives in the same directory so the final rename stays on one filesystem.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Local filesystem store backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

#[async_trait::async_trait]
impl DurableStore for FsStore {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
        }
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| anyhow!("Failed to write temp file {}: {}", path.display(), e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tokio::fs::rename(from, to).await.map_err(|e| {
            anyhow!(
                "Failed to rename {} to {}: {}",
                from.display(),
                to.display(),
                e
            )
        })
    }
}
