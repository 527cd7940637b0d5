//! Drive a [`RecordSplitter`] from an asynchronous byte source.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::config::SplitterConfig;
use crate::splitter::{Record, RecordSplitter};

/// Size of each read issued against the source.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Read `reader` to EOF, splitting it into records delivered to `sink`.
///
/// Returns the number of records emitted. Reading stops early once the
/// configured record range is exhausted. Read errors and sink errors abort
/// the stream and are returned.
pub async fn split_reader<R, F>(mut reader: R, config: SplitterConfig, mut sink: F) -> Result<usize>
where
    R: AsyncRead + Unpin,
    F: FnMut(Record<'_>) -> Result<()>,
{
    let mut splitter = RecordSplitter::new(config)?;
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    let mut emitted = 0usize;

    loop {
        let read = reader
            .read(&mut chunk)
            .await
            .context("Failed to read record stream")?;
        if read == 0 {
            break;
        }
        splitter.feed(&chunk[..read], |record| {
            emitted += 1;
            sink(record)
        })?;
        if splitter.is_exhausted() {
            break;
        }
    }

    splitter.finish(|record| {
        emitted += 1;
        sink(record)
    })?;
    Ok(emitted)
}

/// Open `path` and split its contents into records delivered to `sink`.
pub async fn split_file<P, F>(path: P, config: SplitterConfig, sink: F) -> Result<usize>
where
    P: AsRef<Path>,
    F: FnMut(Record<'_>) -> Result<()>,
{
    let path = path.as_ref();
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    let emitted = split_reader(file, config, sink).await?;
    debug!(path = %path.display(), records = emitted, "split file into records");
    Ok(emitted)
}
