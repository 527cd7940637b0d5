//! Incremental record splitter for chunked byte streams.
//!
//! This crate provides:
//! - `SplitterConfig`: separator, buffer sizing and record-range selection
//! - `RecordSplitter`: push-style splitter with a bounded, self-compacting buffer
//! - `split_reader` / `split_file`: drive a splitter from any `AsyncRead`
//!
//! Beatmap files are parsed line by line without loading them whole:
//!
//! ```ignore
//! let config = SplitterConfig::new(b"\n".to_vec());
//! let lines = split_file(path, config, |record| {
//!     parser.feed_line(&String::from_utf8_lossy(record.bytes));
//!     Ok(())
//! })
//! .await?;
//! ```

pub mod config;
pub mod reader;
pub mod splitter;

pub use config::{SplitterConfig, DEFAULT_BUFFER_FLUSH_RATIO, DEFAULT_BUFFER_SIZE};
pub use reader::{split_file, split_reader, READ_CHUNK_SIZE};
pub use splitter::{split_all, Record, RecordSplitter};
