//! Splitter configuration.

use anyhow::{ensure, Result};
use std::ops::Range;

/// Initial backing-buffer capacity (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Fraction of capacity that must stay free before the buffer is compacted.
pub const DEFAULT_BUFFER_FLUSH_RATIO: f64 = 0.1;

/// Configuration for a [`RecordSplitter`](crate::RecordSplitter).
#[derive(Debug, Clone, PartialEq)]
pub struct SplitterConfig {
    /// Record boundary marker. Must not be empty.
    pub separator: Vec<u8>,
    /// Initial backing-buffer capacity in bytes.
    pub buffer_size: usize,
    /// Free-space ratio below which the consumed prefix is discarded.
    pub buffer_flush_ratio: f64,
    /// Zero-based record indices that are emitted (`start..end`).
    pub record_range: Range<usize>,
    /// Whether emitted records keep their trailing separator bytes.
    pub include_separator: bool,
}

impl SplitterConfig {
    pub fn new(separator: impl Into<Vec<u8>>) -> Self {
        Self {
            separator: separator.into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_flush_ratio: DEFAULT_BUFFER_FLUSH_RATIO,
            record_range: 0..usize::MAX,
            include_separator: false,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_flush_ratio(mut self, ratio: f64) -> Self {
        self.buffer_flush_ratio = ratio;
        self
    }

    pub fn with_record_range(mut self, range: Range<usize>) -> Self {
        self.record_range = range;
        self
    }

    pub fn with_separator_included(mut self, include: bool) -> Self {
        self.include_separator = include;
        self
    }

    /// Reject configurations the splitter cannot honor.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.separator.is_empty(), "record separator must not be empty");
        ensure!(
            (0.0..1.0).contains(&self.buffer_flush_ratio),
            "buffer flush ratio must be in [0, 1), got {}",
            self.buffer_flush_ratio
        );
        Ok(())
    }
}
