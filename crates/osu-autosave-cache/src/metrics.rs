//! Save pipeline counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Thread-safe counters describing how save requests were handled.
#[derive(Debug, Default)]
pub struct SaveMetrics {
    /// Every `set` or explicit `request_save`
    requested: AtomicU64,
    /// Requests absorbed by a save that was already scheduled or queued
    coalesced: AtomicU64,
    /// Requests that arrived while a write was in flight
    queued: AtomicU64,
    /// Completed write + rename cycles
    writes: AtomicU64,
    /// Bytes handed to the durable store across all completed writes
    bytes_written: AtomicU64,
    /// Wall time spent in completed save cycles, serialization included
    save_time_us: AtomicU64,
    /// Write or rename failures (at most one per cache)
    failures: AtomicU64,
}

impl SaveMetrics {
    pub fn record_request(&self) {
        self.requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: usize, elapsed: Duration) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        self.save_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> SaveMetricsSnapshot {
        SaveMetricsSnapshot {
            requested: self.requested.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            save_time_us: self.save_time_us.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of save metrics (for reporting).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetricsSnapshot {
    pub requested: u64,
    pub coalesced: u64,
    pub queued: u64,
    pub writes: u64,
    pub bytes_written: u64,
    pub save_time_us: u64,
    pub failures: u64,
}

impl SaveMetricsSnapshot {
    /// Fraction of save requests that did not cost a write of their own.
    pub fn coalescing_ratio(&self) -> f64 {
        if self.requested == 0 {
            return 0.0;
        }
        1.0 - self.writes as f64 / self.requested as f64
    }

    /// Mean wall time of a completed save cycle in milliseconds.
    pub fn mean_save_ms(&self) -> f64 {
        if self.writes == 0 {
            return 0.0;
        }
        self.save_time_us as f64 / self.writes as f64 / 1000.0
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        [
            "Cache Save Report".to_string(),
            "=".repeat(40),
            format!("  Requests:        {}", self.requested),
            format!("  Coalesced:       {}", self.coalesced),
            format!("  Queued:          {}", self.queued),
            format!("  Writes:          {}", self.writes),
            format!("  Bytes written:   {}", self.bytes_written),
            format!("  Mean save time:  {:.2} ms", self.mean_save_ms()),
            format!("  Failures:        {}", self.failures),
            format!("  Coalescing:      {:.1}%", self.coalescing_ratio() * 100.0),
        ]
        .join("\n")
    }
}
