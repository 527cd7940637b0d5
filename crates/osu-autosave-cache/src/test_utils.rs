//! In-memory durable store for exercising the save pipeline.

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use crate::store::DurableStore;

#[derive(Default)]
pub(crate) struct MemoryStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    writes: AtomicUsize,
    renames: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    interrupt: AtomicBool,
    panic: AtomicBool,
    /// When set, every write waits for a permit.
    gate: Option<Semaphore>,
    /// Receives the ordinal of every write as it starts.
    started: Option<mpsc::UnboundedSender<usize>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn gated() -> (Arc<Self>, mpsc::UnboundedReceiver<usize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            gate: Some(Semaphore::new(0)),
            started: Some(tx),
            ..Self::default()
        };
        (Arc::new(store), rx)
    }

    pub(crate) fn release(&self, writes: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(writes);
        }
    }

    /// Make every later write leave a truncated temp file and fail.
    pub(crate) fn interrupt_writes(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    /// Make every later write panic.
    pub(crate) fn panic_writes(&self) {
        self.panic.store(true, Ordering::SeqCst);
    }

    pub(crate) fn insert(&self, path: impl Into<PathBuf>, contents: &[u8]) {
        self.files.lock().insert(path.into(), contents.to_vec());
    }

    pub(crate) fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn renames(&self) -> usize {
        self.renames.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DurableStore for MemoryStore {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.file(path)
            .ok_or_else(|| anyhow!("No such file: {}", path.display()))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(started) = &self.started {
            let _ = started.send(self.writes() + 1);
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        tokio::task::yield_now().await;

        if self.panic.load(Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("simulated store panic writing {}", path.display());
        }
        if self.interrupt.load(Ordering::SeqCst) {
            self.insert(path, &contents[..contents.len() / 2]);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            bail!("Simulated interruption writing {}", path.display());
        }

        self.insert(path, contents);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        {
            let mut files = self.files.lock();
            let contents = files
                .remove(from)
                .ok_or_else(|| anyhow!("No such file: {}", from.display()))?;
            files.insert(to.to_path_buf(), contents);
        }
        self.renames.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
