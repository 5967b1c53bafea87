//! In-memory consumer for tests and debugging

use std::sync::Arc;

use beacon_core::Result;
use parking_lot::Mutex;

use crate::Consumer;

#[derive(Debug, Default)]
struct MemoryInner {
    records: Vec<Vec<u8>>,
    flushes: usize,
    closed: bool,
}

/// Consumer that collects every record in memory
///
/// Clones share the same storage, so a test can hand one handle to the
/// client and keep another for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryConsumer {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryConsumer {
    /// Create an empty consumer
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records received so far
    pub fn records(&self) -> Vec<Vec<u8>> {
        self.inner.lock().records.clone()
    }

    /// Records received so far, decoded as UTF-8 strings
    pub fn records_utf8(&self) -> Vec<String> {
        self.inner
            .lock()
            .records
            .iter()
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .collect()
    }

    /// Number of times `flush` was called
    pub fn flush_count(&self) -> usize {
        self.inner.lock().flushes
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Consumer for MemoryConsumer {
    fn send(&mut self, record: &[u8]) -> Result<()> {
        self.inner.lock().records.push(record.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.lock().flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.inner.lock().closed = true;
        Ok(())
    }
}
