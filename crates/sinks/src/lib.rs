//! Consumer sinks for Beacon event records
//!
//! A consumer receives each fully encoded record (one JSON line, without
//! its trailing newline) and decides where it goes. Two implementations
//! are provided:
//! - [`LoggingConsumer`]: append-mode daily log files
//!   (`<prefix>.log.<YYYYMMDD>`), rolled over on local-date change
//! - [`MemoryConsumer`]: collects records in memory, for tests and
//!   debugging
//!
//! Sink failures surface as [`beacon_core::Error::Io`] and never corrupt
//! the in-memory property tree that produced the record.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod logging;
pub mod memory;

pub use logging::LoggingConsumer;
pub use memory::MemoryConsumer;

use beacon_core::Result;

/// Destination for encoded event records
pub trait Consumer {
    /// Deliver one encoded record (a single JSON object, no newline)
    fn send(&mut self, record: &[u8]) -> Result<()>;

    /// Push any buffered output toward durable storage
    fn flush(&mut self) -> Result<()>;

    /// Flush and release underlying resources; safe to call repeatedly
    fn close(&mut self) -> Result<()>;
}
