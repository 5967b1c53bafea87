//! Beacon - Server-side analytics event tracking SDK
//!
//! Beacon records behavioral events and profile updates as JSON lines,
//! one record per line, ready for batch import into an analytics
//! backend. Records are assembled from a typed property tree, validated,
//! and delivered through a pluggable consumer sink.
//!
//! # Quick Start
//!
//! ```ignore
//! use beacon::{Analytics, LoggingConsumer, Properties};
//!
//! // Write records to daily files: /data/logs/events.log.YYYYMMDD
//! let sa = Analytics::new(LoggingConsumer::new("/data/logs/events"));
//!
//! let mut props = Properties::new();
//! props.add_string("product_name", "Apple")?;
//! props.add_number("product_price", 5888.0)?;
//! sa.track("ABCDEF123456789", "ViewProduct", Some(&props))?;
//! sa.flush()?;
//! ```
//!
//! # Architecture
//!
//! The property tree and JSON encoder live in `beacon-core`, the
//! consumer sinks in `beacon-sinks`, and the [`Analytics`] client that
//! ties them together in `beacon-client`. This crate re-exports the
//! public API of all three.

pub use beacon_client::{Analytics, RecordType};
pub use beacon_core::{
    encode, keys_equal, EncodeOptions, Error, Properties, PropertyNode, PropertyValue, Result,
    StringBuffer,
};
pub use beacon_sinks::{Consumer, LoggingConsumer, MemoryConsumer};
