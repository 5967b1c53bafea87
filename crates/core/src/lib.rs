//! Core property tree and JSON encoding engine for Beacon
//!
//! This crate defines the foundational pieces used throughout the SDK:
//! - StringBuffer: growable byte buffer backing all serialization output
//! - utf8: RFC 3629 validator and code point reader
//! - PropertyNode / PropertyValue: the tagged property tree
//! - Properties: the mutable dictionary builder (replace-on-duplicate,
//!   most-recently-added-first child order)
//! - encode: the JSON encoder (scalar formatting, string escaping,
//!   `\uXXXX` / surrogate-pair fallback)
//! - Error: error type hierarchy
//!
//! ## Allocation policy
//!
//! Out-of-memory is fatal: buffer and node allocation go through the
//! global allocator, which aborts the process when it cannot satisfy a
//! request. No `Error` variant models allocation failure.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod encode;
pub mod error;
pub mod node;
pub mod utf8;

// Re-export commonly used types
pub use buffer::StringBuffer;
pub use encode::{encode, EncodeOptions};
pub use error::{Error, Result};
pub use node::{keys_equal, Properties, PropertyNode, PropertyValue, KEY_COMPARE_LIMIT};
