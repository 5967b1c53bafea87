//! Error types for the Beacon SDK
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Allocation failure is deliberately absent from the taxonomy: running
//! out of memory aborts the process (fail-fast), it is not a recoverable
//! error.

use std::io;
use thiserror::Error;

/// Result type alias for Beacon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Beacon SDK
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing argument: bad event/property name, wrong
    /// property tag, keyless dictionary child. The record being built is
    /// rejected as a whole; no partial output is written.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A string value is not well-formed UTF-8 per RFC 3629.
    #[error("string value is not valid UTF-8")]
    InvalidUtf8,

    /// I/O error from the consumer sink (open, write, flush). The
    /// in-memory property tree is unaffected.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
