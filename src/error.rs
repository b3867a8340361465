use std::io;

use thiserror::Error;

/// Unified error type for the MVCC engine layer.
///
/// A missing key is not an error: point reads return `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from WAL or config file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption detected (CRC mismatch, bad record layout, bad metadata).
    #[error("Corruption: {0}")]
    Corruption(String),

    /// An encoded MVCC key could not be decoded.
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// A key range whose start sorts after its end.
    #[error("Invalid range: start {start:?} > end {end:?}")]
    InvalidRange { start: Vec<u8>, end: Vec<u8> },

    /// Segment metadata not sorted by smallest key.
    #[error("Unsorted input: segment {index} sorts before its predecessor")]
    UnsortedInput { index: usize },

    /// A handle was closed while iterators or snapshots derived from it were alive.
    #[error("Handle closed with {iterators} live iterator(s) and {snapshots} live snapshot(s)")]
    UseAfterClose { iterators: usize, snapshots: usize },

    /// The merge operator rejected an operand.
    #[error("Merge error: {0}")]
    Merge(String),

    /// Invalid configuration parameter.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
