//! # MVCC Storage Engine
//!
//! A multi-version key-value layer over an ordered LSM-style engine.
//!
//! ## Core idea
//! Every logical key is stored as a series of versions, each an encoded
//! key `raw ++ timestamp suffix` in the engine's flat keyspace. The engine
//! comparator sorts a key's metadata row first, then its versions newest
//! first, so a single forward scan sees each key's history in order.
//!
//! On top of that keyspace the crate provides:
//! - the key codec ([`mvcc::key`])
//! - live and snapshot handles with iterators and write batches ([`engine`])
//! - MVCC stats over a key range ([`mvcc::stats`])
//! - scoped perf counters ([`engine::perf`])
//! - compaction range batching ([`compaction`]) and split-key selection

pub mod bloom;
pub mod compaction;
pub mod config;
pub mod engine;
pub mod error;
pub mod iterator;
pub mod keys;
pub mod memtable;
pub mod mvcc;
pub mod segment;
pub mod types;
pub mod wal;

// Public re-exports for the top-level API
pub use compaction::{CompactionRange, batch_for_compaction};
pub use config::Options;
pub use engine::{
    EngineIterator, IterOptions, IteratorStats, LiveHandle, PerfCounter, PerfScope, Reader, SnapshotHandle,
    WriteBatch, Writer, with_perf_scope,
};
pub use error::{Error, Result};
pub use iterator::StorageIterator;
pub use keys::{KeySpan, NoSplitSpans};
pub use mvcc::{
    EncodedKey, KeyRange, MvccKey, MvccMetadata, MvccStats, Timestamp, TxnMeta, compute_stats, find_split_key,
};
pub use segment::FileSegmentMeta;
