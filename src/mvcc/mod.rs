//! The MVCC layer: key codec, metadata records, the stats scan and the
//! split finder.

pub mod key;
pub mod meta;
pub mod split;
pub mod stats;

pub use key::{EncodedKey, MvccKey, Timestamp, compare};
pub use meta::{MvccMetadata, TxnMeta};
pub use split::{find_split_key, is_valid_split_key};
pub use stats::{KeyRange, MvccStats, compute_stats, compute_stats_internal};
