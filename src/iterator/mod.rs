pub mod merge;

use crate::error::Result;

/// The central iteration abstraction over encoded MVCC keys.
///
/// Implemented by the engine iterator handed out by live and snapshot
/// handles. The stats scan and the split finder are written against this
/// trait so they only rely on positioning and forward movement.
pub trait StorageIterator {
    /// Returns the current encoded key. Only valid when is_valid() is true.
    fn key(&self) -> &[u8];

    /// Returns the current value. Only valid when is_valid() is true.
    fn value(&self) -> &[u8];

    /// Returns true if the iterator is positioned at a valid entry.
    fn is_valid(&self) -> bool;

    /// Advances to the next entry.
    fn next(&mut self) -> Result<()>;

    /// Moves back to the previous entry.
    fn prev(&mut self) -> Result<()>;

    /// Positions the iterator at the first entry with key >= target.
    fn seek(&mut self, key: &[u8]) -> Result<()>;

    /// Positions the iterator at the last entry with key <= target.
    fn seek_for_prev(&mut self, key: &[u8]) -> Result<()>;

    fn seek_to_first(&mut self) -> Result<()>;

    fn seek_to_last(&mut self) -> Result<()>;
}
