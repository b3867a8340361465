use crate::error::{Error, Result};
use crate::mvcc::key::MvccKey;
use crate::wal::record::{BatchOp, BatchRecord, RecordType};

/// Mutations applied atomically by `Writer::commit_batch`.
///
/// The batch's byte representation (`repr`) is the WAL record format, so a
/// batch built elsewhere can be shipped as bytes and applied with
/// `Writer::apply_batch_repr`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    record: BatchRecord,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch::default()
    }

    pub fn put(&mut self, key: &MvccKey, value: &[u8]) {
        self.push(RecordType::Put, key.encode().into_vec(), value.to_vec());
    }

    pub fn merge(&mut self, key: &MvccKey, operand: &[u8]) {
        self.push(RecordType::Merge, key.encode().into_vec(), operand.to_vec());
    }

    pub fn delete(&mut self, key: &MvccKey) {
        self.push(RecordType::Delete, key.encode().into_vec(), Vec::new());
    }

    /// Deletes every encoded key in `[start, end)`. A `start` with an empty
    /// raw key is the keyspace start; an `end` with an empty raw key is the
    /// keyspace end.
    pub fn delete_range(&mut self, start: &MvccKey, end: &MvccKey) {
        let bound = |k: &MvccKey| if k.key.is_empty() { Vec::new() } else { k.encode().into_vec() };
        self.push(RecordType::DeleteRange, bound(start), bound(end));
    }

    fn push(&mut self, record_type: RecordType, key: Vec<u8>, value: Vec<u8>) {
        self.record.ops.push(BatchOp { record_type, key, value });
    }

    /// Number of operations in the batch.
    pub fn count(&self) -> usize {
        self.record.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.record.ops.clear();
    }

    pub fn repr(&self) -> Vec<u8> {
        self.record.encode()
    }

    /// Parses a batch representation; the bytes must hold exactly one record
    /// whose keys all decode as MVCC keys. Range deletions may leave either
    /// bound empty.
    pub fn from_repr(repr: &[u8]) -> Result<Self> {
        let record = BatchRecord::decode(repr)?;
        if record.encoded_size() != repr.len() {
            return Err(Error::Corruption(format!(
                "batch repr has {} trailing bytes",
                repr.len() - record.encoded_size()
            )));
        }
        for op in &record.ops {
            match op.record_type {
                RecordType::DeleteRange => {
                    for bound in [&op.key, &op.value] {
                        if !bound.is_empty() {
                            MvccKey::decode(bound)?;
                        }
                    }
                }
                _ => {
                    MvccKey::decode(&op.key)?;
                }
            }
        }
        Ok(WriteBatch { record })
    }

    pub(crate) fn record(&self) -> &BatchRecord {
        &self.record
    }
}
