use crate::error::{Error, Result};
use crate::mvcc::key::Timestamp;

/// Transaction record attached to an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnMeta {
    pub id: u128,
    pub epoch: u32,
}

/// The value stored at a metadata (zero-timestamp) key.
///
/// Either an inline value (`raw_bytes`) for unversioned keys, or the
/// description of the newest version of a versioned key. When `txn` is
/// set, that newest version is an intent.
///
/// On-disk format (little-endian):
/// ```text
/// ┌──────────┬──────────┬─────────────┬──────────────┬──────────────┐
/// │ Flags(1B)│ Wall(8B) │ Logical(4B) │ KeyBytes(8B) │ ValBytes(8B) │
/// ├──────────┴──────────┴─────────────┴──────────────┴──────────────┤
/// │ if txn: TxnId(16B) Epoch(4B)                                    │
/// │ if raw: Len(4B) Bytes(var)                                      │
/// └─────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MvccMetadata {
    pub txn: Option<TxnMeta>,
    pub timestamp: Timestamp,
    pub deleted: bool,
    pub key_bytes: i64,
    pub val_bytes: i64,
    pub raw_bytes: Option<Vec<u8>>,
}

const FLAG_TXN: u8 = 0x01;
const FLAG_DELETED: u8 = 0x02;
const FLAG_RAW: u8 = 0x04;

const HEADER_SIZE: usize = 1 + 8 + 4 + 8 + 8;
const TXN_SIZE: usize = 16 + 4;

impl MvccMetadata {
    /// Metadata for an intent whose provisional value is `val_bytes` long.
    pub fn intent(txn: TxnMeta, timestamp: Timestamp, val_bytes: usize) -> Self {
        MvccMetadata {
            txn: Some(txn),
            timestamp,
            deleted: val_bytes == 0,
            key_bytes: crate::mvcc::key::MVCC_VERSION_TIMESTAMP_SIZE,
            val_bytes: val_bytes as i64,
            raw_bytes: None,
        }
    }

    /// Metadata holding an unversioned inline value.
    pub fn inline(value: Vec<u8>) -> Self {
        MvccMetadata { raw_bytes: Some(value), ..Default::default() }
    }

    pub fn is_intent(&self) -> bool {
        self.txn.is_some()
    }

    pub fn is_inline(&self) -> bool {
        self.raw_bytes.is_some()
    }

    pub fn encode(&self) -> Vec<u8> {
        let raw_len = self.raw_bytes.as_ref().map_or(0, |r| 4 + r.len());
        let txn_len = if self.txn.is_some() { TXN_SIZE } else { 0 };
        let mut buf = Vec::with_capacity(HEADER_SIZE + txn_len + raw_len);

        let mut flags = 0u8;
        if self.txn.is_some() {
            flags |= FLAG_TXN;
        }
        if self.deleted {
            flags |= FLAG_DELETED;
        }
        if self.raw_bytes.is_some() {
            flags |= FLAG_RAW;
        }
        buf.push(flags);
        buf.extend_from_slice(&self.timestamp.wall_time.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.logical.to_le_bytes());
        buf.extend_from_slice(&self.key_bytes.to_le_bytes());
        buf.extend_from_slice(&self.val_bytes.to_le_bytes());

        if let Some(txn) = &self.txn {
            buf.extend_from_slice(&txn.id.to_le_bytes());
            buf.extend_from_slice(&txn.epoch.to_le_bytes());
        }
        if let Some(raw) = &self.raw_bytes {
            buf.extend_from_slice(&(raw.len() as u32).to_le_bytes());
            buf.extend_from_slice(raw);
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Corruption("metadata too short".into()));
        }
        let flags = data[0];
        if flags & !(FLAG_TXN | FLAG_DELETED | FLAG_RAW) != 0 {
            return Err(Error::Corruption(format!("invalid metadata flags: {flags:#x}")));
        }
        let wall_time = i64::from_le_bytes(read_array(data, 1)?);
        let logical = i32::from_le_bytes(read_array(data, 9)?);
        let key_bytes = i64::from_le_bytes(read_array(data, 13)?);
        let val_bytes = i64::from_le_bytes(read_array(data, 21)?);
        let mut offset = HEADER_SIZE;

        let txn = if flags & FLAG_TXN != 0 {
            let id = u128::from_le_bytes(read_array(data, offset)?);
            let epoch = u32::from_le_bytes(read_array(data, offset + 16)?);
            offset += TXN_SIZE;
            Some(TxnMeta { id, epoch })
        } else {
            None
        };

        let raw_bytes = if flags & FLAG_RAW != 0 {
            let len = u32::from_le_bytes(read_array(data, offset)?) as usize;
            offset += 4;
            let raw = data
                .get(offset..offset + len)
                .ok_or_else(|| Error::Corruption("metadata raw bytes truncated".into()))?;
            offset += len;
            Some(raw.to_vec())
        } else {
            None
        };

        if offset != data.len() {
            return Err(Error::Corruption("trailing bytes after metadata".into()));
        }

        Ok(MvccMetadata {
            txn,
            timestamp: Timestamp::new(wall_time, logical),
            deleted: flags & FLAG_DELETED != 0,
            key_bytes,
            val_bytes,
            raw_bytes,
        })
    }
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| Error::Corruption("metadata truncated".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_roundtrip() {
        let meta = MvccMetadata::intent(TxnMeta { id: 0xdead_beef, epoch: 2 }, Timestamp::new(10, 1), 5);
        let decoded = MvccMetadata::decode(&meta.encode()).unwrap();
        assert_eq!(decoded, meta);
        assert!(decoded.is_intent());
    }

    #[test]
    fn inline_roundtrip() {
        let meta = MvccMetadata::inline(b"hello".to_vec());
        let decoded = MvccMetadata::decode(&meta.encode()).unwrap();
        assert_eq!(decoded.raw_bytes.as_deref(), Some(b"hello".as_slice()));
        assert!(!decoded.is_intent());
    }

    #[test]
    fn truncated_metadata_rejected() {
        let enc = MvccMetadata::inline(b"hello".to_vec()).encode();
        assert!(matches!(MvccMetadata::decode(&enc[..enc.len() - 1]), Err(Error::Corruption(_))));
        assert!(MvccMetadata::decode(&[0u8; 4]).is_err());
    }

    #[test]
    fn unknown_flags_rejected() {
        let mut enc = MvccMetadata::default().encode();
        enc[0] = 0x80;
        assert!(MvccMetadata::decode(&enc).is_err());
    }
}
