use crate::error::{Error, Result};

/// Operation type stored in a batch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Put = 0x01,
    Delete = 0x02,
    Merge = 0x03,
    DeleteRange = 0x04,
}

impl RecordType {
    fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(RecordType::Put),
            0x02 => Ok(RecordType::Delete),
            0x03 => Ok(RecordType::Merge),
            0x04 => Ok(RecordType::DeleteRange),
            _ => Err(Error::Corruption(format!("invalid record type: {}", byte))),
        }
    }
}

/// One mutation inside a batch. Keys are encoded MVCC keys; for
/// DeleteRange the value holds the encoded end key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOp {
    pub record_type: RecordType,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl BatchOp {
    fn encoded_size(&self) -> usize {
        OP_HEADER_SIZE + self.key.len() + self.value.len()
    }
}

/// An atomic group of mutations: the unit written to the WAL and the
/// byte representation of a write batch.
///
/// On-disk format:
/// ```text
/// ┌──────────┬─────────┬───────────┬─────────────────────────────────┐
/// │ CRC (4B) │ Len (4B)│ Count (4B)│ Ops ...                         │
/// └──────────┴─────────┴───────────┴─────────────────────────────────┘
/// Op: [Type(1B)][Key Len(4B)][Key][Val Len(4B)][Val]
/// ```
///
/// CRC covers everything after the CRC field itself. A record that fails
/// the CRC was a partial write: WAL recovery stops there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRecord {
    pub ops: Vec<BatchOp>,
}

// Header sizes
const CRC_SIZE: usize = 4;
const LEN_SIZE: usize = 4;
const COUNT_SIZE: usize = 4;
const HEADER_SIZE: usize = CRC_SIZE + LEN_SIZE + COUNT_SIZE;
const OP_HEADER_SIZE: usize = 1 + 4 + 4;

impl BatchRecord {
    pub fn encode(&self) -> Vec<u8> {
        let payload_len = COUNT_SIZE + self.ops.iter().map(BatchOp::encoded_size).sum::<usize>();
        let mut buf = Vec::with_capacity(CRC_SIZE + LEN_SIZE + payload_len);

        // Reserve space for CRC (filled at the end)
        buf.extend_from_slice(&[0u8; CRC_SIZE]);
        buf.extend_from_slice(&(payload_len as u32).to_le_bytes());
        buf.extend_from_slice(&(self.ops.len() as u32).to_le_bytes());

        for op in &self.ops {
            buf.push(op.record_type as u8);
            buf.extend_from_slice(&(op.key.len() as u32).to_le_bytes());
            buf.extend_from_slice(&op.key);
            buf.extend_from_slice(&(op.value.len() as u32).to_le_bytes());
            buf.extend_from_slice(&op.value);
        }

        let crc = crc32fast::hash(&buf[CRC_SIZE..]);
        buf[0..CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Deserialize a record from the front of `data`. Returns error if the
    /// CRC doesn't match or the op layout is inconsistent.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Corruption("record too short".into()));
        }

        let stored_crc = read_u32(data, 0)?;
        let payload_len = read_u32(data, CRC_SIZE)? as usize;
        let total_len = CRC_SIZE + LEN_SIZE + payload_len;
        if data.len() < total_len {
            return Err(Error::Corruption("record truncated".into()));
        }

        let computed_crc = crc32fast::hash(&data[CRC_SIZE..total_len]);
        if stored_crc != computed_crc {
            return Err(Error::Corruption("CRC mismatch".into()));
        }

        let count = read_u32(data, CRC_SIZE + LEN_SIZE)? as usize;
        let body = &data[..total_len];
        let mut offset = HEADER_SIZE;
        let mut ops = Vec::with_capacity(count.min(payload_len / OP_HEADER_SIZE + 1));
        for _ in 0..count {
            let record_type = RecordType::from_u8(*body.get(offset).ok_or_else(op_truncated)?)?;
            offset += 1;
            let key = read_bytes(body, &mut offset)?;
            let value = read_bytes(body, &mut offset)?;
            ops.push(BatchOp { record_type, key, value });
        }
        if offset != total_len {
            return Err(Error::Corruption("trailing bytes in record".into()));
        }

        Ok(BatchRecord { ops })
    }

    /// Size of this record when serialized.
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.ops.iter().map(BatchOp::encoded_size).sum::<usize>()
    }
}

fn op_truncated() -> Error {
    Error::Corruption("op exceeds record".into())
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = data.get(offset..offset + 4).ok_or_else(op_truncated)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_bytes(data: &[u8], offset: &mut usize) -> Result<Vec<u8>> {
    let len = read_u32(data, *offset)? as usize;
    *offset += 4;
    let bytes = data.get(*offset..*offset + len).ok_or_else(op_truncated)?;
    *offset += len;
    Ok(bytes.to_vec())
}
