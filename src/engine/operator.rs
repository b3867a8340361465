use crate::error::{Error, Result};

/// Combines merge operands written to one key.
///
/// Operands are passed oldest first, after the newest put below them (if
/// any). Implementations must be associative; the engine may fold operands
/// at read time or during compaction.
pub trait MergeOperator: Send + Sync {
    fn name(&self) -> &'static str;

    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[Vec<u8>]) -> Result<Vec<u8>>;
}

/// Treats values as little-endian i64 counters and adds them.
///
/// Addition is associative and commutative, so the result does not depend
/// on operand order. This is the default operator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Int64AddOperator;

impl Int64AddOperator {
    fn decode(bytes: &[u8]) -> Result<i64> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| Error::Merge(format!("expected 8-byte counter, got {} bytes", bytes.len())))?;
        Ok(i64::from_le_bytes(arr))
    }
}

impl MergeOperator for Int64AddOperator {
    fn name(&self) -> &'static str {
        "int64add"
    }

    fn full_merge(&self, _key: &[u8], existing: Option<&[u8]>, operands: &[Vec<u8>]) -> Result<Vec<u8>> {
        let mut total = existing.map(Self::decode).transpose()?.unwrap_or(0);
        for operand in operands {
            total = total.wrapping_add(Self::decode(operand)?);
        }
        Ok(total.to_le_bytes().to_vec())
    }
}

/// Concatenates operands onto the existing value in write order.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendOperator;

impl MergeOperator for AppendOperator {
    fn name(&self) -> &'static str {
        "append"
    }

    fn full_merge(&self, _key: &[u8], existing: Option<&[u8]>, operands: &[Vec<u8>]) -> Result<Vec<u8>> {
        let mut out = existing.map(<[u8]>::to_vec).unwrap_or_default();
        for operand in operands {
            out.extend_from_slice(operand);
        }
        Ok(out)
    }
}
