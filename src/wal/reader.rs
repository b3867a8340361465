use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::wal::record::BatchRecord;

/// Reads batch records from a log file for crash recovery.
///
/// Loads the entire file into memory, then iterates record by record.
/// If CRC fails on a record, iteration stops: it was a partial write from
/// a crash. All preceding records are valid.
pub struct WALReader {
    data: Vec<u8>,
}

impl WALReader {
    /// Open a WAL file for reading. A missing file reads as empty.
    pub fn new(path: &Path) -> Result<Self> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(WALReader { data })
    }

    /// Total bytes in the file, valid or not.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> WALIterator<'_> {
        WALIterator { data: &self.data, offset: 0 }
    }
}

/// Iterator over WAL records. Yields records until EOF or corruption;
/// `offset()` is then the length of the valid prefix.
pub struct WALIterator<'a> {
    data: &'a [u8],
    offset: usize,
}

impl WALIterator<'_> {
    pub fn offset(&self) -> u64 {
        self.offset as u64
    }
}

impl Iterator for WALIterator<'_> {
    type Item = BatchRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        match BatchRecord::decode(&self.data[self.offset..]) {
            Ok(record) => {
                self.offset += record.encoded_size();
                Some(record)
            }
            Err(_) => None,
        }
    }
}
