use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;
use crate::wal::record::BatchRecord;

/// Appends committed batches to the log file.
///
/// Two layers of buffering:
///   BufWriter.flush()  → Rust buffer → OS page cache
///   file.sync_all()    → OS page cache → physical disk
///
/// Every append reaches the page cache before the batch becomes visible;
/// only `sync` commits wait for the disk.
pub struct WALWriter {
    writer: BufWriter<File>,
    offset: u64,
}

impl WALWriter {
    /// Open the log at `path`, truncating anything past `valid_len` (a torn
    /// tail left by a crash), and position at the end.
    pub fn open(path: &Path, valid_len: u64) -> Result<Self> {
        let mut file = OpenOptions::new().create(true).write(true).truncate(false).open(path)?;
        file.set_len(valid_len)?;
        file.seek(SeekFrom::End(0))?;
        Ok(WALWriter { writer: BufWriter::new(file), offset: valid_len })
    }

    pub fn append(&mut self, record: &BatchRecord, sync: bool) -> Result<()> {
        let encoded = record.encode();
        self.writer.write_all(&encoded)?;
        self.writer.flush()?;
        self.offset += encoded.len() as u64;
        if sync {
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Force fsync to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Current file offset (bytes written so far).
    pub fn offset(&self) -> u64 {
        self.offset
    }
}
