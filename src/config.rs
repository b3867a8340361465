//! Engine configuration.
//!
//! Loaded from YAML or built in code; every field has a default.
//!
//! Example YAML:
//! ```yaml
//! memtable_size_limit: 4194304
//! bloom_false_positive_rate: 0.01
//! wal_dir: "/var/lib/mvcc/wal"
//! compaction_target_size: 2097152
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Memtable size (bytes) at which it is frozen into a segment.
    pub memtable_size_limit: usize,

    /// Target false positive rate of per-segment prefix filters.
    pub bloom_false_positive_rate: f64,

    /// Directory holding the write-ahead log. None disables the WAL.
    pub wal_dir: Option<PathBuf>,

    /// Default target size of one compaction range.
    pub compaction_target_size: u64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            memtable_size_limit: 4 * 1024 * 1024,
            bloom_false_positive_rate: 0.01,
            wal_dir: None,
            compaction_target_size: 2 * 1024 * 1024,
        }
    }
}

impl Options {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let options: Options =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.memtable_size_limit == 0 {
            return Err(Error::Config("memtable_size_limit must be > 0".into()));
        }
        if !(self.bloom_false_positive_rate > 0.0 && self.bloom_false_positive_rate < 1.0) {
            return Err(Error::Config(format!(
                "bloom_false_positive_rate must be in (0, 1), got {}",
                self.bloom_false_positive_rate
            )));
        }
        if self.compaction_target_size == 0 {
            return Err(Error::Config("compaction_target_size must be > 0".into()));
        }
        Ok(())
    }
}
