pub mod reader;
pub mod record;
pub mod writer;

pub use reader::WALReader;
pub use record::{BatchOp, BatchRecord, RecordType};
pub use writer::WALWriter;

/// File name of the log inside `Options::wal_dir`.
pub const WAL_FILE_NAME: &str = "engine.wal";
