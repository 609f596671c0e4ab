//! Block-framed, checksummed append-only log.
//!
//! Implements the write side of the log used for write-ahead durability:
//! - Fixed-size blocks (32 KiB by default) holding back-to-back physical records
//! - Masked CRC32C over each record's type byte and payload
//! - Fragmentation of large records into `First`/`Middle`/`Last` pieces
//! - Zero-filled block tails so a header never crosses a block boundary
//! - Flush after every physical record, optional sync per logical record
//! - Observability via loam-observe
//!
//! Replay is the reader's job and lives outside this crate.
//!
//! # Example
//!
//! ```no_run
//! use loam_log::{FileSink, LogConfig, LogWriter};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sink = FileSink::create("000001.log")?;
//!     let config = LogConfig {
//!         sync_on_append: true,
//!         ..Default::default()
//!     };
//!     let mut writer = LogWriter::with_config(sink, config)?;
//!
//!     writer.append_record(b"put key value")?;
//!     writer.append_record(&vec![0u8; 100_000])?; // spans several blocks
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
pub mod format;
mod sink;
mod writer;

pub use config::LogConfig;
pub use error::{LogError, Result};
pub use format::{RecordType, BLOCK_SIZE, HEADER_SIZE};
pub use sink::{FileSink, WritableFile};
pub use writer::LogWriter;
