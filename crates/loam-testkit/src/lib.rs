//! Test support for the loam storage crates.
//!
//! - [`log_replay`]: reads logical records back out of a block-framed log
//! - [`fault_injection`]: sinks that fail on demand
//! - [`generators`]: proptest strategies for keys, records and sequence numbers
//!
//! # Usage
//!
//! ```
//! use loam_log::LogWriter;
//! use loam_testkit::replay;
//!
//! let mut writer = LogWriter::new(Vec::new());
//! writer.append_record(b"hello").unwrap();
//!
//! let (records, report) = replay(writer.get_ref(), loam_log::BLOCK_SIZE);
//! assert_eq!(records, vec![b"hello".to_vec()]);
//! assert!(report.is_clean());
//! ```

pub mod fault_injection;
pub mod generators;
pub mod log_replay;

pub use fault_injection::FaultySink;
pub use generators::{arb_increasing_seqnos, arb_log_records, arb_sorted_entries};
pub use log_replay::{
    physical_records, replay, Corruption, LogReplayer, PhysicalRecord, ReplayReport,
};
