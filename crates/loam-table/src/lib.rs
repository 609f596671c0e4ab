//! Sorted, prefix-compressed blocks for immutable table files.
//!
//! A table file is a run of blocks; this crate owns the block itself:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ entry: shared|unshared|value_len|suffix|value │ ← restart point (shared = 0)
//! │ entry ...                                    │
//! │ entry: shared = 0                            │ ← restart point every K entries
//! │ ...                                          │
//! ├──────────────────────────────────────────────┤
//! │ restart offsets (u32 LE) ...                 │
//! │ restart count (u32 LE)                       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! [`BlockBuilder`] encodes keys added in strictly increasing order under a
//! [`Comparator`](loam_util::Comparator); [`Block`] decodes the result and
//! binary-searches its restart points to seek.
//!
//! # Observability
//!
//! Builders created with [`BlockBuilder::with_config_and_meter`] count
//! `block_entries_added` and emit a `VizEvent::Block` on every `finish`.

pub mod block;
mod config;
mod error;
pub mod format;

pub use block::{Block, BlockBuilder, BlockEntry, BlockIter};
pub use config::BlockConfig;
pub use error::{Result, TableError};
pub use format::{DEFAULT_BLOCK_SIZE, DEFAULT_RESTART_INTERVAL};
