//! Engine-level primitives of the loam storage engine.
//!
//! - [`SequenceNumber`] and [`SequenceCounter`]: the global write order
//! - [`SnapshotList`] and [`Snapshot`]: live read snapshots, oldest first
//! - [`Options`]: per-component configuration plus the key comparator, with
//!   constructors for the log writer, block builder, arena and cache
//!
//! # Example
//!
//! ```
//! use loam_db::{Options, SequenceCounter};
//!
//! let options = Options::default();
//! options.validate().unwrap();
//!
//! let seq = SequenceCounter::default();
//! let mut snapshots = options.snapshot_list();
//!
//! let s1 = snapshots.create(seq.next().unwrap());
//! let s2 = snapshots.create(seq.next().unwrap());
//! assert_eq!(snapshots.oldest(), Some(s1.sequence_number()));
//!
//! snapshots.release(s1);
//! assert_eq!(snapshots.oldest(), Some(s2.sequence_number()));
//! snapshots.release(s2);
//! assert!(snapshots.is_empty());
//! ```

mod error;
mod options;
pub mod sequence;
pub mod snapshot;

pub use error::{Error, Result};
pub use options::Options;
pub use sequence::{SequenceCounter, SequenceNumber};
pub use snapshot::{Snapshot, SnapshotList};
