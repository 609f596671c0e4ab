//! Leaf primitives shared by every loam crate.
//!
//! - [`coding`]: fixed-width and varint integer encoding, length-prefixed slices
//! - [`arena`]: bump allocator handing out index-checked [`ArenaSlice`] handles
//! - [`comparator`]: the [`Comparator`] trait and the byte-wise default
//! - [`cache`]: sharded, charge-bounded LRU cache
//!
//! # Example
//!
//! ```
//! use loam_util::coding::{get_varint64, put_varint64, varint_length};
//! use loam_util::{bytewise_comparator, Arena};
//!
//! let mut buf = Vec::new();
//! put_varint64(&mut buf, 300);
//! assert_eq!(buf.len(), varint_length(300));
//! let mut input = &buf[..];
//! assert_eq!(get_varint64(&mut input).unwrap(), 300);
//!
//! let mut arena = Arena::new();
//! let key = arena.allocate_copy(b"key");
//! assert_eq!(arena.get(key), b"key");
//!
//! let cmp = bytewise_comparator();
//! let mut start = b"abcdefg".to_vec();
//! cmp.find_shortest_separator(&mut start, b"abzzz");
//! assert_eq!(start, b"abd");
//! ```

pub mod arena;
pub mod cache;
pub mod coding;
pub mod comparator;
mod error;

pub use arena::{Arena, ArenaConfig, ArenaSlice, ChunkKind, ARENA_ALIGN, ARENA_BLOCK_SIZE};
pub use cache::{CacheConfig, ShardedLruCache};
pub use comparator::{
    bytewise_comparator, BytewiseComparator, Comparator, ReverseBytewiseComparator,
};
pub use error::{CodingError, Error, Result};
