//! Bump-pointer arena for allocations that share one lifetime.
//!
//! The arena owns a list of heap chunks and hands out [`ArenaSlice`] handles
//! instead of raw addresses. A handle names a chunk by index plus a byte range,
//! so growing the chunk list never moves or invalidates earlier allocations.
//! Nothing is freed until the arena itself is dropped.
//!
//! Small requests are bumped out of the current pooled chunk. Requests larger
//! than a quarter of the pooled chunk size get a standalone chunk of their own,
//! which bounds the tail space wasted when a pooled chunk is abandoned.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::alloc::{self, Layout};
use std::mem;
use std::ptr::NonNull;

/// Default size of a pooled chunk.
pub const ARENA_BLOCK_SIZE: usize = 4096;

/// Alignment guaranteed by [`Arena::allocate_aligned`].
pub const ARENA_ALIGN: usize = if mem::size_of::<usize>() > 8 {
    mem::size_of::<usize>()
} else {
    8
};

const _: () = assert!(ARENA_ALIGN.is_power_of_two());

/// Arena sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Size of each pooled chunk in bytes (default: 4096).
    pub block_size: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            block_size: ARENA_BLOCK_SIZE,
        }
    }
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size < 64 {
            return Err(Error::InvalidConfig(format!(
                "arena block_size ({}) must be at least 64 bytes",
                self.block_size
            )));
        }
        if self.block_size % ARENA_ALIGN != 0 {
            return Err(Error::InvalidConfig(format!(
                "arena block_size ({}) must be a multiple of {}",
                self.block_size, ARENA_ALIGN
            )));
        }
        Ok(())
    }

    /// Requests above this size bypass the pooled chunks.
    fn standalone_threshold(&self) -> usize {
        self.block_size / 4
    }
}

/// Handle to bytes allocated from an [`Arena`].
///
/// Only meaningful for the arena that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaSlice {
    chunk: usize,
    offset: usize,
    len: usize,
}

impl ArenaSlice {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// How a chunk was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Shared chunk that small allocations are bumped out of.
    Pooled,
    /// Dedicated chunk holding exactly one oversized allocation.
    Standalone,
}

/// Zero-initialised heap memory aligned to [`ARENA_ALIGN`].
struct Chunk {
    ptr: NonNull<u8>,
    layout: Layout,
    kind: ChunkKind,
}

// Chunk exclusively owns its allocation; shared access only ever yields `&[u8]`.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    fn new(size: usize, kind: ChunkKind) -> Self {
        let layout = match Layout::from_size_align(size, ARENA_ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("arena chunk of {} bytes exceeds the address space", size),
        };
        // SAFETY: size > 0 is guaranteed by Arena::allocate's precondition and
        // the validated pooled block size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = match NonNull::new(raw) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(layout),
        };
        Self { ptr, layout, kind }
    }

    fn len(&self) -> usize {
        self.layout.size()
    }

    fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    fn bytes(&self) -> &[u8] {
        // SAFETY: ptr covers layout.size() initialised bytes for the chunk's lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: allocated in Chunk::new with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Bump allocator. See the module docs.
pub struct Arena {
    config: ArenaConfig,
    chunks: Vec<Chunk>,
    /// Pooled chunk currently being bumped, if any.
    current: Option<usize>,
    cursor: usize,
    remaining: usize,
    chunks_memory: usize,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    /// Creates an arena with 4 KiB pooled chunks. No memory is taken until the
    /// first allocation.
    pub fn new() -> Self {
        Self {
            config: ArenaConfig::default(),
            chunks: Vec::new(),
            current: None,
            cursor: 0,
            remaining: 0,
            chunks_memory: 0,
        }
    }

    pub fn with_config(config: ArenaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Allocates `bytes` bytes with no alignment guarantee.
    ///
    /// # Panics
    ///
    /// Zero-byte allocations are a caller bug and panic.
    pub fn allocate(&mut self, bytes: usize) -> ArenaSlice {
        assert!(bytes > 0, "zero-byte arena allocation");
        if bytes <= self.remaining {
            return self.bump(0, bytes);
        }
        self.allocate_fallback(bytes)
    }

    /// Allocates `bytes` bytes starting on an [`ARENA_ALIGN`] boundary.
    pub fn allocate_aligned(&mut self, bytes: usize) -> ArenaSlice {
        assert!(bytes > 0, "zero-byte arena allocation");
        let slop = match self.current {
            Some(idx) => {
                let current_mod = (self.chunks[idx].addr() + self.cursor) & (ARENA_ALIGN - 1);
                if current_mod == 0 {
                    0
                } else {
                    ARENA_ALIGN - current_mod
                }
            }
            None => 0,
        };

        let slice = match bytes.checked_add(slop) {
            Some(needed) if needed <= self.remaining => self.bump(slop, bytes),
            // Fresh chunks come from the system allocator already aligned.
            _ => self.allocate_fallback(bytes),
        };
        debug_assert_eq!(self.addr_of(slice) & (ARENA_ALIGN - 1), 0);
        slice
    }

    /// Allocates a copy of `data` and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics if `data` is empty.
    pub fn allocate_copy(&mut self, data: &[u8]) -> ArenaSlice {
        let slice = self.allocate(data.len());
        self.get_mut(slice).copy_from_slice(data);
        slice
    }

    /// Borrows the bytes behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not describe a range inside this arena.
    pub fn get(&self, slice: ArenaSlice) -> &[u8] {
        let chunk = self.checked_chunk(slice);
        &chunk.bytes()[slice.offset..slice.offset + slice.len]
    }

    pub fn get_mut(&mut self, slice: ArenaSlice) -> &mut [u8] {
        self.checked_chunk(slice);
        &mut self.chunks[slice.chunk].bytes_mut()[slice.offset..slice.offset + slice.len]
    }

    /// Kind of the chunk backing a handle.
    pub fn chunk_kind(&self, slice: ArenaSlice) -> ChunkKind {
        self.checked_chunk(slice).kind
    }

    /// Bytes obtained from the system allocator, including bookkeeping.
    ///
    /// This is an accounting figure, not the number of live bytes handed out.
    pub fn memory_usage(&self) -> usize {
        self.chunks_memory + self.chunks.capacity() * mem::size_of::<Chunk>()
    }

    /// Number of chunks taken from the system allocator.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn bump(&mut self, slop: usize, bytes: usize) -> ArenaSlice {
        let chunk = match self.current {
            Some(idx) => idx,
            None => unreachable!("remaining > 0 without a current chunk"),
        };
        let slice = ArenaSlice {
            chunk,
            offset: self.cursor + slop,
            len: bytes,
        };
        self.cursor += slop + bytes;
        self.remaining -= slop + bytes;
        slice
    }

    fn allocate_fallback(&mut self, bytes: usize) -> ArenaSlice {
        if bytes > self.config.standalone_threshold() {
            // Keep the current pooled chunk; its tail is still usable.
            let chunk = self.new_chunk(bytes, ChunkKind::Standalone);
            tracing::trace!(bytes, chunk, "arena standalone chunk");
            return ArenaSlice {
                chunk,
                offset: 0,
                len: bytes,
            };
        }

        // The tail of the current chunk is abandoned.
        let chunk = self.new_chunk(self.config.block_size, ChunkKind::Pooled);
        self.current = Some(chunk);
        self.cursor = 0;
        self.remaining = self.config.block_size;
        self.bump(0, bytes)
    }

    fn new_chunk(&mut self, size: usize, kind: ChunkKind) -> usize {
        self.chunks.push(Chunk::new(size, kind));
        self.chunks_memory += size;
        self.chunks.len() - 1
    }

    fn checked_chunk(&self, slice: ArenaSlice) -> &Chunk {
        let chunk = match self.chunks.get(slice.chunk) {
            Some(chunk) => chunk,
            None => panic!("arena handle refers to unknown chunk {}", slice.chunk),
        };
        assert!(
            slice.offset + slice.len <= chunk.len(),
            "arena handle {:?} out of chunk bounds ({} bytes)",
            slice,
            chunk.len()
        );
        chunk
    }

    fn addr_of(&self, slice: ArenaSlice) -> usize {
        self.chunks[slice.chunk].addr() + slice.offset
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("block_size", &self.config.block_size)
            .field("chunks", &self.chunks.len())
            .field("remaining", &self.remaining)
            .field("memory_usage", &self.memory_usage())
            .finish()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_aligned_allocations_are_aligned_and_disjoint(
            sizes in prop::collection::vec(1usize..3000, 1..200),
        ) {
            let mut arena = Arena::new();
            let mut ranges = Vec::new();
            let mut total = 0usize;

            for size in sizes {
                let handle = arena.allocate_aligned(size);
                let start = arena.get(handle).as_ptr() as usize;
                prop_assert_eq!(start % ARENA_ALIGN, 0);
                prop_assert_eq!(handle.len(), size);
                ranges.push((start, start + size));
                total += size;
            }

            prop_assert!(arena.memory_usage() >= total);
            ranges.sort_unstable();
            for pair in ranges.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
            }
        }
    }
}
