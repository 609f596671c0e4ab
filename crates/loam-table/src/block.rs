//! Block encoding/decoding with restart points for prefix compression.
//!
//! See [`crate::format`] for the byte layout. [`BlockBuilder`] produces a
//! block from keys added in strictly increasing comparator order; [`Block`]
//! parses one back and [`BlockIter`] walks or seeks its entries.

use crate::config::BlockConfig;
use crate::error::{Result, TableError};
use crate::format::{MIN_BLOCK_LEN, RESTART_ENTRY_SIZE};
use bytes::{Bytes, BytesMut};
use loam_observe::{obs_count, BlockEvt, BlockKind, Meter, NoopMeter, VizEvent};
use loam_util::coding::{decode_fixed32, get_varint32, put_fixed32, put_varint32};
use loam_util::comparator::{common_prefix_len, Comparator};
use std::cmp::Ordering;
use std::sync::Arc;

/// Builder for creating blocks with prefix compression.
///
/// # Example
///
/// ```
/// use loam_table::{Block, BlockBuilder};
/// use loam_util::bytewise_comparator;
///
/// let mut builder = BlockBuilder::new(16, bytewise_comparator());
/// builder.add(b"apple", b"red");
/// builder.add(b"apricot", b"orange");
/// let data = bytes::Bytes::copy_from_slice(builder.finish());
///
/// let block = Block::new(data, bytewise_comparator()).unwrap();
/// assert_eq!(block.get(b"apricot").unwrap().as_deref(), Some(&b"orange"[..]));
/// ```
pub struct BlockBuilder {
    buffer: BytesMut,
    restarts: Vec<u32>,
    restart_interval: usize,
    /// Entries emitted since the last restart point.
    counter: usize,
    last_key: Vec<u8>,
    entry_count: usize,
    finished: bool,
    comparator: Arc<dyn Comparator>,
    meter: Arc<dyn Meter>,
}

impl BlockBuilder {
    /// Creates a builder placing a restart point every `restart_interval` entries.
    ///
    /// # Panics
    ///
    /// If `restart_interval` is zero.
    pub fn new(restart_interval: usize, comparator: Arc<dyn Comparator>) -> Self {
        assert!(restart_interval >= 1, "restart_interval must be >= 1");
        Self::build(restart_interval, comparator, Arc::new(NoopMeter))
    }

    pub fn with_config(config: &BlockConfig, comparator: Arc<dyn Comparator>) -> Result<Self> {
        Self::with_config_and_meter(config, comparator, Arc::new(NoopMeter))
    }

    pub fn with_config_and_meter(
        config: &BlockConfig,
        comparator: Arc<dyn Comparator>,
        meter: Arc<dyn Meter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config.restart_interval, comparator, meter))
    }

    fn build(
        restart_interval: usize,
        comparator: Arc<dyn Comparator>,
        meter: Arc<dyn Meter>,
    ) -> Self {
        Self {
            buffer: BytesMut::new(),
            restarts: vec![0],
            restart_interval,
            counter: 0,
            last_key: Vec::new(),
            entry_count: 0,
            finished: false,
            comparator,
            meter,
        }
    }

    /// Appends an entry.
    ///
    /// # Panics
    ///
    /// If the block was finished without a `reset`, or if `key` does not sort
    /// strictly after the previously added key.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(!self.finished, "add called on a finished block");
        assert!(self.counter <= self.restart_interval);
        assert!(
            self.entry_count == 0
                || self.comparator.compare(key, &self.last_key) == Ordering::Greater,
            "keys must be added in strictly increasing order ({:?} after {:?})",
            key,
            self.last_key
        );

        let shared = if self.counter < self.restart_interval {
            common_prefix_len(&self.last_key, key)
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
            0
        };
        let unshared = key.len() - shared;

        put_varint32(&mut self.buffer, shared as u32);
        put_varint32(&mut self.buffer, unshared as u32);
        put_varint32(&mut self.buffer, value.len() as u32);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        // Reuse the previous key's allocation.
        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        debug_assert_eq!(self.last_key, key);

        self.counter += 1;
        self.entry_count += 1;
        obs_count!(self.meter, "block_entries_added", &[], 1);
    }

    /// Appends the restart trailer and returns the complete block.
    ///
    /// The returned bytes stay valid until the next [`reset`](Self::reset).
    ///
    /// # Panics
    ///
    /// If called twice without an intervening `reset`.
    pub fn finish(&mut self) -> &[u8] {
        assert!(!self.finished, "finish called twice without reset");

        for &restart in &self.restarts {
            put_fixed32(&mut self.buffer, restart);
        }
        put_fixed32(&mut self.buffer, self.restarts.len() as u32);
        self.finished = true;

        tracing::trace!(
            entries = self.entry_count,
            restarts = self.restarts.len(),
            bytes = self.buffer.len(),
            "block finished"
        );
        self.meter.emit(VizEvent::Block(BlockEvt {
            kind: BlockKind::Finished {
                entries: self.entry_count,
                restarts: self.restarts.len(),
                bytes: self.buffer.len(),
            },
        }));

        &self.buffer
    }

    /// Size in bytes `finish()` would produce right now.
    pub fn current_size_estimate(&self) -> usize {
        if self.finished {
            return self.buffer.len();
        }
        self.buffer.len() + self.restarts.len() * RESTART_ENTRY_SIZE + RESTART_ENTRY_SIZE
    }

    /// Clears all state so the builder can produce another block.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.last_key.clear();
        self.entry_count = 0;
        self.finished = false;
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Returns the number of entries added so far.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Most recently added key; empty before the first `add`.
    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }

    pub fn restart_interval(&self) -> usize {
        self.restart_interval
    }
}

/// One decoded entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub key: Bytes,
    pub value: Bytes,
}

/// A parsed block.
#[derive(Clone)]
pub struct Block {
    data: Bytes,
    /// Offset of the restart array; entries occupy `data[..restarts_offset]`.
    restarts_offset: usize,
    num_restarts: usize,
    comparator: Arc<dyn Comparator>,
}

impl Block {
    /// Parses the restart trailer of `data`.
    pub fn new(data: Bytes, comparator: Arc<dyn Comparator>) -> Result<Self> {
        if data.len() < MIN_BLOCK_LEN {
            return Err(TableError::Corruption(format!(
                "block of {} bytes has no restart count",
                data.len()
            )));
        }

        let num_restarts = decode_fixed32(&data[data.len() - RESTART_ENTRY_SIZE..]) as usize;
        let max_restarts = (data.len() - RESTART_ENTRY_SIZE) / RESTART_ENTRY_SIZE;
        if num_restarts > max_restarts {
            return Err(TableError::Corruption(format!(
                "restart count {} exceeds block capacity {}",
                num_restarts, max_restarts
            )));
        }
        let restarts_offset = data.len() - (1 + num_restarts) * RESTART_ENTRY_SIZE;

        Ok(Self {
            data,
            restarts_offset,
            num_restarts,
            comparator,
        })
    }

    /// Total encoded size including the trailer.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn num_restarts(&self) -> usize {
        self.num_restarts
    }

    /// Offset of restart point `index`.
    pub fn restart_point(&self, index: usize) -> u32 {
        assert!(index < self.num_restarts);
        decode_fixed32(&self.data[self.restarts_offset + index * RESTART_ENTRY_SIZE..])
    }

    /// Returns an iterator positioned before the first entry.
    pub fn iter(&self) -> BlockIter<'_> {
        BlockIter {
            block: self,
            offset: 0,
            last_key: Vec::new(),
            pending: None,
        }
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let mut iter = self.iter();
        iter.seek(key)?;
        match iter.try_next()? {
            Some(entry) if self.comparator.compare(&entry.key, key) == Ordering::Equal => {
                Ok(Some(entry.value))
            }
            _ => Ok(None),
        }
    }

    /// Decodes every entry in order.
    pub fn entries(&self) -> Result<Vec<BlockEntry>> {
        let mut iter = self.iter();
        let mut entries = Vec::new();
        while let Some(entry) = iter.try_next()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Decodes the entry at `offset`, whose shared prefix comes from
    /// `last_key`. Returns the entry and the offset just past it.
    fn decode_entry(&self, offset: usize, last_key: &[u8]) -> Result<(BlockEntry, usize)> {
        let mut input = &self.data[offset..self.restarts_offset];
        let shared = get_varint32(&mut input)? as usize;
        let unshared = get_varint32(&mut input)? as usize;
        let value_len = get_varint32(&mut input)? as usize;

        if shared > last_key.len() {
            return Err(TableError::Corruption(format!(
                "shared length {} exceeds previous key length {}",
                shared,
                last_key.len()
            )));
        }
        if input.len() < unshared + value_len {
            return Err(TableError::Corruption(format!(
                "entry at offset {} overruns the restart array",
                offset
            )));
        }

        let key_start = self.restarts_offset - input.len();
        let value_start = key_start + unshared;
        let key = if shared == 0 {
            self.data.slice(key_start..value_start)
        } else {
            let mut key = Vec::with_capacity(shared + unshared);
            key.extend_from_slice(&last_key[..shared]);
            key.extend_from_slice(&self.data[key_start..value_start]);
            Bytes::from(key)
        };
        let value = self.data.slice(value_start..value_start + value_len);

        Ok((BlockEntry { key, value }, value_start + value_len))
    }

    /// Key stored at restart point `index`.
    fn restart_key(&self, index: usize) -> Result<Bytes> {
        let offset = self.restart_point(index) as usize;
        if offset >= self.restarts_offset {
            return Err(TableError::Corruption(format!(
                "restart point {} at offset {} is past the entries",
                index, offset
            )));
        }
        let mut input = &self.data[offset..self.restarts_offset];
        if get_varint32(&mut input)? != 0 {
            return Err(TableError::Corruption(
                "restart point must have shared_len=0".to_string(),
            ));
        }
        let (entry, _) = self.decode_entry(offset, &[])?;
        Ok(entry.key)
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("size", &self.data.len())
            .field("num_restarts", &self.num_restarts)
            .field("comparator", &self.comparator.name())
            .finish()
    }
}

/// Iterator over entries in a block.
pub struct BlockIter<'a> {
    block: &'a Block,
    offset: usize,
    last_key: Vec<u8>,
    /// Entry found by `seek` and not yet returned.
    pending: Option<BlockEntry>,
}

impl<'a> BlockIter<'a> {
    /// Returns the next entry.
    ///
    /// `Ok(None)` once the entries are exhausted; `Err` on malformed input,
    /// after which the iterator should be abandoned.
    pub fn try_next(&mut self) -> Result<Option<BlockEntry>> {
        if let Some(entry) = self.pending.take() {
            return Ok(Some(entry));
        }
        if self.offset >= self.block.restarts_offset {
            return Ok(None);
        }

        let (entry, next) = self.block.decode_entry(self.offset, &self.last_key)?;
        self.offset = next;
        self.last_key.clear();
        self.last_key.extend_from_slice(&entry.key);
        Ok(Some(entry))
    }

    /// Positions the iterator so the next `try_next` yields the first entry
    /// whose key is `>= target`.
    ///
    /// Binary-searches the restart points for the last one whose key is
    /// below `target`, then scans forward from there.
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.pending = None;
        let block = self.block;
        let cmp = &block.comparator;

        let num_restarts = block.num_restarts;
        if num_restarts == 0 {
            self.offset = block.restarts_offset;
            return Ok(());
        }

        let mut left = 0;
        let mut right = num_restarts - 1;
        while left < right {
            let mid = (left + right + 1) / 2;
            let key = block.restart_key(mid)?;
            if cmp.compare(&key, target) == Ordering::Less {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.offset = block.restart_point(left) as usize;
        self.last_key.clear();
        while let Some(entry) = self.try_next()? {
            if cmp.compare(&entry.key, target) != Ordering::Less {
                self.pending = Some(entry);
                break;
            }
        }
        Ok(())
    }

    /// Repositions before the first entry.
    pub fn seek_to_first(&mut self) {
        self.pending = None;
        self.offset = 0;
        self.last_key.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_observe::RecordingMeter;
    use loam_util::comparator::{bytewise_comparator, ReverseBytewiseComparator};

    fn finish_block(builder: &mut BlockBuilder) -> Block {
        let data = Bytes::copy_from_slice(builder.finish());
        Block::new(data, builder.comparator.clone()).unwrap()
    }

    #[test]
    fn test_restart_interval_two_layout() {
        let mut builder = BlockBuilder::new(2, bytewise_comparator());
        builder.add(b"a", b"1");
        builder.add(b"ab", b"2");
        let offset2 = builder.buffer.len() as u32;
        builder.add(b"abc", b"3");
        builder.add(b"b", b"4");

        let data = builder.finish().to_vec();
        let trailer = &data[data.len() - 12..];
        assert_eq!(decode_fixed32(&trailer[0..]), 0);
        assert_eq!(decode_fixed32(&trailer[4..]), offset2);
        assert_eq!(decode_fixed32(&trailer[8..]), 2);

        // a: (0,1,1) "a" "1"; ab: (1,1,1) "b" "2"; abc restarts: (0,3,1).
        assert_eq!(&data[..5], &[0, 1, 1, b'a', b'1']);
        assert_eq!(&data[5..10], &[1, 1, 1, b'b', b'2']);
        assert_eq!(offset2, 10);
        assert_eq!(&data[10..17], &[0, 3, 1, b'a', b'b', b'c', b'3']);
        assert_eq!(&data[17..22], &[0, 1, 1, b'b', b'4']);
    }

    #[test]
    fn test_single_entry() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        builder.add(b"key1", b"value1");
        let block = finish_block(&mut builder);

        assert_eq!(block.num_restarts(), 1);
        assert_eq!(block.get(b"key1").unwrap().as_deref(), Some(&b"value1"[..]));
        assert_eq!(block.get(b"key0").unwrap(), None);
        assert_eq!(block.get(b"key2").unwrap(), None);
    }

    #[test]
    fn test_multiple_entries_lookup() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        for i in 0..100 {
            let key = format!("key{:03}", i);
            let value = format!("value{:03}", i);
            builder.add(key.as_bytes(), value.as_bytes());
        }
        let block = finish_block(&mut builder);
        assert_eq!(block.num_restarts(), 7);

        for i in 0..100 {
            let key = format!("key{:03}", i);
            let expected = format!("value{:03}", i);
            let found = block.get(key.as_bytes()).unwrap().unwrap();
            assert_eq!(found.as_ref(), expected.as_bytes());
        }
        assert!(block.get(b"key999").unwrap().is_none());
    }

    #[test]
    fn test_block_iterator() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        let entries: Vec<(&[u8], &[u8])> = vec![
            (&b"apple"[..], &b"red"[..]),
            (&b"banana"[..], &b"yellow"[..]),
            (&b"cherry"[..], &b"red"[..]),
        ];
        for (k, v) in &entries {
            builder.add(k, v);
        }
        let block = finish_block(&mut builder);

        let mut iter = block.iter();
        for (k, v) in &entries {
            let entry = iter.try_next().unwrap().unwrap();
            assert_eq!(entry.key.as_ref(), *k);
            assert_eq!(entry.value.as_ref(), *v);
        }
        assert!(iter.try_next().unwrap().is_none());

        iter.seek_to_first();
        assert_eq!(iter.try_next().unwrap().unwrap().key.as_ref(), b"apple");
    }

    #[test]
    fn test_seek_between_keys() {
        let mut builder = BlockBuilder::new(3, bytewise_comparator());
        for i in (0..40).step_by(2) {
            builder.add(format!("k{:02}", i).as_bytes(), b"v");
        }
        let block = finish_block(&mut builder);

        let mut iter = block.iter();
        iter.seek(b"k07").unwrap();
        assert_eq!(iter.try_next().unwrap().unwrap().key.as_ref(), b"k08");
        assert_eq!(iter.try_next().unwrap().unwrap().key.as_ref(), b"k10");

        iter.seek(b"a").unwrap();
        assert_eq!(iter.try_next().unwrap().unwrap().key.as_ref(), b"k00");

        iter.seek(b"k38").unwrap();
        assert_eq!(iter.try_next().unwrap().unwrap().key.as_ref(), b"k38");
        assert!(iter.try_next().unwrap().is_none());

        iter.seek(b"z").unwrap();
        assert!(iter.try_next().unwrap().is_none());
    }

    #[test]
    fn test_prefix_compression_saves_space() {
        let keys: [&[u8]; 3] = [b"apple", b"application", b"apply"];

        let mut compressed = BlockBuilder::new(16, bytewise_comparator());
        let mut uncompressed = BlockBuilder::new(1, bytewise_comparator());
        for k in keys {
            compressed.add(k, b"v");
            uncompressed.add(k, b"v");
        }
        assert!(compressed.current_size_estimate() < uncompressed.current_size_estimate());
    }

    #[test]
    fn test_size_estimate_matches_finish() {
        let mut builder = BlockBuilder::new(4, bytewise_comparator());
        assert_eq!(builder.current_size_estimate(), 8);
        for i in 0..10u32 {
            builder.add(&i.to_be_bytes(), b"value");
        }
        let estimate = builder.current_size_estimate();
        assert_eq!(builder.finish().len(), estimate);
        assert_eq!(builder.current_size_estimate(), estimate);
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        builder.add(b"zebra", b"1");
        builder.finish();

        builder.reset();
        assert!(builder.is_empty());
        assert_eq!(builder.last_key(), b"");
        builder.add(b"apple", b"2");
        assert_eq!(builder.entry_count(), 1);
        assert_eq!(builder.last_key(), b"apple");

        let block = finish_block(&mut builder);
        let entries = block.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key.as_ref(), b"apple");
    }

    #[test]
    fn test_empty_block() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        let block = finish_block(&mut builder);
        assert_eq!(block.size(), 8);
        assert!(block.entries().unwrap().is_empty());
        assert_eq!(block.get(b"anything").unwrap(), None);
    }

    #[test]
    fn test_empty_key_and_value() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        builder.add(b"", b"");
        builder.add(b"a", b"");
        let block = finish_block(&mut builder);
        let entries = block.entries().unwrap();
        assert_eq!(entries[0].key.as_ref(), b"");
        assert_eq!(entries[1].key.as_ref(), b"a");
        assert_eq!(block.get(b"").unwrap().as_deref(), Some(&b""[..]));
    }

    #[test]
    fn test_reverse_comparator_ordering() {
        let mut builder = BlockBuilder::new(2, Arc::new(ReverseBytewiseComparator));
        for k in [b"d", b"c", b"b", b"a"] {
            builder.add(k, k);
        }
        let block = finish_block(&mut builder);
        assert_eq!(block.get(b"b").unwrap().as_deref(), Some(&b"b"[..]));

        let mut iter = block.iter();
        iter.seek(b"bb").unwrap();
        // In reverse order "b" follows "bb".
        assert_eq!(iter.try_next().unwrap().unwrap().key.as_ref(), b"b");
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn test_keys_not_sorted() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        builder.add(b"zebra", b"v1");
        builder.add(b"apple", b"v2");
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn test_duplicate_key() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        builder.add(b"same", b"v1");
        builder.add(b"same", b"v2");
    }

    #[test]
    #[should_panic(expected = "finish called twice")]
    fn test_double_finish() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        builder.add(b"k", b"v");
        builder.finish();
        builder.finish();
    }

    #[test]
    #[should_panic(expected = "finished block")]
    fn test_add_after_finish() {
        let mut builder = BlockBuilder::new(16, bytewise_comparator());
        builder.finish();
        builder.add(b"k", b"v");
    }

    #[test]
    fn test_finish_emits_event() {
        let meter = RecordingMeter::new();
        let mut builder = BlockBuilder::with_config_and_meter(
            &BlockConfig {
                restart_interval: 2,
                ..Default::default()
            },
            bytewise_comparator(),
            Arc::new(meter.clone()),
        )
        .unwrap();
        builder.add(b"a", b"1");
        builder.add(b"b", b"2");
        builder.add(b"c", b"3");
        let bytes = builder.finish().len();

        assert_eq!(meter.counter_value("block_entries_added"), 3);
        assert_eq!(
            meter.events(),
            vec![VizEvent::Block(BlockEvt {
                kind: BlockKind::Finished {
                    entries: 3,
                    restarts: 2,
                    bytes,
                },
            })]
        );
    }

    #[test]
    fn test_shorter_than_min_block_len() {
        let short = Bytes::from(vec![0u8; MIN_BLOCK_LEN - 1]);
        let err = Block::new(short, bytewise_comparator()).unwrap_err();
        assert!(matches!(err, TableError::Corruption(_)));

        let empty = BlockBuilder::new(4, bytewise_comparator()).finish().len();
        assert_eq!(empty, MIN_BLOCK_LEN + RESTART_ENTRY_SIZE);
    }

    #[test]
    fn test_corrupt_trailer() {
        let err = Block::new(Bytes::from_static(&[1, 2]), bytewise_comparator()).unwrap_err();
        assert!(matches!(err, TableError::Corruption(_)));

        // Claims 100 restarts in an 8-byte block.
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&100u32.to_le_bytes());
        let err = Block::new(Bytes::from(data), bytewise_comparator()).unwrap_err();
        assert!(matches!(err, TableError::Corruption(_)));
    }

    #[test]
    fn test_truncated_entry_reports_error() {
        // One restart at 0, entry claims a 10-byte value but holds 1 byte.
        let mut data = vec![0u8, 1, 10, b'k', b'v'];
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        let block = Block::new(Bytes::from(data), bytewise_comparator()).unwrap();
        assert!(matches!(
            block.iter().try_next(),
            Err(TableError::Corruption(_))
        ));
    }
}
