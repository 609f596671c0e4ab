//! Engine-wide options.
//!
//! [`Options`] gathers the per-component configurations and the key
//! comparator, and builds each component from them so the comparator is
//! threaded through constructors instead of looked up globally.

use crate::error::Result;
use crate::snapshot::SnapshotList;
use loam_log::{LogConfig, LogWriter, WritableFile};
use loam_observe::{Meter, NoopMeter};
use loam_table::{BlockBuilder, BlockConfig};
use loam_util::{bytewise_comparator, Arena, ArenaConfig, CacheConfig, Comparator, ShardedLruCache};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Serialize, Deserialize)]
pub struct Options {
    /// Write-ahead log framing.
    pub log: LogConfig,

    /// Sorted block encoding.
    pub block: BlockConfig,

    /// Memtable arena.
    pub arena: ArenaConfig,

    /// Shared block cache.
    pub cache: CacheConfig,

    /// Key order for every sorted structure. Not serialized; a deserialized
    /// `Options` uses the byte-wise comparator until replaced.
    #[serde(skip, default = "bytewise_comparator")]
    pub comparator: Arc<dyn Comparator>,

    /// Sink for metrics and events from every component built here.
    #[serde(skip, default = "noop_meter")]
    pub meter: Arc<dyn Meter>,
}

fn noop_meter() -> Arc<dyn Meter> {
    Arc::new(NoopMeter)
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            block: BlockConfig::default(),
            arena: ArenaConfig::default(),
            cache: CacheConfig::default(),
            comparator: bytewise_comparator(),
            meter: noop_meter(),
        }
    }
}

impl Options {
    /// Validates every member configuration.
    pub fn validate(&self) -> Result<()> {
        self.log.validate()?;
        self.block.validate()?;
        self.arena.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn with_meter(mut self, meter: Arc<dyn Meter>) -> Self {
        self.meter = meter;
        self
    }

    /// Log writer appending to an empty `dest`.
    pub fn log_writer<W: WritableFile>(&self, dest: W) -> Result<LogWriter<W>> {
        Ok(LogWriter::with_config_and_meter(
            dest,
            self.log.clone(),
            self.meter.clone(),
        )?)
    }

    /// Log writer resuming after the `dest_len` bytes `dest` already holds.
    pub fn log_writer_at<W: WritableFile>(&self, dest: W, dest_len: u64) -> Result<LogWriter<W>> {
        Ok(LogWriter::with_offset_and_meter(
            dest,
            dest_len,
            self.log.clone(),
            self.meter.clone(),
        )?)
    }

    /// Block builder ordered by this comparator.
    pub fn block_builder(&self) -> Result<BlockBuilder> {
        Ok(BlockBuilder::with_config_and_meter(
            &self.block,
            self.comparator.clone(),
            self.meter.clone(),
        )?)
    }

    pub fn arena(&self) -> Result<Arena> {
        Ok(Arena::with_config(self.arena.clone())?)
    }

    pub fn cache<V>(&self) -> Result<ShardedLruCache<V>> {
        Ok(ShardedLruCache::new_with_meter(
            self.cache.clone(),
            self.meter.clone(),
        )?)
    }

    pub fn snapshot_list(&self) -> SnapshotList {
        SnapshotList::with_meter(self.meter.clone())
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("log", &self.log)
            .field("block", &self.block)
            .field("arena", &self.arena)
            .field("cache", &self.cache)
            .field("comparator", &self.comparator.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use loam_observe::RecordingMeter;
    use loam_util::ReverseBytewiseComparator;

    #[test]
    fn test_default_options_validate() {
        let options = Options::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.comparator.name(), "leveldb.BytewiseComparator");
    }

    #[test]
    fn test_invalid_member_is_reported() {
        let mut options = Options::default();
        options.block.restart_interval = 0;
        assert!(matches!(options.validate(), Err(Error::Table(_))));

        let mut options = Options::default();
        options.log.block_size = 3;
        assert!(matches!(options.validate(), Err(Error::Log(_))));

        let mut options = Options::default();
        options.cache.shard_bits = 30;
        assert!(matches!(options.validate(), Err(Error::Util(_))));
    }

    #[test]
    fn test_serde_skips_comparator() {
        let options = Options::default().with_comparator(Arc::new(ReverseBytewiseComparator));
        let json = serde_json::to_string(&options).unwrap();
        assert!(!json.contains("comparator"));

        let back: Options = serde_json::from_str(&json).unwrap();
        assert_eq!(back.comparator.name(), "leveldb.BytewiseComparator");
        assert_eq!(back.block.restart_interval, options.block.restart_interval);
        assert_eq!(back.log.block_size, options.log.block_size);
    }

    #[test]
    fn test_builders_use_comparator() {
        let options = Options::default().with_comparator(Arc::new(ReverseBytewiseComparator));
        let mut builder = options.block_builder().unwrap();
        builder.add(b"b", b"1");
        builder.add(b"a", b"2");
        assert_eq!(builder.entry_count(), 2);
    }

    #[test]
    fn test_resumed_log_writer_keeps_meter() {
        let meter = RecordingMeter::new();
        let options = Options::default().with_meter(Arc::new(meter.clone()));

        let mut writer = options.log_writer(Vec::new()).unwrap();
        writer.append_record(b"one").unwrap();
        let log = writer.into_inner();
        let len = log.len() as u64;

        let mut resumed = options.log_writer_at(log, len).unwrap();
        assert_eq!(resumed.block_offset(), len as usize);
        resumed.append_record(b"two").unwrap();
        assert_eq!(meter.counter_value("log_records_appended"), 2);
    }

    #[test]
    fn test_debug_names_comparator() {
        let rendered = format!("{:?}", Options::default());
        assert!(rendered.contains("leveldb.BytewiseComparator"));
    }
}
