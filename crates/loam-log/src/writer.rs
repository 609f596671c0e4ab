//! Block-framed log writer.
//!
//! Splits each logical record into physical records so that no header ever
//! crosses a block boundary, checksums every fragment, and flushes the sink
//! after each one. See [`crate::format`] for the byte layout.

use crate::config::LogConfig;
use crate::error::Result;
use crate::format::{
    mask_crc, type_crc_table, RecordType, CRC_OFFSET, HEADER_SIZE, LENGTH_OFFSET,
    MAX_RECORD_TYPE, TYPE_OFFSET,
};
use crate::sink::WritableFile;
use loam_observe::{obs_count, obs_hist, obs_timed, LogEvt, LogKind, Meter, NoopMeter, VizEvent};
use loam_util::coding::encode_fixed32;
use std::sync::Arc;

const ZEROES: [u8; HEADER_SIZE] = [0; HEADER_SIZE];

/// Appends logical records to a [`WritableFile`].
///
/// Not internally synchronized: concurrent writers must be serialized by the
/// caller, and fragments of one record are never interleaved with another's.
///
/// # Example
///
/// ```
/// use loam_log::LogWriter;
///
/// let mut writer = LogWriter::new(Vec::new());
/// writer.append_record(b"first").unwrap();
/// writer.append_record(b"").unwrap();
/// assert_eq!(writer.block_offset(), 7 + 5 + 7);
/// ```
pub struct LogWriter<W: WritableFile> {
    dest: W,
    block_size: usize,
    /// Offset of the next write within the current block.
    block_offset: usize,
    /// Bytes handed to the sink since the stream began, padding included.
    stream_offset: u64,
    sync_on_append: bool,
    /// CRC32C of each type tag, pre-computed to seed record checksums.
    type_crc: [u32; MAX_RECORD_TYPE as usize + 1],
    meter: Arc<dyn Meter>,
}

impl<W: WritableFile> LogWriter<W> {
    /// Creates a writer for an empty destination with the default 32 KiB blocks.
    pub fn new(dest: W) -> Self {
        Self::build(dest, 0, &LogConfig::default(), Arc::new(NoopMeter))
    }

    pub fn with_config(dest: W, config: LogConfig) -> Result<Self> {
        Self::with_config_and_meter(dest, config, Arc::new(NoopMeter))
    }

    pub fn with_config_and_meter(
        dest: W,
        config: LogConfig,
        meter: Arc<dyn Meter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(dest, 0, &config, meter))
    }

    /// Creates a writer that resumes appending to a destination already
    /// holding `dest_len` bytes of log.
    pub fn with_offset(dest: W, dest_len: u64, config: LogConfig) -> Result<Self> {
        Self::with_offset_and_meter(dest, dest_len, config, Arc::new(NoopMeter))
    }

    pub fn with_offset_and_meter(
        dest: W,
        dest_len: u64,
        config: LogConfig,
        meter: Arc<dyn Meter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(dest, dest_len, &config, meter))
    }

    fn build(dest: W, dest_len: u64, config: &LogConfig, meter: Arc<dyn Meter>) -> Self {
        Self {
            dest,
            block_size: config.block_size,
            block_offset: (dest_len % config.block_size as u64) as usize,
            stream_offset: dest_len,
            sync_on_append: config.sync_on_append,
            type_crc: type_crc_table(),
            meter,
        }
    }

    /// Appends one logical record.
    ///
    /// An empty `data` still produces a single zero-length `Full` record. On
    /// error the log may end with a partial logical record; readers detect
    /// and drop it. Nothing is retried or rolled back.
    pub fn append_record(&mut self, data: &[u8]) -> Result<()> {
        let mut left = data;
        let mut begin = true;
        let mut fragments = 0u32;

        loop {
            let leftover = self.block_size - self.block_offset;
            if leftover < HEADER_SIZE {
                if leftover > 0 {
                    self.pad_block_tail(leftover, fragments)?;
                }
                self.block_offset = 0;
            }

            debug_assert!(self.block_size - self.block_offset >= HEADER_SIZE);

            let avail = self.block_size - self.block_offset - HEADER_SIZE;
            let fragment_length = left.len().min(avail);
            let end = fragment_length == left.len();
            let record_type = RecordType::for_fragment(begin, end);

            let (fragment, rest) = left.split_at(fragment_length);
            if let Err(e) = self.emit_physical_record(record_type, fragment) {
                self.report_failure(record_type, rest.len(), fragments);
                return Err(e);
            }
            fragments += 1;
            left = rest;
            begin = false;

            if left.is_empty() {
                break;
            }
        }

        if self.sync_on_append {
            let synced = obs_timed!(self.meter, "log_sync_ms", &[], { self.dest.sync() });
            if let Err(e) = synced {
                self.report_failure(RecordType::Full, 0, fragments);
                return Err(e.into());
            }
        }

        obs_count!(self.meter, "log_records_appended", &[], 1);
        obs_count!(self.meter, "log_physical_records", &[], fragments);
        obs_hist!(self.meter, "log_record_bytes", &[], data.len());
        Ok(())
    }

    /// Writes header and payload, then flushes the sink.
    fn emit_physical_record(&mut self, record_type: RecordType, payload: &[u8]) -> Result<()> {
        let n = payload.len();
        debug_assert!(n <= u16::MAX as usize);
        debug_assert!(self.block_offset + HEADER_SIZE + n <= self.block_size);

        let mut header = [0u8; HEADER_SIZE];
        header[LENGTH_OFFSET..TYPE_OFFSET].copy_from_slice(&(n as u16).to_le_bytes());
        header[TYPE_OFFSET] = record_type.as_u8();

        let crc = crc32c::crc32c_append(self.type_crc[record_type.as_u8() as usize], payload);
        encode_fixed32(&mut header[CRC_OFFSET..LENGTH_OFFSET], mask_crc(crc));

        let result = self
            .dest
            .append(&header)
            .and_then(|_| self.dest.append(payload))
            .and_then(|_| self.dest.flush());

        // The offset advances even on failure; the block is unusable either way.
        self.block_offset += HEADER_SIZE + n;
        self.stream_offset += (HEADER_SIZE + n) as u64;

        result?;
        obs_count!(self.meter, "log_bytes_written", &[], HEADER_SIZE + n);
        Ok(())
    }

    /// Zero-fills a block tail too short to hold a header.
    fn pad_block_tail(&mut self, leftover: usize, fragments: u32) -> Result<()> {
        let block = self.stream_offset / self.block_size as u64;
        tracing::trace!(
            block,
            block_offset = self.block_offset,
            padding = leftover,
            "log block tail padded"
        );

        if let Err(e) = self.dest.append(&ZEROES[..leftover]) {
            self.report_failure(RecordType::Full, 0, fragments);
            return Err(e.into());
        }
        self.stream_offset += leftover as u64;

        obs_count!(self.meter, "log_padding_bytes", &[], leftover);
        self.meter.emit(VizEvent::Log(LogEvt {
            block,
            kind: LogKind::BlockPadded {
                bytes: leftover as u32,
            },
        }));
        Ok(())
    }

    fn report_failure(&self, record_type: RecordType, bytes_left: usize, fragments: u32) {
        tracing::warn!(
            ?record_type,
            bytes_left,
            fragments_written = fragments,
            "log append failed"
        );
        self.meter.emit(VizEvent::Log(LogEvt {
            block: self.stream_offset / self.block_size as u64,
            kind: LogKind::AppendFailed {
                fragments_written: fragments,
            },
        }));
    }

    /// Offset of the next write within the current block.
    pub fn block_offset(&self) -> usize {
        self.block_offset
    }

    /// Total bytes written to the stream, including padding and any bytes
    /// present before this writer was created.
    pub fn stream_offset(&self) -> u64 {
        self.stream_offset
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn get_ref(&self) -> &W {
        &self.dest
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.dest
    }

    pub fn into_inner(self) -> W {
        self.dest
    }
}
