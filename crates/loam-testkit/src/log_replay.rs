//! Reads logical records back out of a block-framed log.
//!
//! The storage crates only ship a writer; tests use [`LogReplayer`] to check
//! what actually landed in a sink. The replayer follows the usual recovery
//! rules for this format:
//!
//! - Block tails shorter than a header are skipped as padding.
//! - A checksum mismatch or an impossible length drops the rest of the block.
//! - Fragments arriving without their `First` are dropped and reported.
//! - A logical record cut off by the end of the data is dropped silently and
//!   counted in [`ReplayReport::incomplete_tail`].

use loam_log::format::{mask_crc, RecordType, HEADER_SIZE, LENGTH_OFFSET, TYPE_OFFSET};
use loam_util::coding::decode_fixed32;

/// One physical record as found in the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalRecord {
    /// Offset of the header from the start of the data.
    pub offset: usize,
    /// Raw type tag; zero or out-of-range tags are reported as found.
    pub tag: u8,
    pub payload: Vec<u8>,
}

impl PhysicalRecord {
    pub fn record_type(&self) -> Option<RecordType> {
        RecordType::from_u8(self.tag)
    }
}

/// Bytes the replayer could not turn into logical records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corruption {
    pub bytes: usize,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub corruptions: Vec<Corruption>,
    /// Payload bytes of a fragmented record left unfinished at end of data.
    pub incomplete_tail: usize,
}

impl ReplayReport {
    pub fn dropped_bytes(&self) -> usize {
        self.corruptions.iter().map(|c| c.bytes).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.corruptions.is_empty() && self.incomplete_tail == 0
    }
}

enum Physical<'a> {
    Record(RecordType, &'a [u8]),
    Bad(usize, &'static str),
    Eof,
}

/// Sequential reader over an in-memory log image.
pub struct LogReplayer<'a> {
    data: &'a [u8],
    block_size: usize,
    pos: usize,
    report: ReplayReport,
}

impl<'a> LogReplayer<'a> {
    pub fn new(data: &'a [u8], block_size: usize) -> Self {
        assert!(block_size > HEADER_SIZE, "block size must exceed header size");
        Self {
            data,
            block_size,
            pos: 0,
            report: ReplayReport::default(),
        }
    }

    /// Next complete logical record, or `None` at end of data.
    pub fn read_record(&mut self) -> Option<Vec<u8>> {
        let mut scratch: Vec<u8> = Vec::new();
        let mut in_fragmented = false;

        loop {
            match self.read_physical() {
                Physical::Record(RecordType::Full, payload) => {
                    if in_fragmented && !scratch.is_empty() {
                        self.corrupt(scratch.len(), "partial record without end");
                    }
                    return Some(payload.to_vec());
                }
                Physical::Record(RecordType::First, payload) => {
                    if in_fragmented && !scratch.is_empty() {
                        self.corrupt(scratch.len(), "partial record without end");
                    }
                    scratch.clear();
                    scratch.extend_from_slice(payload);
                    in_fragmented = true;
                }
                Physical::Record(RecordType::Middle, payload) => {
                    if in_fragmented {
                        scratch.extend_from_slice(payload);
                    } else {
                        self.corrupt(payload.len(), "missing start of fragmented record");
                    }
                }
                Physical::Record(RecordType::Last, payload) => {
                    if in_fragmented {
                        scratch.extend_from_slice(payload);
                        return Some(scratch);
                    }
                    self.corrupt(payload.len(), "missing start of fragmented record");
                }
                Physical::Bad(bytes, reason) => {
                    if in_fragmented {
                        self.corrupt(scratch.len(), "partial record without end");
                        scratch.clear();
                        in_fragmented = false;
                    }
                    self.corrupt(bytes, reason);
                }
                Physical::Eof => {
                    if in_fragmented {
                        self.report.incomplete_tail += scratch.len();
                    }
                    return None;
                }
            }
        }
    }

    /// Reads every remaining logical record.
    pub fn read_all(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.read_record()).collect()
    }

    pub fn report(&self) -> &ReplayReport {
        &self.report
    }

    pub fn into_report(self) -> ReplayReport {
        self.report
    }

    fn corrupt(&mut self, bytes: usize, reason: &'static str) {
        self.report.corruptions.push(Corruption { bytes, reason });
    }

    fn read_physical(&mut self) -> Physical<'a> {
        loop {
            if self.pos >= self.data.len() {
                return Physical::Eof;
            }
            let block_left = self.block_size - self.pos % self.block_size;
            if block_left < HEADER_SIZE {
                self.pos += block_left;
                continue;
            }
            if self.data.len() - self.pos < HEADER_SIZE {
                // Writer died mid-header.
                self.pos = self.data.len();
                return Physical::Eof;
            }

            let header = &self.data[self.pos..self.pos + HEADER_SIZE];
            let length =
                u16::from_le_bytes([header[LENGTH_OFFSET], header[LENGTH_OFFSET + 1]]) as usize;
            let tag = header[TYPE_OFFSET];

            if tag == 0 && length == 0 {
                // Zeroed region; nothing more in this block.
                self.pos += block_left;
                continue;
            }
            if HEADER_SIZE + length > block_left {
                self.pos += block_left;
                return Physical::Bad(block_left, "bad record length");
            }
            if self.pos + HEADER_SIZE + length > self.data.len() {
                // Writer died mid-payload.
                self.pos = self.data.len();
                return Physical::Eof;
            }

            let start = self.pos + HEADER_SIZE;
            let payload = &self.data[start..start + length];
            let stored = decode_fixed32(header);
            let actual = mask_crc(crc32c::crc32c_append(crc32c::crc32c(&[tag]), payload));
            if stored != actual {
                self.pos += block_left;
                return Physical::Bad(block_left, "checksum mismatch");
            }
            self.pos = start + length;

            return match RecordType::from_u8(tag) {
                Some(record_type) => Physical::Record(record_type, payload),
                None => Physical::Bad(HEADER_SIZE + length, "unknown record type"),
            };
        }
    }
}

/// Every well-formed physical record in `data`, in order, with padding and
/// zeroed regions skipped. Stops at the first malformed header.
pub fn physical_records(data: &[u8], block_size: usize) -> Vec<PhysicalRecord> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let block_left = block_size - pos % block_size;
        if block_left < HEADER_SIZE {
            pos += block_left;
            continue;
        }
        if data.len() - pos < HEADER_SIZE {
            break;
        }
        let length = u16::from_le_bytes([data[pos + LENGTH_OFFSET], data[pos + LENGTH_OFFSET + 1]])
            as usize;
        let tag = data[pos + TYPE_OFFSET];
        if tag == 0 && length == 0 {
            pos += block_left;
            continue;
        }
        if HEADER_SIZE + length > block_left || pos + HEADER_SIZE + length > data.len() {
            break;
        }
        records.push(PhysicalRecord {
            offset: pos,
            tag,
            payload: data[pos + HEADER_SIZE..pos + HEADER_SIZE + length].to_vec(),
        });
        pos += HEADER_SIZE + length;
    }
    records
}

/// Replays `data` and returns the records along with what was dropped.
pub fn replay(data: &[u8], block_size: usize) -> (Vec<Vec<u8>>, ReplayReport) {
    let mut replayer = LogReplayer::new(data, block_size);
    let records = replayer.read_all();
    (records, replayer.into_report())
}
