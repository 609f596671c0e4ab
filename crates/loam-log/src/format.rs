//! Physical log layout.
//!
//! A log is a sequence of fixed-size blocks. Each block holds physical
//! records back to back:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0-3    | 4    | masked CRC32C of `type ++ payload`, little-endian |
//! | 4-5    | 2    | payload length, little-endian |
//! | 6      | 1    | record type |
//! | 7..    | len  | payload |
//!
//! A header never straddles a block boundary: when fewer than
//! [`HEADER_SIZE`] bytes remain in a block, they are zero-filled and the next
//! record starts at the following block.
//!
//! A logical record is stored as one `Full` physical record, or as `First`,
//! zero or more `Middle`, then `Last`.

/// Default log block size (32 KiB).
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Bytes of header in front of every physical record.
pub const HEADER_SIZE: usize = 4 + 2 + 1;

pub const CRC_OFFSET: usize = 0;
pub const LENGTH_OFFSET: usize = 4;
pub const TYPE_OFFSET: usize = 6;

/// Largest valid [`RecordType`] tag.
pub const MAX_RECORD_TYPE: u8 = RecordType::Last as u8;

const MASK_DELTA: u32 = 0xa282_ead8;

/// Physical record type tag.
///
/// Tag 0 is reserved for preallocated (zeroed) regions and never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// A complete logical record.
    Full = 1,
    /// First fragment of a logical record.
    First = 2,
    /// Interior fragment.
    Middle = 3,
    /// Final fragment.
    Last = 4,
}

impl RecordType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(RecordType::Full),
            2 => Some(RecordType::First),
            3 => Some(RecordType::Middle),
            4 => Some(RecordType::Last),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Type for a fragment given whether it opens and/or closes its logical record.
    pub fn for_fragment(begin: bool, end: bool) -> Self {
        match (begin, end) {
            (true, true) => RecordType::Full,
            (true, false) => RecordType::First,
            (false, true) => RecordType::Last,
            (false, false) => RecordType::Middle,
        }
    }
}

/// Returns a masked representation of `crc`.
///
/// Computing the CRC of a string that itself contains embedded CRCs is
/// problematic, so stored checksums are rotated and offset.
#[inline]
pub fn mask_crc(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Inverse of [`mask_crc`].
#[inline]
pub fn unmask_crc(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}

/// CRC32C of each single type byte, indexed by tag.
///
/// Used to seed the checksum of every physical record.
pub fn type_crc_table() -> [u32; MAX_RECORD_TYPE as usize + 1] {
    let mut table = [0u32; MAX_RECORD_TYPE as usize + 1];
    for (tag, slot) in table.iter_mut().enumerate() {
        *slot = crc32c::crc32c(&[tag as u8]);
    }
    table
}

/// Checksum stored in a header: masked CRC32C over `type ++ payload`.
pub fn record_crc(record_type: RecordType, payload: &[u8]) -> u32 {
    let seed = crc32c::crc32c(&[record_type.as_u8()]);
    mask_crc(crc32c::crc32c_append(seed, payload))
}
