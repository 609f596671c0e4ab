//! Endian-neutral integer and byte-string encoding.
//!
//! - Fixed-width integers are written least-significant byte first.
//! - Varints are base-128, least-significant group first; every byte except
//!   the last has its high bit set.
//! - Byte strings are written as `varint32(len) ++ bytes`.
//!
//! Encoders append to any [`BufMut`] (`Vec<u8>`, `BytesMut`). Decoders read
//! from a `&mut &[u8]` cursor and advance it past the consumed bytes on
//! success. On failure the cursor is left untouched, but callers must stop
//! parsing the enclosing structure.

use crate::error::CodingError;
use bytes::{Buf, BufMut};

/// Longest encoding of a `u32` varint.
pub const MAX_VARINT32_LEN: usize = 5;

/// Longest encoding of a `u64` varint.
pub const MAX_VARINT64_LEN: usize = 10;

pub type CodingResult<T> = std::result::Result<T, CodingError>;

/// Writes `value` into `dst[..4]`, little-endian.
///
/// Panics if `dst` is shorter than 4 bytes.
#[inline]
pub fn encode_fixed32(dst: &mut [u8], value: u32) {
    dst[..4].copy_from_slice(&value.to_le_bytes());
}

/// Writes `value` into `dst[..8]`, little-endian.
#[inline]
pub fn encode_fixed64(dst: &mut [u8], value: u64) {
    dst[..8].copy_from_slice(&value.to_le_bytes());
}

/// Reads a little-endian `u32` from `src[..4]` without advancing anything.
///
/// Panics if `src` is shorter than 4 bytes; use [`get_fixed32`] on untrusted input.
#[inline]
pub fn decode_fixed32(src: &[u8]) -> u32 {
    u32::from_le_bytes([src[0], src[1], src[2], src[3]])
}

/// Reads a little-endian `u64` from `src[..8]`.
#[inline]
pub fn decode_fixed64(src: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&src[..8]);
    u64::from_le_bytes(raw)
}

pub fn put_fixed32<B: BufMut>(dst: &mut B, value: u32) {
    dst.put_u32_le(value);
}

pub fn put_fixed64<B: BufMut>(dst: &mut B, value: u64) {
    dst.put_u64_le(value);
}

pub fn get_fixed32(input: &mut &[u8]) -> CodingResult<u32> {
    if input.len() < 4 {
        return Err(CodingError::Incomplete);
    }
    Ok(input.get_u32_le())
}

pub fn get_fixed64(input: &mut &[u8]) -> CodingResult<u64> {
    if input.len() < 8 {
        return Err(CodingError::Incomplete);
    }
    Ok(input.get_u64_le())
}

/// Encodes `value` as a varint into `dst`, returning the number of bytes used.
///
/// `dst` must hold at least [`varint_length`]`(value)` bytes.
pub fn encode_varint64(dst: &mut [u8], mut value: u64) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        dst[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    dst[i] = value as u8;
    i + 1
}

pub fn put_varint32<B: BufMut>(dst: &mut B, value: u32) {
    put_varint64(dst, value as u64);
}

pub fn put_varint64<B: BufMut>(dst: &mut B, value: u64) {
    let mut scratch = [0u8; MAX_VARINT64_LEN];
    let n = encode_varint64(&mut scratch, value);
    dst.put_slice(&scratch[..n]);
}

/// Decodes a `u32` varint, consuming at most [`MAX_VARINT32_LEN`] bytes.
pub fn get_varint32(input: &mut &[u8]) -> CodingResult<u32> {
    let (value, used) = parse_varint(input, MAX_VARINT32_LEN)?;
    input.advance(used);
    Ok(value as u32)
}

/// Decodes a `u64` varint, consuming at most [`MAX_VARINT64_LEN`] bytes.
pub fn get_varint64(input: &mut &[u8]) -> CodingResult<u64> {
    let (value, used) = parse_varint(input, MAX_VARINT64_LEN)?;
    input.advance(used);
    Ok(value)
}

/// Parses a varint from the front of `src` without consuming it.
///
/// Bits beyond the target width in the final group are discarded, matching the
/// on-disk format's tolerance for non-canonical high bits.
fn parse_varint(src: &[u8], max_bytes: usize) -> CodingResult<(u64, usize)> {
    let mut result = 0u64;
    for (i, &byte) in src.iter().take(max_bytes).enumerate() {
        result |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }
    if src.len() < max_bytes {
        Err(CodingError::Incomplete)
    } else {
        Err(CodingError::VarintOverflow { max_bytes })
    }
}

/// Number of bytes the varint encoding of `value` occupies.
pub fn varint_length(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

pub fn put_length_prefixed_slice<B: BufMut>(dst: &mut B, value: &[u8]) {
    put_varint32(dst, value.len() as u32);
    dst.put_slice(value);
}

/// Decodes a `varint32(len) ++ bytes` slice, borrowing from the input.
pub fn get_length_prefixed_slice<'a>(input: &mut &'a [u8]) -> CodingResult<&'a [u8]> {
    let mut cursor = *input;
    let len = get_varint32(&mut cursor)? as usize;
    if cursor.len() < len {
        return Err(CodingError::LengthOverflow {
            declared: len as u64,
            remaining: cursor.len(),
        });
    }
    let (value, rest) = cursor.split_at(len);
    *input = rest;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed32_layout() {
        let mut buf = Vec::new();
        put_fixed32(&mut buf, 0x0403_0201);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(decode_fixed32(&buf), 0x0403_0201);
    }

    #[test]
    fn test_fixed64_layout() {
        let mut buf = [0u8; 8];
        encode_fixed64(&mut buf, 0x0807_0605_0403_0201);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(decode_fixed64(&buf), 0x0807_0605_0403_0201);
    }

    #[test]
    fn test_fixed_sequence() {
        let mut buf = Vec::new();
        for v in 0..100_000u32 {
            put_fixed32(&mut buf, v);
        }
        let mut input = &buf[..];
        for v in 0..100_000u32 {
            assert_eq!(get_fixed32(&mut input).unwrap(), v);
        }
        assert!(input.is_empty());
    }

    #[test]
    fn test_varint_known_encodings() {
        let cases: &[(u64, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (300, &[0xAC, 0x02]),
            (16_383, &[0xFF, 0x7F]),
            (16_384, &[0x80, 0x80, 0x01]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            put_varint64(&mut buf, *value);
            assert_eq!(&buf[..], *expected, "encoding of {}", value);
            assert_eq!(varint_length(*value), expected.len());
        }
    }

    #[test]
    fn test_varint32_boundaries() {
        let mut values = vec![0u32, 100, u32::MAX, u32::MAX - 1];
        for shift in 0..32 {
            let power = 1u32 << shift;
            values.push(power);
            values.push(power - 1);
            values.push(power.wrapping_add(1));
        }
        let mut buf = Vec::new();
        for &v in &values {
            put_varint32(&mut buf, v);
        }
        let mut input = &buf[..];
        for &v in &values {
            let before = input.len();
            assert_eq!(get_varint32(&mut input).unwrap(), v);
            assert_eq!(before - input.len(), varint_length(v as u64));
        }
        assert!(input.is_empty());
    }

    #[test]
    fn test_varint64_max_width() {
        let mut buf = Vec::new();
        put_varint64(&mut buf, u64::MAX);
        assert_eq!(buf.len(), MAX_VARINT64_LEN);
        let mut input = &buf[..];
        assert_eq!(get_varint64(&mut input).unwrap(), u64::MAX);
    }

    #[test]
    fn test_varint32_overflow() {
        let data = [0x81u8, 0x82, 0x83, 0x84, 0x85, 0x11];
        let mut input = &data[..];
        assert_eq!(
            get_varint32(&mut input),
            Err(CodingError::VarintOverflow { max_bytes: 5 })
        );
        // Cursor is not advanced on failure.
        assert_eq!(input.len(), data.len());
    }

    #[test]
    fn test_varint64_overflow() {
        let data = [0xFFu8; 11];
        let mut input = &data[..];
        assert_eq!(
            get_varint64(&mut input),
            Err(CodingError::VarintOverflow { max_bytes: 10 })
        );
    }

    #[test]
    fn test_varint_truncated() {
        let mut buf = Vec::new();
        put_varint64(&mut buf, (1u64 << 40) + 17);
        for len in 0..buf.len() {
            let mut input = &buf[..len];
            assert_eq!(get_varint64(&mut input), Err(CodingError::Incomplete));
        }
        let mut input = &buf[..];
        assert_eq!(get_varint64(&mut input).unwrap(), (1u64 << 40) + 17);
    }

    #[test]
    fn test_length_prefixed_slices() {
        let mut buf = Vec::new();
        put_length_prefixed_slice(&mut buf, b"");
        put_length_prefixed_slice(&mut buf, b"foo");
        put_length_prefixed_slice(&mut buf, b"bar");
        put_length_prefixed_slice(&mut buf, &[b'x'; 200]);

        let mut input = &buf[..];
        assert_eq!(get_length_prefixed_slice(&mut input).unwrap(), b"");
        assert_eq!(get_length_prefixed_slice(&mut input).unwrap(), b"foo");
        assert_eq!(get_length_prefixed_slice(&mut input).unwrap(), b"bar");
        assert_eq!(get_length_prefixed_slice(&mut input).unwrap(), &[b'x'; 200][..]);
        assert!(input.is_empty());
    }

    #[test]
    fn test_length_prefix_exceeds_input() {
        let mut buf = Vec::new();
        put_varint32(&mut buf, 10);
        buf.extend_from_slice(b"short");
        let mut input = &buf[..];
        assert_eq!(
            get_length_prefixed_slice(&mut input),
            Err(CodingError::LengthOverflow {
                declared: 10,
                remaining: 5
            })
        );
    }

    #[test]
    fn test_get_fixed_incomplete() {
        let mut input: &[u8] = &[1, 2, 3];
        assert_eq!(get_fixed32(&mut input), Err(CodingError::Incomplete));
        assert_eq!(get_fixed64(&mut input), Err(CodingError::Incomplete));
    }
}
