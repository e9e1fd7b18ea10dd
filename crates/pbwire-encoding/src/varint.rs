//! Base-128 variable-length integers.
//!
//! Each byte carries 7 data bits, least-significant group first; the high
//! bit is set on every byte except the last:
//! ```text
//! 150 = 0b1001_0110  ->  0x96 0x01
//!                         │    └── 0000001 (last group, no continuation)
//!                         └─────── 1 0010110 (continuation + low 7 bits)
//! ```
//!
//! Decoders report three outcomes: a value, `Ok(None)` when there were no
//! bytes at all, or [`EncodingError::Truncated`] when a value started but
//! the bytes ran out before its terminator.

use bytes::BufMut;

use crate::error::{EncodingError, Result};

/// Maximum encoded length of a 32-bit varint.
pub const MAX_VARINT32_LEN: usize = 5;

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT64_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;
const DATA_MASK: u8 = 0x7f;

/// Number of bytes `value` occupies once encoded.
#[inline]
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Append the varint encoding of `value` to `dst`, returning the byte count.
pub fn encode_varint<B: BufMut>(mut value: u64, dst: &mut B) -> usize {
    let mut written = 1;
    while value >= CONTINUATION as u64 {
        dst.put_u8((value as u8 & DATA_MASK) | CONTINUATION);
        value >>= 7;
        written += 1;
    }
    dst.put_u8(value as u8);
    written
}

/// Encode `value` into the front of `dst`.
///
/// Returns `None` without touching `dst` if it is too short.
pub fn encode_varint_to_slice(mut value: u64, dst: &mut [u8]) -> Option<usize> {
    let len = varint_len(value);
    let dst = dst.get_mut(..len)?;
    for byte in dst.iter_mut() {
        *byte = (value as u8 & DATA_MASK) | CONTINUATION;
        value >>= 7;
    }
    dst[len - 1] &= DATA_MASK;
    Some(len)
}

/// Incremental varint decoder.
///
/// Bytes are pushed one at a time, so a value whose bytes are split across
/// several buffers never needs to be copied into one contiguous region.
#[derive(Debug, Clone)]
pub struct VarintDecoder {
    value: u64,
    len: usize,
    max_len: usize,
}

impl VarintDecoder {
    /// Decoder for a full 64-bit value (up to 10 bytes).
    pub fn new() -> Self {
        Self::with_max_len(MAX_VARINT64_LEN)
    }

    /// Decoder for a 32-bit value (up to 5 bytes, high bits discarded).
    pub fn new_u32() -> Self {
        Self::with_max_len(MAX_VARINT32_LEN)
    }

    fn with_max_len(max_len: usize) -> Self {
        Self {
            value: 0,
            len: 0,
            max_len,
        }
    }

    /// Bytes consumed so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Feed the next byte. Returns the value once its terminating byte arrives.
    pub fn push(&mut self, byte: u8) -> Result<Option<u64>> {
        let malformed = EncodingError::MalformedVarint {
            max_len: self.max_len,
        };
        if self.len == self.max_len {
            return Err(malformed);
        }

        let last_allowed = self.len + 1 == self.max_len;
        // The tenth byte of a 64-bit varint may only contribute the top bit.
        if last_allowed && self.max_len == MAX_VARINT64_LEN && byte > 1 {
            return Err(malformed);
        }

        self.value |= ((byte & DATA_MASK) as u64) << (7 * self.len);
        self.len += 1;

        if byte & CONTINUATION == 0 {
            Ok(Some(self.value))
        } else if last_allowed {
            Err(malformed)
        } else {
            Ok(None)
        }
    }
}

impl Default for VarintDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a 64-bit varint from the front of `src`.
///
/// Returns the value and the number of bytes it occupied.
pub fn decode_varint(src: &[u8]) -> Result<Option<(u64, usize)>> {
    decode_with(VarintDecoder::new(), std::iter::once(src), src.len())
}

/// Decode a 32-bit varint from the front of `src`.
pub fn decode_varint32(src: &[u8]) -> Result<Option<(u32, usize)>> {
    let decoded = decode_with(VarintDecoder::new_u32(), std::iter::once(src), src.len())?;
    Ok(decoded.map(|(value, len)| (value as u32, len)))
}

/// Decode a 64-bit varint spread over discontiguous `segments`.
///
/// At most `limit` bytes are examined in total, which lets callers clamp the
/// view to a window without reslicing the segments.
pub fn decode_varint_segments<'a, I>(segments: I, limit: usize) -> Result<Option<(u64, usize)>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    decode_with(VarintDecoder::new(), segments, limit)
}

fn decode_with<'a, I>(
    mut decoder: VarintDecoder,
    segments: I,
    limit: usize,
) -> Result<Option<(u64, usize)>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let bytes = segments.into_iter().flatten().copied().take(limit);
    for byte in bytes {
        if let Some(value) = decoder.push(byte)? {
            return Ok(Some((value, decoder.len())));
        }
    }

    if decoder.is_empty() {
        Ok(None)
    } else {
        Err(EncodingError::Truncated)
    }
}

/// Map a signed 32-bit value onto the unsigned zig-zag form.
#[inline]
pub fn zigzag_encode32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[inline]
pub fn zigzag_decode32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Map a signed 64-bit value onto the unsigned zig-zag form.
#[inline]
pub fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
