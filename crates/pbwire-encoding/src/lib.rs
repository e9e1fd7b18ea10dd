//! Wire-level primitives for the protobuf binary encoding.
//!
//! This is the lowest layer of pbwire. It knows nothing about readers,
//! writers or backing storage:
//! - [`wire`] — wire types and field header packing
//! - [`varint`] — base-128 variable-length integers, including a decoder that
//!   resumes across discontiguous buffer segments
//!
//! Everything here is synchronous and allocation-free.

pub mod error;
pub mod varint;
pub mod wire;

pub use error::{EncodingError, Result};
pub use varint::{
    decode_varint, decode_varint32, decode_varint_segments, encode_varint, encode_varint_to_slice,
    varint_len, zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64, VarintDecoder,
    MAX_VARINT32_LEN, MAX_VARINT64_LEN,
};
pub use wire::{FieldHeader, WireType, MAX_FIELD_NUMBER, MAX_HEADER_LEN};
