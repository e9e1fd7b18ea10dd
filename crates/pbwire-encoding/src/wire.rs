use std::fmt;

use crate::error::{EncodingError, Result};
use crate::varint::varint_len;

/// Largest field number the 29 upper header bits can carry.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// A field header is a varint of at most 32 bits, so it never needs more than 5 bytes.
pub const MAX_HEADER_LEN: usize = 5;

const WIRE_TYPE_BITS: u32 = 3;
const WIRE_TYPE_MASK: u32 = 0b111;

/// How a field's value is physically encoded.
///
/// Wire format (low three bits of every field header):
/// ```text
/// ┌───┬──────────────┬──────────────────────────────┐
/// │ 0 │ Varint       │ base-128 integer             │
/// │ 1 │ Fixed64      │ 8 bytes little-endian        │
/// │ 2 │ String       │ varint length + raw bytes    │
/// │ 3 │ StartGroup   │ nested fields until EndGroup │
/// │ 4 │ EndGroup     │ closes the matching group    │
/// │ 5 │ Fixed32      │ 4 bytes little-endian        │
/// └───┴──────────────┴──────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    String = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    /// Map the three wire-type bits onto a [`WireType`].
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::String),
            3 => Some(Self::StartGroup),
            4 => Some(Self::EndGroup),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }

    /// Payload width for the fixed-size wire types.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Fixed32 => Some(4),
            Self::Fixed64 => Some(8),
            _ => None,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::String => "length-delimited",
            Self::StartGroup => "start-group",
            Self::EndGroup => "end-group",
            Self::Fixed32 => "fixed32",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A packed `(field_number << 3) | wire_type` header.
///
/// Construction validates both halves, so a `FieldHeader` always carries a
/// positive field number and a known wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHeader(u32);

impl FieldHeader {
    /// Pack a field number and wire type.
    pub fn new(field_number: u32, wire_type: WireType) -> Result<Self> {
        if field_number == 0 || field_number > MAX_FIELD_NUMBER {
            return Err(EncodingError::InvalidFieldNumber(field_number as u64));
        }
        Ok(Self((field_number << WIRE_TYPE_BITS) | wire_type as u32))
    }

    /// Unpack a header as decoded from the wire.
    ///
    /// Zero is not a header; callers treat it as end-of-fields before getting here.
    pub fn from_raw(raw: u64) -> Result<Self> {
        let value = u32::try_from(raw).map_err(|_| EncodingError::InvalidFieldHeader(raw))?;
        let bits = (value & WIRE_TYPE_MASK) as u8;
        if WireType::from_bits(bits).is_none() {
            return Err(EncodingError::InvalidWireType(bits));
        }
        if value >> WIRE_TYPE_BITS == 0 {
            return Err(EncodingError::InvalidFieldNumber(0));
        }
        Ok(Self(value))
    }

    pub fn field_number(self) -> u32 {
        self.0 >> WIRE_TYPE_BITS
    }

    pub fn wire_type(self) -> WireType {
        match WireType::from_bits((self.0 & WIRE_TYPE_MASK) as u8) {
            Some(wire_type) => wire_type,
            None => unreachable!("field header validated on construction"),
        }
    }

    /// The raw header value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Bytes this header occupies on the wire.
    pub fn encoded_len(self) -> usize {
        varint_len(self.0 as u64)
    }
}

impl fmt::Display for FieldHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.field_number(), self.wire_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack() {
        let header = FieldHeader::new(1, WireType::Varint).unwrap();
        assert_eq!(header.get(), 0x08);
        assert_eq!(header.field_number(), 1);
        assert_eq!(header.wire_type(), WireType::Varint);

        let header = FieldHeader::new(2, WireType::String).unwrap();
        assert_eq!(header.get(), 0x12);

        let header = FieldHeader::new(3, WireType::String).unwrap();
        assert_eq!(header.get(), 0x1a);
    }

    #[test]
    fn from_raw_roundtrip() {
        for wire_type in [
            WireType::Varint,
            WireType::Fixed64,
            WireType::String,
            WireType::StartGroup,
            WireType::EndGroup,
            WireType::Fixed32,
        ] {
            let header = FieldHeader::new(MAX_FIELD_NUMBER, wire_type).unwrap();
            let decoded = FieldHeader::from_raw(header.get() as u64).unwrap();
            assert_eq!(decoded, header);
            assert_eq!(decoded.field_number(), MAX_FIELD_NUMBER);
            assert_eq!(decoded.wire_type(), wire_type);
        }
    }

    #[test]
    fn rejects_out_of_range_field_numbers() {
        assert!(matches!(
            FieldHeader::new(0, WireType::Varint),
            Err(EncodingError::InvalidFieldNumber(0))
        ));
        assert!(matches!(
            FieldHeader::new(MAX_FIELD_NUMBER + 1, WireType::Varint),
            Err(EncodingError::InvalidFieldNumber(_))
        ));
    }

    #[test]
    fn rejects_unknown_wire_types() {
        assert!(matches!(
            FieldHeader::from_raw(0x0e),
            Err(EncodingError::InvalidWireType(6))
        ));
        assert!(matches!(
            FieldHeader::from_raw(0x0f),
            Err(EncodingError::InvalidWireType(7))
        ));
    }

    #[test]
    fn rejects_zero_field_number() {
        assert!(matches!(
            FieldHeader::from_raw(0x02),
            Err(EncodingError::InvalidFieldNumber(0))
        ));
    }

    #[test]
    fn rejects_headers_wider_than_32_bits() {
        assert!(matches!(
            FieldHeader::from_raw(1 << 32),
            Err(EncodingError::InvalidFieldHeader(_))
        ));
    }

    #[test]
    fn header_length_stays_within_budget() {
        let header = FieldHeader::new(MAX_FIELD_NUMBER, WireType::Fixed32).unwrap();
        assert_eq!(header.encoded_len(), MAX_HEADER_LEN);
        assert_eq!(FieldHeader::new(15, WireType::Varint).unwrap().encoded_len(), 1);
        assert_eq!(FieldHeader::new(16, WireType::Varint).unwrap().encoded_len(), 2);
    }

    #[test]
    fn fixed_sizes() {
        assert_eq!(WireType::Fixed32.fixed_size(), Some(4));
        assert_eq!(WireType::Fixed64.fixed_size(), Some(8));
        assert_eq!(WireType::Varint.fixed_size(), None);
    }
}
