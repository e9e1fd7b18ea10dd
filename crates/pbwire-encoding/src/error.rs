/// Errors produced while packing or unpacking wire primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// The input ended part-way through a varint.
    #[error("truncated varint")]
    Truncated,

    /// No terminating byte was found within the varint byte budget.
    #[error("malformed varint (no terminator within {max_len} bytes)")]
    MalformedVarint { max_len: usize },

    /// The low three bits of a field header name an unknown wire type.
    #[error("invalid wire type {0}")]
    InvalidWireType(u8),

    /// Field numbers must lie in `1..=MAX_FIELD_NUMBER`.
    #[error("invalid field number {0}")]
    InvalidFieldNumber(u64),

    /// A decoded header does not fit the 32-bit header space.
    #[error("invalid field header {0:#x}")]
    InvalidFieldHeader(u64),
}

pub type Result<T> = std::result::Result<T, EncodingError>;
