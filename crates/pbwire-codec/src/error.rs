use pbwire_encoding::{EncodingError, WireType};

/// Errors that can occur while reading or writing protobuf wire data.
///
/// None of these are recovered internally; once an operation fails the
/// reader or writer should be abandoned.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A varint, length prefix or fixed-width value could not be completed
    /// because the source (or the current sub-object window) ran out of bytes.
    #[error("unexpected end of stream")]
    EndOfStream,

    /// A sub-object was closed with a token that does not belong to the
    /// innermost open window.
    #[error(
        "sub-object closed out of order (current end {current_end:?} at depth {current_depth}, \
         token end {token_end} at depth {token_depth})"
    )]
    SubObjectOrder {
        current_end: Option<u64>,
        current_depth: usize,
        token_end: u64,
        token_depth: usize,
    },

    /// A sub-object was closed before its declared length was consumed.
    #[error("sub-object closed at position {position}, expected {end}")]
    SubObjectIncomplete { position: u64, end: u64 },

    /// The current field's wire type cannot be decoded as requested.
    #[error("unexpected wire type {actual:?} (expected {expected})")]
    UnexpectedWireType {
        expected: WireType,
        actual: Option<WireType>,
    },

    /// An end-group header appeared with no group open.
    #[error("unexpected end-group for field {field_number}")]
    UnexpectedEndGroup { field_number: u32 },

    /// A group was left (or its enclosing sub-object closed) before its
    /// end-group header was read.
    #[error("group for field {field_number} was not closed")]
    UnclosedGroup { field_number: u32 },

    /// An end-group header closed a different group than the innermost one.
    #[error("end-group for field {actual} does not match open group {expected}")]
    GroupMismatch { expected: u32, actual: u32 },

    /// The destination buffer is too small for the value being written.
    #[error("insufficient capacity ({needed} bytes needed, {available} available)")]
    InsufficientCapacity { needed: usize, available: usize },

    /// The second pass of a nested write produced a different length than
    /// the measuring pass.
    #[error("sub-object length mismatch (measured {expected} bytes, wrote {actual})")]
    LengthMismatch { expected: u64, actual: u64 },

    /// A length prefix exceeds the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: usize },

    /// Sub-objects are nested deeper than the configured maximum.
    #[error("sub-object nesting exceeds maximum depth {max}")]
    DepthLimitExceeded { max: usize },

    /// An operation started while another one was still outstanding.
    #[error("another operation is already in progress")]
    ConcurrentOperation,

    /// The reader or writer was disposed (possibly while suspended).
    #[error("reader or writer has been disposed")]
    Disposed,

    /// A string field did not contain valid UTF-8.
    #[error("invalid UTF-8 in string field: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A wire primitive could not be packed or unpacked.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// An I/O error occurred on the underlying source or sink.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
