//! Streaming reader/writer engines for the protobuf wire format.
//!
//! The engines are traits with all of the encoding logic provided:
//! - [`ProtoReader`] — field-by-field traversal, scalar decoding and
//!   length-constrained sub-object windows
//! - [`ProtoWriter`] — scalar/string/bytes encoding and two-pass nested
//!   messages via [`WireMessage`]
//!
//! Backends:
//! - [`SliceReader`] / [`SliceWriter`] — one fully-resident byte region, never suspend
//! - [`NullWriter`] — counts bytes without producing any
//! - `StreamReader` / `StreamWriter` — incrementally delivered input and
//!   flushed output (behind the `async` feature)
//!
//! Schema knowledge (which fields exist, how they map onto program data)
//! lives above this crate.

pub mod config;
pub mod error;
pub mod null;
pub mod reader;
pub mod slice;
#[cfg(feature = "async")]
pub mod stream;
pub mod writer;

#[cfg(test)]
mod test_util;

pub use config::{CodecConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAYLOAD};
pub use error::{CodecError, Result};
pub use null::NullWriter;
pub use reader::{ProtoReader, ReaderState, SubObjectToken};
pub use slice::{SliceReader, SliceWriter};
#[cfg(feature = "async")]
pub use stream::{DisposeHandle, StreamReader, StreamWriter};
pub use writer::{ProtoWriter, WireMessage, SHORT_STRING_MAX};
