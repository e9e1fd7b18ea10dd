//! Streaming protobuf wire-format reader and writer.
//!
//! pbwire reads and writes the protobuf binary encoding field by field,
//! without generated code or schema knowledge, over flat byte buffers and
//! incrementally delivered async streams.
//!
//! # Crate Structure
//!
//! - [`encoding`] — Wire types, field headers, varint and zig-zag primitives
//! - [`codec`] — Reader/writer engines and their flat, stream and null backends
//!
//! # Features
//!
//! - `async` (default) — `StreamReader` / `StreamWriter` over tokio I/O
//! - `serde` — `Serialize` / `Deserialize` for `CodecConfig`

/// Re-export wire primitives.
pub mod encoding {
    pub use pbwire_encoding::*;
}

/// Re-export reader/writer engines.
pub mod codec {
    pub use pbwire_codec::*;
}
