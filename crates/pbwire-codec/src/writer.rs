//! Push-style protobuf encoding.
//!
//! [`ProtoWriter`] turns typed field writes into wire bytes. Backends supply
//! raw varint/byte output and `flush`; everything else is provided.
//!
//! Nested messages use a two-pass length computation: the message is first
//! encoded against a [`NullWriter`] to learn its exact size, then the header
//! and length prefix are written and the message is encoded again for real.
//! No backtracking and no intermediate buffer, at the cost of running the
//! nested encoder twice. [`WireMessage::encode`] must therefore produce the
//! same bytes every time it is called.

use pbwire_encoding::{zigzag_encode32, zigzag_encode64, FieldHeader, WireType};
use tracing::{trace, warn};

use crate::error::{CodecError, Result};
use crate::null::NullWriter;

/// Longest payload encoded through the one-byte-prefix fast path.
pub const SHORT_STRING_MAX: usize = 127;

/// A value that knows how to write its own fields.
#[allow(async_fn_in_trait)]
pub trait WireMessage {
    /// Write every field of `self` to `writer`.
    async fn encode<W: ProtoWriter>(&self, writer: &mut W) -> Result<()>;

    /// Exact number of bytes [`WireMessage::encode`] produces.
    async fn encoded_len(&self) -> Result<u64> {
        let mut null = NullWriter::new();
        self.encode(&mut null).await?;
        Ok(null.position())
    }
}

/// Writes protobuf wire data to a backend.
///
/// Every write returns the number of bytes it produced.
#[allow(async_fn_in_trait)]
pub trait ProtoWriter {
    /// Logical bytes produced since the writer was created.
    fn position(&self) -> u64;

    async fn write_raw_varint(&mut self, value: u64) -> Result<usize>;

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Commit buffered output to the sink.
    ///
    /// A non-final flush leaves the writer ready for more output.
    async fn flush(&mut self, is_final: bool) -> Result<()>;

    /// Length prefix plus UTF-8 payload.
    ///
    /// This is the general path: the length goes out first, then the payload
    /// through [`ProtoWriter::write_raw`]. Backends override it to add the
    /// short-string fast path.
    async fn write_str_payload(&mut self, value: &str) -> Result<usize> {
        let mut written = self.write_raw_varint(value.len() as u64).await?;
        written += self.write_raw(value.as_bytes()).await?;
        Ok(written)
    }

    async fn write_field_header(&mut self, field_number: u32, wire_type: WireType) -> Result<usize> {
        let header = FieldHeader::new(field_number, wire_type)?;
        self.write_raw_varint(header.get() as u64).await
    }

    async fn write_varint_field(&mut self, field_number: u32, value: u64) -> Result<usize> {
        let written = self.write_field_header(field_number, WireType::Varint).await?;
        Ok(written + self.write_raw_varint(value).await?)
    }

    async fn write_uint32(&mut self, field_number: u32, value: u32) -> Result<usize> {
        self.write_varint_field(field_number, value as u64).await
    }

    async fn write_uint64(&mut self, field_number: u32, value: u64) -> Result<usize> {
        self.write_varint_field(field_number, value).await
    }

    /// Negative values are sign-extended and always take 10 bytes.
    async fn write_int32(&mut self, field_number: u32, value: i32) -> Result<usize> {
        self.write_varint_field(field_number, value as i64 as u64).await
    }

    async fn write_int64(&mut self, field_number: u32, value: i64) -> Result<usize> {
        self.write_varint_field(field_number, value as u64).await
    }

    async fn write_sint32(&mut self, field_number: u32, value: i32) -> Result<usize> {
        self.write_varint_field(field_number, zigzag_encode32(value) as u64)
            .await
    }

    async fn write_sint64(&mut self, field_number: u32, value: i64) -> Result<usize> {
        self.write_varint_field(field_number, zigzag_encode64(value)).await
    }

    async fn write_bool(&mut self, field_number: u32, value: bool) -> Result<usize> {
        self.write_varint_field(field_number, value as u64).await
    }

    async fn write_fixed32(&mut self, field_number: u32, value: u32) -> Result<usize> {
        let written = self.write_field_header(field_number, WireType::Fixed32).await?;
        Ok(written + self.write_raw(&value.to_le_bytes()).await?)
    }

    async fn write_fixed64(&mut self, field_number: u32, value: u64) -> Result<usize> {
        let written = self.write_field_header(field_number, WireType::Fixed64).await?;
        Ok(written + self.write_raw(&value.to_le_bytes()).await?)
    }

    async fn write_sfixed32(&mut self, field_number: u32, value: i32) -> Result<usize> {
        self.write_fixed32(field_number, value as u32).await
    }

    async fn write_sfixed64(&mut self, field_number: u32, value: i64) -> Result<usize> {
        self.write_fixed64(field_number, value as u64).await
    }

    async fn write_float(&mut self, field_number: u32, value: f32) -> Result<usize> {
        self.write_fixed32(field_number, value.to_bits()).await
    }

    async fn write_double(&mut self, field_number: u32, value: f64) -> Result<usize> {
        self.write_fixed64(field_number, value.to_bits()).await
    }

    async fn write_string(&mut self, field_number: u32, value: &str) -> Result<usize> {
        let written = self.write_field_header(field_number, WireType::String).await?;
        Ok(written + self.write_str_payload(value).await?)
    }

    async fn write_bytes(&mut self, field_number: u32, value: &[u8]) -> Result<usize> {
        let mut written = self.write_field_header(field_number, WireType::String).await?;
        written += self.write_raw_varint(value.len() as u64).await?;
        Ok(written + self.write_raw(value).await?)
    }

    /// Write `value` as a length-delimited nested message.
    async fn write_sub_object<M: WireMessage>(&mut self, field_number: u32, value: &M) -> Result<usize>
    where
        Self: Sized,
    {
        let expected = value.encoded_len().await?;

        let mut written = self.write_field_header(field_number, WireType::String).await?;
        written += self.write_raw_varint(expected).await?;

        let start = self.position();
        value.encode(self).await?;
        let actual = self.position() - start;

        if actual != expected {
            warn!(field_number, expected, actual, "nested encoder is not deterministic");
            return Err(CodecError::LengthMismatch { expected, actual });
        }

        trace!(field_number, len = actual, "wrote sub-object");
        Ok(written + actual as usize)
    }
}
