//! Field-by-field traversal of protobuf wire data.
//!
//! [`ProtoReader`] carries all of the decoding logic as provided methods.
//! Backends only supply raw byte access plus the two window hooks
//! ([`ProtoReader::apply_data_constraint`] and
//! [`ProtoReader::remove_data_constraint`]) that clamp their view of the
//! available bytes to the innermost sub-object.

use bytes::Bytes;
use pbwire_encoding::{zigzag_decode32, zigzag_decode64, FieldHeader, WireType};
use tracing::trace;

use crate::config::CodecConfig;
use crate::error::{CodecError, Result};

const UNBOUNDED: u64 = u64::MAX;

/// Cursor state shared by every reader backend.
#[derive(Debug, Clone)]
pub struct ReaderState {
    position: u64,
    end: u64,
    header: Option<FieldHeader>,
    depth: usize,
    /// Field numbers of the open groups, innermost last.
    groups: Vec<u32>,
    /// Groups opened before the current sub-object window; those cannot be
    /// closed from inside it.
    group_base: usize,
    max_depth: usize,
    max_payload_size: usize,
}

impl ReaderState {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            position: 0,
            end: UNBOUNDED,
            header: None,
            depth: 0,
            groups: Vec::new(),
            group_base: 0,
            max_depth: config.max_depth,
            max_payload_size: config.max_payload_size,
        }
    }

    /// Logical bytes consumed since the reader was created.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Exclusive end of the current window, `None` when unbounded.
    pub fn end(&self) -> Option<u64> {
        (self.end != UNBOUNDED).then_some(self.end)
    }

    /// Bytes left in the current window, `None` when unbounded.
    pub fn remaining(&self) -> Option<u64> {
        self.end().map(|end| end.saturating_sub(self.position))
    }

    /// True while inside a window that still expects bytes.
    pub fn expects_more(&self) -> bool {
        self.remaining().is_some_and(|remaining| remaining > 0)
    }

    /// Current sub-object nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Field number of the innermost group opened inside the current window.
    pub fn open_group(&self) -> Option<u32> {
        self.groups[self.group_base..].last().copied()
    }

    fn check_nesting(&self) -> Result<()> {
        if self.depth + self.groups.len() >= self.max_depth {
            return Err(CodecError::DepthLimitExceeded {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    /// Record `n` bytes as consumed. Called by backends.
    pub fn advance(&mut self, n: usize) {
        self.position += n as u64;
    }
}

/// Marks an open sub-object window.
///
/// Returned by [`ProtoReader::begin_sub_object`]; must be handed back to
/// [`ProtoReader::end_sub_object`] in LIFO order once the nested message has
/// been read completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "sub-objects must be closed with end_sub_object"]
pub struct SubObjectToken {
    previous_end: u64,
    new_end: u64,
    depth: usize,
    previous_group_base: usize,
}

impl SubObjectToken {
    /// Exclusive end of the window this token opened.
    pub fn end(&self) -> u64 {
        self.new_end
    }
}

/// Pull-style protobuf reader.
///
/// Operations may suspend on stream-backed readers while more input
/// arrives; flat-buffer readers always complete immediately.
#[allow(async_fn_in_trait)]
pub trait ProtoReader {
    fn state(&self) -> &ReaderState;

    fn state_mut(&mut self) -> &mut ReaderState;

    /// Decode one varint from the visible window.
    ///
    /// `Ok(None)` means the window holds no bytes at all; a varint cut off
    /// part-way is [`CodecError::EndOfStream`].
    async fn read_raw_varint(&mut self) -> Result<Option<u64>>;

    /// Fill `dst` completely from the visible window.
    async fn read_raw_exact(&mut self, dst: &mut [u8]) -> Result<()>;

    /// Discard `len` bytes from the visible window.
    async fn skip_raw(&mut self, len: u64) -> Result<()>;

    /// Clamp the visible bytes to the current window end.
    fn apply_data_constraint(&mut self);

    /// Restore the unclamped, as-received view of the available bytes.
    fn remove_data_constraint(&mut self);

    fn position(&self) -> u64 {
        self.state().position()
    }

    fn end(&self) -> Option<u64> {
        self.state().end()
    }

    /// Raw value of the last header read, 0 if none.
    fn field_header(&self) -> u32 {
        self.state().header.map_or(0, FieldHeader::get)
    }

    /// Field number of the last header read, 0 if none.
    fn field_number(&self) -> u32 {
        self.state().header.map_or(0, FieldHeader::field_number)
    }

    /// Wire type of the last header read.
    fn wire_type(&self) -> Option<WireType> {
        self.state().header.map(FieldHeader::wire_type)
    }

    /// Advance to the next field header.
    ///
    /// Returns `false` at the clean end of the current window, or on the
    /// end-group header closing the group opened by
    /// [`ProtoReader::begin_group`]. Any other end-group header is an error.
    /// Fails with [`CodecError::EndOfStream`] if the window (or an open
    /// group) still expected bytes that never arrived.
    async fn read_next_field(&mut self) -> Result<bool> {
        let header = read_header(self).await?;
        let state = self.state_mut();
        state.header = header;
        let open_group = state.open_group();
        match header {
            Some(header) if header.wire_type() == WireType::EndGroup => {
                match open_group {
                    Some(expected) if expected == header.field_number() => {}
                    Some(expected) => {
                        return Err(CodecError::GroupMismatch {
                            expected,
                            actual: header.field_number(),
                        })
                    }
                    None => {
                        return Err(CodecError::UnexpectedEndGroup {
                            field_number: header.field_number(),
                        })
                    }
                }
                trace!(%header, position = self.position(), "reached end of group");
                Ok(false)
            }
            Some(header) => {
                trace!(%header, position = self.position(), "read field header");
                Ok(true)
            }
            None if open_group.is_some() => Err(CodecError::EndOfStream),
            None => Ok(false),
        }
    }

    /// Enter the group started by the current header.
    ///
    /// Its fields are then read with [`ProtoReader::read_next_field`] until it
    /// returns `false` on the matching end-group, followed by
    /// [`ProtoReader::end_group`].
    fn begin_group(&mut self) -> Result<()> {
        expect_wire_type(self, WireType::StartGroup)?;
        let field_number = self.field_number();
        let state = self.state_mut();
        state.check_nesting()?;
        state.groups.push(field_number);
        state.header = None;
        trace!(field_number, position = self.position(), "entered group");
        Ok(())
    }

    /// Leave the innermost group once its end-group header has been read.
    fn end_group(&mut self) -> Result<()> {
        let state = self.state_mut();
        let Some(expected) = state.open_group() else {
            return Err(CodecError::UnexpectedEndGroup {
                field_number: state.header.map_or(0, FieldHeader::field_number),
            });
        };
        match state.header {
            Some(header) if header.wire_type() == WireType::EndGroup => {}
            _ => {
                return Err(CodecError::UnclosedGroup {
                    field_number: expected,
                })
            }
        }

        state.groups.pop();
        state.header = None;
        trace!(field_number = expected, position = self.position(), "left group");
        Ok(())
    }

    /// Discard the value of the current field.
    async fn skip_field(&mut self) -> Result<()> {
        match self.wire_type() {
            Some(WireType::StartGroup) => {
                let field_number = self.field_number();
                skip_group(self, field_number).await
            }
            Some(WireType::EndGroup) => Err(CodecError::UnexpectedEndGroup {
                field_number: self.field_number(),
            }),
            Some(wire_type) => {
                trace!(field = self.field_number(), %wire_type, "skipping field");
                skip_value(self, wire_type).await
            }
            None => Err(CodecError::UnexpectedWireType {
                expected: WireType::Varint,
                actual: None,
            }),
        }
    }

    async fn read_uint64(&mut self) -> Result<u64> {
        match self.wire_type() {
            Some(WireType::Varint) => read_varint(self).await,
            Some(WireType::Fixed64) => Ok(u64::from_le_bytes(read_array(self).await?)),
            Some(WireType::Fixed32) => Ok(u32::from_le_bytes(read_array(self).await?) as u64),
            actual => Err(CodecError::UnexpectedWireType {
                expected: WireType::Varint,
                actual,
            }),
        }
    }

    async fn read_uint32(&mut self) -> Result<u32> {
        Ok(self.read_uint64().await? as u32)
    }

    async fn read_int64(&mut self) -> Result<i64> {
        Ok(self.read_uint64().await? as i64)
    }

    /// Negative values arrive sign-extended to 64 bits; the low 32 bits are kept.
    async fn read_int32(&mut self) -> Result<i32> {
        Ok(self.read_uint64().await? as i32)
    }

    async fn read_sint32(&mut self) -> Result<i32> {
        Ok(zigzag_decode32(self.read_uint64().await? as u32))
    }

    async fn read_sint64(&mut self) -> Result<i64> {
        Ok(zigzag_decode64(self.read_uint64().await?))
    }

    async fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_uint64().await? != 0)
    }

    async fn read_fixed32(&mut self) -> Result<u32> {
        expect_wire_type(self, WireType::Fixed32)?;
        Ok(u32::from_le_bytes(read_array(self).await?))
    }

    async fn read_fixed64(&mut self) -> Result<u64> {
        expect_wire_type(self, WireType::Fixed64)?;
        Ok(u64::from_le_bytes(read_array(self).await?))
    }

    async fn read_sfixed32(&mut self) -> Result<i32> {
        Ok(self.read_fixed32().await? as i32)
    }

    async fn read_sfixed64(&mut self) -> Result<i64> {
        Ok(self.read_fixed64().await? as i64)
    }

    async fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_fixed32().await?))
    }

    async fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_fixed64().await?))
    }

    /// Read a length-delimited payload.
    async fn read_bytes(&mut self) -> Result<Bytes> {
        expect_wire_type(self, WireType::String)?;
        let len = read_length(self).await?;
        let mut payload = vec![0u8; len as usize];
        self.read_raw_exact(&mut payload).await?;
        Ok(Bytes::from(payload))
    }

    /// Read a length-delimited UTF-8 string.
    async fn read_string(&mut self) -> Result<String> {
        let payload = self.read_bytes().await?;
        Ok(String::from_utf8(payload.into())?)
    }

    /// Enter the length-delimited sub-object under the current header.
    async fn begin_sub_object(&mut self) -> Result<SubObjectToken> {
        expect_wire_type(self, WireType::String)?;
        let len = read_length(self).await?;

        let state = self.state_mut();
        state.check_nesting()?;
        let new_end = state.position + len;
        if new_end > state.end {
            return Err(CodecError::EndOfStream);
        }

        let token = SubObjectToken {
            previous_end: state.end,
            new_end,
            depth: state.depth + 1,
            previous_group_base: state.group_base,
        };
        state.end = new_end;
        state.depth = token.depth;
        state.group_base = state.groups.len();
        let depth = state.depth;
        self.apply_data_constraint();

        trace!(position = self.position(), end = new_end, depth, "entered sub-object");
        Ok(token)
    }

    /// Leave the sub-object opened by `token`.
    ///
    /// The token must belong to the innermost open window, the window must
    /// have been consumed exactly, and every group opened inside it must be
    /// closed.
    fn end_sub_object(&mut self, token: SubObjectToken) -> Result<()> {
        let state = self.state_mut();
        // Nested windows often share an end offset; depth tells them apart.
        if token.new_end != state.end || token.depth != state.depth {
            return Err(CodecError::SubObjectOrder {
                current_end: state.end(),
                current_depth: state.depth,
                token_end: token.new_end,
                token_depth: token.depth,
            });
        }
        if state.position != token.new_end {
            return Err(CodecError::SubObjectIncomplete {
                position: state.position,
                end: token.new_end,
            });
        }
        if let Some(field_number) = state.open_group() {
            return Err(CodecError::UnclosedGroup { field_number });
        }

        state.end = token.previous_end;
        state.depth -= 1;
        state.group_base = token.previous_group_base;
        state.header = None;
        let bounded = state.end != UNBOUNDED;

        self.remove_data_constraint();
        if bounded {
            self.apply_data_constraint();
        }

        trace!(position = self.position(), end = ?self.end(), "left sub-object");
        Ok(())
    }
}

async fn read_header<R: ProtoReader + ?Sized>(reader: &mut R) -> Result<Option<FieldHeader>> {
    let raw = match reader.read_raw_varint().await? {
        Some(raw) => raw,
        None if reader.state().expects_more() => return Err(CodecError::EndOfStream),
        None => return Ok(None),
    };

    if raw == 0 {
        if reader.end().is_some() {
            return Err(CodecError::EndOfStream);
        }
        return Ok(None);
    }

    Ok(Some(FieldHeader::from_raw(raw)?))
}

fn expect_wire_type<R: ProtoReader + ?Sized>(reader: &R, expected: WireType) -> Result<()> {
    match reader.wire_type() {
        Some(actual) if actual == expected => Ok(()),
        actual => Err(CodecError::UnexpectedWireType { expected, actual }),
    }
}

async fn read_varint<R: ProtoReader + ?Sized>(reader: &mut R) -> Result<u64> {
    reader.read_raw_varint().await?.ok_or(CodecError::EndOfStream)
}

async fn read_array<const N: usize, R: ProtoReader + ?Sized>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_raw_exact(&mut buf).await?;
    Ok(buf)
}

/// Read a length prefix and check it against the configured limit and the
/// current window.
async fn read_length<R: ProtoReader + ?Sized>(reader: &mut R) -> Result<u64> {
    let len = read_varint(reader).await?;
    let state = reader.state();
    if len > state.max_payload_size as u64 {
        return Err(CodecError::PayloadTooLarge {
            size: len,
            max: state.max_payload_size,
        });
    }
    if state.remaining().is_some_and(|remaining| len > remaining) {
        return Err(CodecError::EndOfStream);
    }
    Ok(len)
}

async fn skip_value<R: ProtoReader + ?Sized>(reader: &mut R, wire_type: WireType) -> Result<()> {
    match wire_type {
        WireType::Varint => read_varint(reader).await.map(drop),
        WireType::Fixed32 => reader.skip_raw(4).await,
        WireType::Fixed64 => reader.skip_raw(8).await,
        WireType::String => {
            let len = read_length(reader).await?;
            reader.skip_raw(len).await
        }
        WireType::StartGroup | WireType::EndGroup => Err(CodecError::UnexpectedWireType {
            expected: WireType::Varint,
            actual: Some(wire_type),
        }),
    }
}

/// Skip nested fields until the end-group matching `field_number`.
///
/// Nested groups are tracked on an explicit stack.
async fn skip_group<R: ProtoReader + ?Sized>(reader: &mut R, field_number: u32) -> Result<()> {
    let mut open = vec![field_number];
    while let Some(&expected) = open.last() {
        let header = read_header(reader).await?.ok_or(CodecError::EndOfStream)?;
        reader.state_mut().header = Some(header);
        match header.wire_type() {
            WireType::StartGroup => open.push(header.field_number()),
            WireType::EndGroup if header.field_number() == expected => {
                open.pop();
            }
            WireType::EndGroup => {
                return Err(CodecError::GroupMismatch {
                    expected,
                    actual: header.field_number(),
                })
            }
            wire_type => skip_value(reader, wire_type).await?,
        }
    }
    Ok(())
}
