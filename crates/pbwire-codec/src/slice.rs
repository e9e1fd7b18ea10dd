//! Flat-buffer backend: readers and writers over one fully-resident region.
//!
//! Nothing here ever suspends; the `async` methods complete on first poll.

use pbwire_encoding::{decode_varint, encode_varint_to_slice, varint_len, EncodingError};

use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::reader::{ProtoReader, ReaderState};
use crate::writer::{ProtoWriter, SHORT_STRING_MAX};

/// Reads protobuf fields from a byte slice.
///
/// Keeps two views over the same memory: `original` is everything not yet
/// consumed, `active` is the prefix of it inside the current sub-object
/// window.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    original: &'a [u8],
    active: &'a [u8],
    state: ReaderState,
}

impl<'a> SliceReader<'a> {
    /// Create a reader with default configuration.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, &CodecConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(data: &'a [u8], config: &CodecConfig) -> Self {
        Self {
            original: data,
            active: data,
            state: ReaderState::new(config),
        }
    }

    /// Unconsumed bytes inside the current window.
    pub fn remaining(&self) -> &'a [u8] {
        self.active
    }

    fn consume(&mut self, n: usize) {
        self.original = &self.original[n..];
        self.active = &self.active[n..];
        self.state.advance(n);
    }
}

impl ProtoReader for SliceReader<'_> {
    fn state(&self) -> &ReaderState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ReaderState {
        &mut self.state
    }

    async fn read_raw_varint(&mut self) -> Result<Option<u64>> {
        match decode_varint(self.active) {
            Ok(Some((value, len))) => {
                self.consume(len);
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(EncodingError::Truncated) => Err(CodecError::EndOfStream),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_raw_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        let src = self.active.get(..dst.len()).ok_or(CodecError::EndOfStream)?;
        dst.copy_from_slice(src);
        self.consume(dst.len());
        Ok(())
    }

    async fn skip_raw(&mut self, len: u64) -> Result<()> {
        match usize::try_from(len) {
            Ok(len) if len <= self.active.len() => {
                self.consume(len);
                Ok(())
            }
            _ => Err(CodecError::EndOfStream),
        }
    }

    fn apply_data_constraint(&mut self) {
        let visible = match self.state.remaining() {
            Some(remaining) => usize::try_from(remaining)
                .unwrap_or(usize::MAX)
                .min(self.original.len()),
            None => self.original.len(),
        };
        self.active = &self.original[..visible];
    }

    fn remove_data_constraint(&mut self) {
        self.active = self.original;
    }
}

/// Writes protobuf fields into a caller-provided slice.
///
/// The slice cannot grow: size it up front, typically with
/// [`WireMessage::encoded_len`](crate::WireMessage::encoded_len).
#[derive(Debug)]
pub struct SliceWriter<'a> {
    remaining: &'a mut [u8],
    written: usize,
    finished: bool,
}

impl<'a> SliceWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            remaining: buf,
            written: 0,
            finished: false,
        }
    }

    /// Bytes written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Space left in the destination.
    pub fn capacity_left(&self) -> usize {
        self.remaining.len()
    }

    /// Split `n` bytes off the front of the remaining slice.
    fn take(&mut self, n: usize) -> Result<&'a mut [u8]> {
        if self.finished {
            return Err(CodecError::Disposed);
        }
        if n > self.remaining.len() {
            return Err(CodecError::InsufficientCapacity {
                needed: n,
                available: self.remaining.len(),
            });
        }
        let (head, tail) = std::mem::take(&mut self.remaining).split_at_mut(n);
        self.remaining = tail;
        self.written += n;
        Ok(head)
    }
}

impl ProtoWriter for SliceWriter<'_> {
    fn position(&self) -> u64 {
        self.written as u64
    }

    async fn write_raw_varint(&mut self, value: u64) -> Result<usize> {
        let len = varint_len(value);
        encode_varint_to_slice(value, self.take(len)?);
        Ok(len)
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<usize> {
        self.take(bytes.len())?.copy_from_slice(bytes);
        Ok(bytes.len())
    }

    async fn flush(&mut self, is_final: bool) -> Result<()> {
        if is_final {
            self.finished = true;
        }
        Ok(())
    }

    async fn write_str_payload(&mut self, value: &str) -> Result<usize> {
        let payload = value.as_bytes();
        if payload.len() > SHORT_STRING_MAX {
            let written = self.write_raw_varint(payload.len() as u64).await?;
            return Ok(written + self.write_raw(payload).await?);
        }

        let dst = self.take(1 + payload.len())?;
        dst[0] = payload.len() as u8;
        dst[1..].copy_from_slice(payload);
        Ok(dst.len())
    }
}
