use bytes::{BufMut, BytesMut};
use pbwire_encoding::{encode_varint, varint_len};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{cancellable, DisposeHandle, Operation};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::writer::{ProtoWriter, SHORT_STRING_MAX};

/// Writes protobuf fields to an [`AsyncWrite`] sink through a bounded buffer.
///
/// Encoded bytes accumulate in memory and are committed to the sink once
/// the buffer would grow past its configured capacity, or on
/// [`ProtoWriter::flush`]. A final flush shuts the sink down unless the
/// writer was configured with `leave_open`.
#[derive(Debug)]
pub struct StreamWriter<W> {
    sink: W,
    buf: BytesMut,
    capacity: usize,
    position: u64,
    leave_open: bool,
    completed: bool,
    op: Operation,
}

impl<W> StreamWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, &CodecConfig::default())
    }

    pub fn with_config(sink: W, config: &CodecConfig) -> Self {
        let capacity = config.effective_buffer_capacity();
        Self {
            sink,
            buf: BytesMut::with_capacity(capacity),
            capacity,
            position: 0,
            leave_open: config.leave_open,
            completed: false,
            op: Operation::default(),
        }
    }

    /// Handle for disposing this writer from another task.
    pub fn dispose_handle(&self) -> DisposeHandle {
        self.op.handle()
    }

    /// Bytes encoded but not yet committed to the sink.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Final-flush (if not already done) and return the sink.
    pub async fn close(mut self) -> Result<W> {
        if !self.completed {
            self.flush(true).await?;
        }
        Ok(self.sink)
    }

    fn check_open(&self) -> Result<()> {
        if self.completed {
            return Err(CodecError::Disposed);
        }
        self.op.check_live()
    }

    /// Make room for `additional` more bytes, committing buffered output
    /// first if the buffer would otherwise grow past its capacity.
    async fn ensure(&mut self, additional: usize) -> Result<()> {
        self.check_open()?;
        if !self.buf.is_empty() && self.buf.len() + additional > self.capacity {
            self.commit(false, false).await?;
        }
        self.buf.reserve(additional);
        Ok(())
    }

    /// Write the buffer out to the sink, optionally flushing and shutting it down.
    ///
    /// A failed commit may have delivered part of the buffer, so the writer
    /// refuses all further output afterwards.
    async fn commit(&mut self, flush: bool, shutdown: bool) -> Result<()> {
        self.op.begin()?;
        let token = self.op.token.clone();
        let result = cancellable(&token, self.drain(flush, shutdown)).await;
        self.op.end();
        if let Err(err) = &result {
            debug!(error = %err, position = self.position, "commit failed, closing writer");
            self.completed = true;
            self.buf = BytesMut::new();
        }
        result
    }

    async fn drain(&mut self, flush: bool, shutdown: bool) -> Result<()> {
        let len = self.buf.len();
        self.sink.write_all(&self.buf).await?;
        if flush {
            self.sink.flush().await?;
        }
        if shutdown {
            self.sink.shutdown().await?;
        }
        self.buf.clear();
        debug!(bytes = len, position = self.position, "committed to sink");
        Ok(())
    }
}

impl<W> ProtoWriter for StreamWriter<W>
where
    W: AsyncWrite + Unpin,
{
    fn position(&self) -> u64 {
        self.position
    }

    async fn write_raw_varint(&mut self, value: u64) -> Result<usize> {
        self.ensure(varint_len(value)).await?;
        let written = encode_varint(value, &mut self.buf);
        self.position += written as u64;
        Ok(written)
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<usize> {
        self.check_open()?;
        let mut rest = bytes;
        while !rest.is_empty() {
            let room = self.capacity.saturating_sub(self.buf.len());
            if room == 0 {
                self.commit(false, false).await?;
                continue;
            }
            let (chunk, tail) = rest.split_at(room.min(rest.len()));
            self.buf.put_slice(chunk);
            self.position += chunk.len() as u64;
            rest = tail;
        }
        Ok(bytes.len())
    }

    async fn flush(&mut self, is_final: bool) -> Result<()> {
        self.check_open()?;
        debug!(bytes = self.buf.len(), is_final, "flushing");
        self.commit(true, is_final && !self.leave_open).await?;
        if is_final {
            self.completed = true;
            self.buf = BytesMut::new();
        } else {
            self.buf = BytesMut::with_capacity(self.capacity);
        }
        Ok(())
    }

    async fn write_str_payload(&mut self, value: &str) -> Result<usize> {
        let payload = value.as_bytes();
        if payload.len() > SHORT_STRING_MAX {
            let written = self.write_raw_varint(payload.len() as u64).await?;
            return Ok(written + self.write_raw(payload).await?);
        }

        self.ensure(1 + payload.len()).await?;
        self.buf.put_u8(payload.len() as u8);
        self.buf.put_slice(payload);
        self.position += 1 + payload.len() as u64;
        Ok(1 + payload.len())
    }
}
