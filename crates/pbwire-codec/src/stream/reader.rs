use std::collections::VecDeque;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;

use bytes::{Buf, Bytes};
use futures_core::Stream;
use pbwire_encoding::{decode_varint_segments, EncodingError};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{cancellable, DisposeHandle, Operation};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::reader::{ProtoReader, ReaderState};

/// Reads protobuf fields from incrementally delivered chunks.
///
/// Received chunks are kept as a queue of segments; values that straddle
/// segment boundaries are decoded across them without copying into a
/// contiguous buffer first.
///
/// ```text
///   segments:  [ consumed | buffered ........ ][ buffered ... ]
///                         ^ position
///                         |<-- visible -->|   (clamped to the window end)
/// ```
#[derive(Debug)]
pub struct StreamReader<S> {
    source: S,
    segments: VecDeque<Bytes>,
    /// Unconsumed bytes across all segments.
    buffered: usize,
    /// Prefix of `buffered` inside the current window.
    visible: usize,
    state: ReaderState,
    exhausted: bool,
    op: Operation,
}

impl<S> StreamReader<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    /// Create a reader with default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, &CodecConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(source: S, config: &CodecConfig) -> Self {
        Self {
            source,
            segments: VecDeque::new(),
            buffered: 0,
            visible: 0,
            state: ReaderState::new(config),
            exhausted: false,
            op: Operation::default(),
        }
    }

    /// Handle for disposing this reader from another task.
    pub fn dispose_handle(&self) -> DisposeHandle {
        self.op.handle()
    }

    /// Bytes received from the source but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Whether the source has signalled end of data.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Return the source and any received but unconsumed segments.
    pub fn into_parts(self) -> (S, Vec<Bytes>) {
        (self.source, self.segments.into())
    }

    /// Wait for the source to deliver more bytes inside the current window.
    ///
    /// Returns `Ok(false)` without touching the source when the window is
    /// already fully buffered or the source is exhausted.
    pub async fn request_more_data(&mut self) -> Result<bool> {
        self.op.check_live()?;
        if self.exhausted || self.window_buffered() {
            return Ok(false);
        }

        self.op.begin()?;
        let token = self.op.token.clone();
        let result = cancellable(&token, self.fill()).await;
        self.op.end();
        result
    }

    fn window_buffered(&self) -> bool {
        self.state
            .remaining()
            .is_some_and(|remaining| self.visible as u64 >= remaining)
    }

    async fn fill(&mut self) -> Result<bool> {
        let before = self.visible;
        loop {
            let next = poll_fn(|cx| Pin::new(&mut self.source).poll_next(cx)).await;
            match next {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    self.buffered += chunk.len();
                    self.segments.push_back(chunk);
                    self.apply_data_constraint();
                    if self.visible > before {
                        return Ok(true);
                    }
                }
                Some(Err(err)) => return Err(err.into()),
                None => {
                    debug!(
                        position = self.state.position(),
                        buffered = self.buffered,
                        "source exhausted"
                    );
                    self.exhausted = true;
                    return Ok(false);
                }
            }
        }
    }

    fn consume(&mut self, n: usize) {
        self.buffered -= n;
        self.visible -= n;
        self.state.advance(n);

        let mut left = n;
        while left > 0 {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            if front.len() <= left {
                left -= front.len();
                self.segments.pop_front();
            } else {
                front.advance(left);
                left = 0;
            }
        }
    }
}

impl<R> StreamReader<ReaderStream<R>>
where
    R: AsyncRead + Unpin,
{
    /// Read from an [`AsyncRead`] in chunks of the configured buffer size.
    pub fn from_async_read(reader: R) -> Self {
        Self::from_async_read_with_config(reader, &CodecConfig::default())
    }

    pub fn from_async_read_with_config(reader: R, config: &CodecConfig) -> Self {
        let stream = ReaderStream::with_capacity(reader, config.effective_buffer_capacity());
        Self::with_config(stream, config)
    }
}

impl<S> ProtoReader for StreamReader<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    fn state(&self) -> &ReaderState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ReaderState {
        &mut self.state
    }

    async fn read_raw_varint(&mut self) -> Result<Option<u64>> {
        loop {
            let segments = self.segments.iter().map(|segment| &segment[..]);
            match decode_varint_segments(segments, self.visible) {
                Ok(Some((value, len))) => {
                    self.consume(len);
                    return Ok(Some(value));
                }
                Ok(None) => {
                    if !self.request_more_data().await? {
                        return Ok(None);
                    }
                }
                Err(EncodingError::Truncated) => {
                    if !self.request_more_data().await? {
                        return Err(CodecError::EndOfStream);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn read_raw_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < dst.len() {
            if self.visible == 0 {
                if !self.request_more_data().await? {
                    return Err(CodecError::EndOfStream);
                }
                continue;
            }

            let front = self.segments.front().ok_or(CodecError::EndOfStream)?;
            let n = front.len().min(self.visible).min(dst.len() - filled);
            dst[filled..filled + n].copy_from_slice(&front[..n]);
            self.consume(n);
            filled += n;
        }
        Ok(())
    }

    async fn skip_raw(&mut self, len: u64) -> Result<()> {
        let mut left = len;
        while left > 0 {
            if self.visible == 0 {
                if !self.request_more_data().await? {
                    return Err(CodecError::EndOfStream);
                }
                continue;
            }

            let n = usize::try_from(left).map_or(self.visible, |left| left.min(self.visible));
            self.consume(n);
            left -= n as u64;
        }
        Ok(())
    }

    fn apply_data_constraint(&mut self) {
        self.visible = match self.state.remaining() {
            Some(remaining) => usize::try_from(remaining).map_or(self.buffered, |remaining| {
                remaining.min(self.buffered)
            }),
            None => self.buffered,
        };
    }

    fn remove_data_constraint(&mut self) {
        self.visible = self.buffered;
    }
}
