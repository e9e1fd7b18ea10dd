//! Incremental-stream backend.
//!
//! [`StreamReader`] consumes bytes as they are delivered by a chunked source
//! and suspends when a value straddles data that has not arrived yet.
//! [`StreamWriter`] buffers output and suspends while the sink accepts it.
//!
//! Each instance runs one operation at a time. A [`DisposeHandle`] lets
//! another task tear the instance down; a suspended operation then resolves
//! to [`CodecError::Disposed`](crate::CodecError::Disposed) instead of
//! completing against a dead resource.

mod reader;
mod writer;

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{CodecError, Result};

pub use reader::StreamReader;
pub use writer::StreamWriter;

/// Disposes a stream reader or writer from outside its task.
#[derive(Debug, Clone)]
pub struct DisposeHandle {
    token: CancellationToken,
}

impl DisposeHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Cancel any suspended operation and refuse all further ones.
    pub fn dispose(&self) {
        debug!("disposing stream codec");
        self.token.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Busy flag plus cancellation shared by both stream backends.
///
/// The flag is only observed as set when a suspended future was dropped
/// mid-flight; the instance is unusable from then on.
#[derive(Debug, Default)]
struct Operation {
    busy: bool,
    token: CancellationToken,
}

impl Operation {
    fn check_live(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(CodecError::Disposed);
        }
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        self.check_live()?;
        if self.busy {
            return Err(CodecError::ConcurrentOperation);
        }
        self.busy = true;
        Ok(())
    }

    fn end(&mut self) {
        self.busy = false;
    }

    fn handle(&self) -> DisposeHandle {
        DisposeHandle::new(self.token.clone())
    }
}

/// Run `fut` unless `token` fires first.
async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(CodecError::Disposed),
        result = fut => result,
    }
}
