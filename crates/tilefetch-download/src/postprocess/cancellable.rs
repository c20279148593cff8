//! A reader that polls a cancellation token between reads.

use std::io::{self, Read};

use tokio_util::sync::CancellationToken;

/// Default number of bytes read between cancellation checks.
pub const DEFAULT_CHECK_INTERVAL: u64 = 32 * 1024 * 1024;

/// Marker carried inside the `io::Error` a cancelled read returns.
#[derive(Debug, thiserror::Error)]
#[error("operation cancelled")]
pub struct ReadCancelled;

/// Wraps a reader and fails with [`ReadCancelled`] once the token fires.
///
/// The token is checked before the first read and then whenever at least
/// `interval` bytes went by since the previous check. The error kind is
/// `Other`, not `Interrupted`, so `io::copy` does not retry it.
pub struct CancellableReader<'a, R> {
    inner: R,
    cancel: &'a CancellationToken,
    interval: u64,
    since_check: u64,
}

impl<'a, R: Read> CancellableReader<'a, R> {
    pub const fn new(inner: R, cancel: &'a CancellationToken, interval: u64) -> Self {
        Self {
            inner,
            cancel,
            interval,
            since_check: interval,
        }
    }
}

impl<R: Read> Read for CancellableReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.since_check >= self.interval {
            if self.cancel.is_cancelled() {
                return Err(io::Error::other(ReadCancelled));
            }
            self.since_check = 0;
        }
        let n = self.inner.read(buf)?;
        self.since_check += n as u64;
        Ok(n)
    }
}

/// Whether an I/O error came from a cancelled [`CancellableReader`].
#[must_use]
pub fn is_cancelled_read(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<ReadCancelled>())
}
