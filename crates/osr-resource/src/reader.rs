use std::io::{self, Read};

use osr_store::ObjectStream;
use tracing::debug;

/// Sequential reader over a fetched object.
///
/// The remote stream is released as soon as end-of-stream is reached, on
/// [`close`](Self::close), or on drop, whichever comes first. A reader is not
/// restartable: after release every read returns `Ok(0)`. Open the resource
/// again for a fresh fetch.
pub struct ObjectReader {
    inner: Option<ObjectStream>,
    target: String,
    bytes_read: u64,
}

impl ObjectReader {
    pub(crate) fn new(inner: ObjectStream, target: String) -> Self {
        debug!(target = %target, "object stream opened");
        Self {
            inner: Some(inner),
            target,
            bytes_read: 0,
        }
    }

    /// Bytes delivered to the caller so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Returns `true` once the remote stream has been released.
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Release the remote stream.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.inner.take().is_some() {
            debug!(target = %self.target, bytes = self.bytes_read, "object stream released");
        }
    }
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(0);
        };
        let n = match inner.read(buf) {
            Ok(n) => n,
            Err(e) => {
                if e.kind() != io::ErrorKind::Interrupted {
                    self.release();
                }
                return Err(e);
            }
        };
        if n == 0 && !buf.is_empty() {
            self.release();
        }
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl Drop for ObjectReader {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("target", &self.target)
            .field("bytes_read", &self.bytes_read)
            .field("released", &self.is_released())
            .finish()
    }
}
