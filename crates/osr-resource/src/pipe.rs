//! Bounded in-process byte pipe.
//!
//! A fixed-capacity ring buffer shared by one [`PipeWriter`] and one
//! [`PipeReader`]. Writes block while the buffer is full and reads block
//! while it is empty, so memory use is bounded by the capacity no matter how
//! much data flows through.
//!
//! End-of-stream handling:
//! - [`PipeWriter::close`] marks a clean end; the reader drains the buffer
//!   and then sees `Ok(0)`.
//! - Dropping the writer without closing marks the stream abandoned; the
//!   reader drains the buffer and then fails with `BrokenPipe`.
//! - Dropping the reader makes every further write fail with `BrokenPipe`.

use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex};

/// Fixed-capacity byte ring.
struct RingBuffer {
    buf: Box<[u8]>,
    /// Index of the first readable byte.
    head: usize,
    /// Number of readable bytes.
    len: usize,
}

impl RingBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Copy as much of `data` as fits. Returns the number of bytes taken.
    fn push(&mut self, data: &[u8]) -> usize {
        let cap = self.capacity();
        let n = data.len().min(cap - self.len);
        let tail = (self.head + self.len) % cap;
        let first = n.min(cap - tail);
        self.buf[tail..tail + first].copy_from_slice(&data[..first]);
        self.buf[..n - first].copy_from_slice(&data[first..n]);
        self.len += n;
        n
    }

    /// Move up to `out.len()` bytes out of the ring. Returns the count.
    fn pop(&mut self, out: &mut [u8]) -> usize {
        let cap = self.capacity();
        let n = out.len().min(self.len);
        let first = n.min(cap - self.head);
        out[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        out[first..n].copy_from_slice(&self.buf[..n - first]);
        self.head = (self.head + n) % cap;
        self.len -= n;
        n
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriterState {
    Open,
    Closed,
    Abandoned,
}

struct PipeState {
    ring: RingBuffer,
    writer: WriterState,
    reader_alive: bool,
}

struct Shared {
    state: Mutex<PipeState>,
    /// Signalled when bytes arrive or the writer finishes.
    readable: Condvar,
    /// Signalled when space frees up or the reader goes away.
    writable: Condvar,
}

/// Create a pipe holding at most `capacity` bytes in flight.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    assert!(capacity > 0, "pipe capacity must be non-zero");
    let shared = Arc::new(Shared {
        state: Mutex::new(PipeState {
            ring: RingBuffer::with_capacity(capacity),
            writer: WriterState::Open,
            reader_alive: true,
        }),
        readable: Condvar::new(),
        writable: Condvar::new(),
    });
    (
        PipeWriter {
            shared: Arc::clone(&shared),
        },
        PipeReader { shared },
    )
}

/// Write end of a [`pipe`].
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Signal a clean end-of-stream. Idempotent.
    pub fn close(&mut self) {
        let mut state = self.shared.state.lock().expect("pipe lock poisoned");
        if state.writer == WriterState::Open {
            state.writer = WriterState::Closed;
        }
        self.shared.readable.notify_all();
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.state.lock().expect("pipe lock poisoned");
        loop {
            if !state.reader_alive {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "pipe read end is closed",
                ));
            }
            if state.writer != WriterState::Open {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "write after pipe was closed",
                ));
            }
            if !state.ring.is_full() {
                let n = state.ring.push(buf);
                self.shared.readable.notify_one();
                return Ok(n);
            }
            state = self.shared.writable.wait(state).expect("pipe lock poisoned");
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Buffered bytes are already visible to the reader.
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().expect("pipe lock poisoned");
        if state.writer == WriterState::Open {
            state.writer = WriterState::Abandoned;
        }
        self.shared.readable.notify_all();
    }
}

/// Read end of a [`pipe`].
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.state.lock().expect("pipe lock poisoned");
        loop {
            if !state.ring.is_empty() {
                let n = state.ring.pop(buf);
                self.shared.writable.notify_one();
                return Ok(n);
            }
            match state.writer {
                WriterState::Closed => return Ok(0),
                WriterState::Abandoned => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "pipe write end dropped before close",
                    ))
                }
                WriterState::Open => {
                    state = self.shared.readable.wait(state).expect("pipe lock poisoned");
                }
            }
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().expect("pipe lock poisoned");
        state.reader_alive = false;
        self.shared.writable.notify_all();
    }
}

impl std::fmt::Debug for PipeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeWriter").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for PipeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeReader").finish_non_exhaustive()
    }
}
