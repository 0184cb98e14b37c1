//! Streaming uploads over a blocking put-object call.
//!
//! The store only offers "upload this whole stream", a single blocking call.
//! An upload session bridges that to an incremental writer:
//!
//! ```text
//!  caller ── write ──▶ PipeWriter ═╗ bounded ring ╔═ PipeReader ──▶ put_object (worker)
//!  caller ── close ──▶ end-of-stream ............... put returns ──▶ completion
//!  caller ◀── close returns ◀──────────────────────────────────────── outcome
//! ```
//!
//! Writes block while the ring is full (backpressure). `close` ends the
//! stream and then waits for the worker's outcome, so a successful `close`
//! means the object is stored.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use osr_store::{ObjectMetadata, ObjectStoreClient};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::address::ObjectAddress;
use crate::error::{ResourceError, ResourceResult};
use crate::executor::UploadExecutor;
use crate::pipe::{pipe, PipeWriter};

type Outcome = Result<ObjectMetadata, String>;

/// Starts upload sessions on a shared [`UploadExecutor`].
#[derive(Clone)]
pub struct StreamingUploader {
    client: Arc<dyn ObjectStoreClient>,
    executor: Arc<UploadExecutor>,
    pipe_capacity: usize,
}

impl StreamingUploader {
    /// Create an uploader whose sessions buffer at most `pipe_capacity` bytes.
    pub fn new(
        client: Arc<dyn ObjectStoreClient>,
        executor: Arc<UploadExecutor>,
        pipe_capacity: usize,
    ) -> Self {
        Self {
            client,
            executor,
            pipe_capacity,
        }
    }

    /// Open an upload session to `address`.
    ///
    /// Blocks while every executor worker is busy. Fails with
    /// `ExecutorShutdown` if the executor no longer accepts work.
    pub fn open(&self, address: &ObjectAddress) -> ResourceResult<UploadWriter> {
        let session = Uuid::now_v7();
        let target = address.uri();
        let (writer, mut reader) = pipe(self.pipe_capacity);
        let (done_tx, done_rx) = mpsc::sync_channel::<Outcome>(1);

        let client = Arc::clone(&self.client);
        let bucket = address.bucket().to_string();
        let key = address.key().to_string();
        let job_target = target.clone();
        self.executor.submit(Box::new(move || {
            debug!(%session, target = %job_target, "upload started");
            let outcome = client.put_object(&bucket, &key, &mut reader);
            // Release the read end first so a writer blocked on a failed
            // upload wakes up with `BrokenPipe`.
            drop(reader);
            match &outcome {
                Ok(meta) => {
                    debug!(%session, target = %job_target, len = meta.content_length, "upload finished")
                }
                Err(e) => error!(%session, target = %job_target, error = %e, "upload failed"),
            }
            // The receiver is gone only if the writer was abandoned.
            let _ = done_tx.send(outcome.map_err(|e| e.to_string()));
        }))?;

        Ok(UploadWriter {
            pipe: Some(writer),
            completion: done_rx,
            target,
            session,
            bytes_written: 0,
            _executor: Arc::clone(&self.executor),
        })
    }
}

impl std::fmt::Debug for StreamingUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingUploader")
            .field("executor", &self.executor)
            .field("pipe_capacity", &self.pipe_capacity)
            .finish()
    }
}

/// Write end of an upload session.
///
/// Bytes reach the store in the order written. Call [`close`](Self::close)
/// to finish the upload and learn its outcome; a write that returned `Ok`
/// does not mean the data was stored. Dropping the writer without closing it
/// abandons the upload: the worker fails on the broken pipe and nothing is
/// stored, with no error visible to the caller.
pub struct UploadWriter {
    pipe: Option<PipeWriter>,
    completion: Receiver<Outcome>,
    target: String,
    session: Uuid,
    bytes_written: u64,
    /// Keeps the executor alive until this session is finished.
    _executor: Arc<UploadExecutor>,
}

impl UploadWriter {
    /// Bytes accepted into the pipe so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Location being written.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// End the stream and wait for the upload to complete.
    ///
    /// Fails with `UploadFailure` if the store rejected or aborted the put.
    pub fn close(mut self) -> ResourceResult<ObjectMetadata> {
        if let Some(mut pipe) = self.pipe.take() {
            pipe.close();
        }
        let outcome = self.completion.recv().map_err(|_| ResourceError::UploadFailure {
            target: self.target.clone(),
            message: "upload worker exited without reporting an outcome".into(),
        })?;
        match outcome {
            Ok(meta) => {
                debug!(session = %self.session, target = %self.target, bytes = self.bytes_written, "upload stream closed");
                Ok(meta)
            }
            Err(message) => Err(ResourceError::UploadFailure {
                target: self.target.clone(),
                message,
            }),
        }
    }
}

impl Write for UploadWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let pipe = self
            .pipe
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "upload stream is closed"))?;
        let n = pipe.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for UploadWriter {
    fn drop(&mut self) {
        if self.pipe.take().is_some() {
            warn!(
                session = %self.session,
                target = %self.target,
                bytes = self.bytes_written,
                "upload stream dropped without close; upload is lost"
            );
        }
    }
}

impl std::fmt::Debug for UploadWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadWriter")
            .field("session", &self.session)
            .field("target", &self.target)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}
