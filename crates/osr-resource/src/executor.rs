use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::error::{ResourceError, ResourceResult};

/// A unit of work run on an upload worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded pool of upload worker threads.
///
/// Workers pull jobs from a rendezvous channel, so [`submit`](Self::submit)
/// blocks until a worker is idle rather than queueing or failing. Each job is
/// expected to hold its worker for the whole of one blocking upload.
///
/// Lifecycle: workers start in [`new`](Self::new). [`shutdown`](Self::shutdown)
/// (also run on drop) rejects further submissions, then waits for every
/// in-flight job to finish. Write streams feeding in-flight uploads must be
/// closed or dropped for shutdown to complete.
pub struct UploadExecutor {
    sender: Mutex<Option<SyncSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    busy: Arc<AtomicUsize>,
    size: usize,
}

impl UploadExecutor {
    /// Start an executor with `size` workers.
    pub fn new(size: usize) -> ResourceResult<Self> {
        if size == 0 {
            return Err(ResourceError::Config(
                "upload executor needs at least one worker".into(),
            ));
        }

        let (sender, receiver) = mpsc::sync_channel::<Job>(0);
        let receiver = Arc::new(Mutex::new(receiver));
        let busy = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = Arc::clone(&receiver);
            let busy = Arc::clone(&busy);
            let handle = thread::Builder::new()
                .name(format!("osr-upload-{index}"))
                .spawn(move || worker_loop(index, &receiver, &busy))?;
            workers.push(handle);
        }

        info!(workers = size, "upload executor started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            busy,
            size,
        })
    }

    /// Hand `job` to an idle worker, blocking while all workers are busy.
    pub fn submit(&self, job: Job) -> ResourceResult<()> {
        let sender = self
            .sender
            .lock()
            .expect("executor lock poisoned")
            .clone()
            .ok_or(ResourceError::ExecutorShutdown)?;
        sender.send(job).map_err(|_| ResourceError::ExecutorShutdown)
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of jobs currently running.
    pub fn active(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    /// Returns `true` once shutdown has begun.
    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().expect("executor lock poisoned").is_none()
    }

    /// Reject new jobs, then wait for in-flight jobs to finish. Idempotent.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().expect("executor lock poisoned").take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().expect("executor lock poisoned"));
        let current = thread::current().id();
        for handle in workers {
            // A job dropping the last executor handle must not join itself.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("upload worker terminated abnormally");
            }
        }
        info!("upload executor shut down");
    }
}

fn worker_loop(index: usize, receiver: &Mutex<Receiver<Job>>, busy: &AtomicUsize) {
    loop {
        let job = {
            let rx = receiver.lock().expect("executor lock poisoned");
            rx.recv()
        };
        let Ok(job) = job else {
            debug!(worker = index, "upload worker exiting");
            return;
        };

        busy.fetch_add(1, Ordering::SeqCst);
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(worker = index, "upload job panicked");
        }
        busy.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for UploadExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for UploadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadExecutor")
            .field("size", &self.size)
            .field("active", &self.active())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
