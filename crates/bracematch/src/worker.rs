//! Bounded worker pool for search tasks.
//!
//! A small fixed set of named threads drains a shared job channel. The pool only ever runs the
//! tasks coordinators hand it; coordinators guarantee at most one active task per editor, so
//! the pool size bounds how many editors can search concurrently, not queue depth.

use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

/// Default number of worker threads.
pub const DEFAULT_WORKER_COUNT: usize = 5;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A bounded pool of worker threads.
///
/// Cloning the pool clones the submission handle; worker threads exit once every handle is
/// dropped and the queue drains.
#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::Sender<Job>,
}

impl WorkerPool {
    /// Create a pool with [`DEFAULT_WORKER_COUNT`] threads.
    pub fn new() -> Self {
        Self::with_threads(DEFAULT_WORKER_COUNT)
    }

    /// Create a pool with `threads` worker threads (at least one).
    pub fn with_threads(threads: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        for _ in 0..threads.max(1) {
            let rx = Arc::clone(&rx);
            thread::spawn(move || worker_loop(rx));
        }

        Self { tx }
    }

    /// Queue `job` for execution on some worker thread.
    ///
    /// Jobs submitted after all workers exited are silently dropped; that only happens during
    /// teardown, when results would be unobservable anyway.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        let _ = self.tx.send(Box::new(job));
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").finish_non_exhaustive()
    }
}

fn worker_loop(rx: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = rx.lock().recv();
        match job {
            Ok(job) => job(),
            Err(_) => return,
        }
    }
}
