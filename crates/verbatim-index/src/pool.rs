//! Fixed-size worker pool
//!
//! Jobs are pulled from one shared channel by `size()` threads. Every job
//! receives the [`Worker`] that runs it, which is how per-worker counters
//! are attributed without any thread-local lookup.
//!
//! A pool built with zero workers accepts jobs but never runs them, and
//! `wait()` returns at once instead of blocking forever.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

type Job = Box<dyn FnOnce(Worker) + Send + 'static>;

/// Identity of the worker executing a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Worker {
    index: usize,
}

impl Worker {
    /// Build a worker handle directly, for callers running engine code
    /// outside the pool (tests, single-threaded tools).
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self { index }
    }

    /// Position of this worker, `0..pool.size()`
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

/// Count of submitted but unfinished jobs
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn start(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

/// Thread pool running `FnOnce(Worker)` jobs
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    // Held so queued jobs survive in a pool without workers.
    receiver: Receiver<Job>,
    pending: Arc<Pending>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let pending = Arc::new(Pending::default());
        let mut handles = Vec::with_capacity(threads);

        for index in 0..threads {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("verbatim-worker-{index}"))
                .spawn(move || run_worker(Worker::new(index), &receiver, &pending))?;
            handles.push(handle);
        }

        debug!("Started worker pool with {} threads", threads);
        Ok(Self {
            sender: Some(sender),
            receiver,
            pending,
            handles,
        })
    }

    /// Queue a job; never blocks
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce(Worker) + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return;
        };
        self.pending.start();
        if sender.send(Box::new(job)).is_err() {
            // Every receiver is gone, nothing will ever run it.
            self.pending.finish();
            error!("Worker pool is shut down, job dropped");
        }
    }

    /// Block until every submitted job has finished
    pub fn wait(&self) {
        if self.handles.is_empty() {
            return;
        }
        self.pending.wait_idle();
    }

    /// Number of worker threads
    #[must_use]
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Jobs submitted but not yet finished
    #[must_use]
    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    /// Jobs still waiting in the queue
    #[must_use]
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain the queue and exit.
        self.sender.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread exited abnormally");
            }
        }
    }
}

fn run_worker(worker: Worker, receiver: &Receiver<Job>, pending: &Pending) {
    while let Ok(job) = receiver.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job(worker))) {
            error!(
                worker = worker.index(),
                "Job panicked: {}",
                panic_message(payload.as_ref())
            );
        }
        pending.finish();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_runs_all_jobs() {
        let pool = WorkerPool::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait();
        assert_eq!(counter.load(Ordering::Relaxed), 100);
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn test_worker_index_in_range() {
        let pool = WorkerPool::new(3).unwrap();
        let seen = Arc::new(Mutex::new(HashSet::new()));
        for _ in 0..50 {
            let seen = Arc::clone(&seen);
            pool.submit(move |worker| {
                seen.lock().insert(worker.index());
            });
        }
        pool.wait();
        assert_eq!(pool.size(), 3);
        assert!(seen.lock().iter().all(|&i| i < 3));
    }

    #[test]
    fn test_wait_then_reuse() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for round in 1..=3 {
            let c = Arc::clone(&counter);
            pool.submit(move |_| {
                c.fetch_add(1, Ordering::Relaxed);
            });
            pool.wait();
            assert_eq!(counter.load(Ordering::Relaxed), round);
        }
    }

    #[test]
    fn test_panicking_job_is_confined() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(|_| panic!("bad file"));
        let c = Arc::clone(&counter);
        pool.submit(move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        });
        pool.wait();
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_zero_workers_leave_jobs_pending() {
        let pool = WorkerPool::new(0).unwrap();
        pool.submit(|_| {});
        pool.wait();
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.pending(), 1);
        assert_eq!(pool.queued(), 1);
    }

    #[test]
    fn test_drop_drains_queue() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(2).unwrap();
            for _ in 0..20 {
                let c = Arc::clone(&counter);
                pool.submit(move |_| {
                    c.fetch_add(1, Ordering::Relaxed);
                });
            }
        }
        assert_eq!(counter.load(Ordering::Relaxed), 20);
    }
}
