//! Persistent worker pool for flush fan-out
//!
//! A fixed set of OS threads pulls boxed jobs from a shared crossbeam
//! channel. [`WorkerPool::submit`] returns a [`TaskHandle`] that blocks on
//! the job's result; waiting on every handle of a batch is the completion
//! barrier.
//!
//! A panicking job is caught on the worker and reported through its handle
//! as [`PoolError::Panicked`]; the worker keeps running.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error};

use crate::error::PoolError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one)
    pub fn new(threads: usize) -> io::Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = channel::unbounded::<Job>();

        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let receiver = receiver.clone();
            let worker = thread::Builder::new()
                .name(format!("tickline-flush-{id}"))
                .spawn(move || worker_loop(receiver))?;
            workers.push(worker);
        }

        debug!(threads, "flush worker pool started");

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queue `job` and return a handle to its result
    pub fn submit<F, R>(&self, job: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (result_tx, result_rx) = channel::bounded(1);

        let task: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job)).map_err(panic_message);
            // The handle may have been dropped; nothing to report to
            let _ = result_tx.send(result);
        });

        // On a closed channel the task (and its result sender) is dropped,
        // which the handle reports as `Lost`
        if let Some(sender) = &self.sender {
            let _ = sender.send(task);
        }

        TaskHandle { receiver: result_rx }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop once the queue is empty
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("flush worker thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.workers.len())
            .finish()
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        job();
    }
}

/// Completion handle for a submitted job
#[must_use = "a task handle does nothing unless waited on"]
pub struct TaskHandle<R> {
    receiver: Receiver<Result<R, String>>,
}

impl<R> TaskHandle<R> {
    /// Block until the job finishes
    pub fn wait(self) -> Result<R, PoolError> {
        match self.receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(PoolError::Panicked(message)),
            Err(_) => Err(PoolError::Lost),
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
