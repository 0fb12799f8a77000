//! Bounded background worker pool.
//!
//! Jobs go through a bounded channel to a fixed set of threads. Shutdown
//! closes the channel, lets the workers drain what is queued and joins them.

use crossbeam_channel::{bounded, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::util::{Error, Result};

/// Fixed-size pool running `handler` on every submitted job.
pub struct WorkerPool<J> {
    /// `None` once shut down.
    tx: Option<Sender<J>>,
    handles: Vec<JoinHandle<()>>,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Spawn `workers` threads named `{name}-{i}` sharing a queue of `capacity` jobs.
    pub fn spawn<F>(name: &str, workers: usize, capacity: usize, handler: F) -> Result<Self>
    where
        F: Fn(J) + Send + Sync + 'static,
    {
        let (tx, rx) = bounded::<J>(capacity);
        let handler = Arc::new(handler);
        let mut pool = Self { tx: Some(tx), handles: Vec::with_capacity(workers) };

        for i in 0..workers.max(1) {
            let rx = rx.clone();
            let handler = Arc::clone(&handler);
            let thread_name = format!("{name}-{i}");
            let worker = thread_name.clone();
            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || {
                    // Ends when every sender is gone and the queue is empty
                    for job in rx.iter() {
                        // A panicking job must not take the worker (and its receiver) down.
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(job))) {
                            tracing::error!(worker = %worker, panic = panic_message(&*payload), "job panicked");
                        }
                    }
                })
                .map_err(|e| Error::ResourceCreation(format!("failed to spawn {name} worker: {e}")))?;
            pool.handles.push(handle);
        }
        Ok(pool)
    }
}

impl<J> WorkerPool<J> {
    /// Queue a job, blocking while the queue is full.
    pub fn submit(&self, job: J) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(Error::ShuttingDown)?;
        tx.send(job).map_err(|_| Error::ShuttingDown)
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    pub fn is_running(&self) -> bool {
        self.tx.is_some()
    }

    /// Close the queue and wait for every worker to finish its jobs.
    pub fn shutdown(&mut self) {
        self.tx.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl<J> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
