//! Bounded-concurrency job queue.
//!
//! Jobs run on a fixed pool of worker threads. Submission never blocks and
//! has no limit; results are drained one at a time in the order the jobs
//! finish, not the order they were submitted.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{JobPanicked, PipelineError, Result};

pub type JobId = u64;

type Finished<T> = (JobId, std::thread::Result<T>);

pub struct ConcurrentAnnotationQueue<T> {
    pool: ThreadPool,
    tx: Sender<Finished<T>>,
    rx: Receiver<Finished<T>>,
    next_id: JobId,
    outstanding: usize,
}

impl<T> std::fmt::Debug for ConcurrentAnnotationQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentAnnotationQueue")
            .field("threads", &self.pool.current_num_threads())
            .field("outstanding", &self.outstanding)
            .finish()
    }
}

impl<T: Send + 'static> ConcurrentAnnotationQueue<T> {
    /// A queue running at most `threads` jobs at once.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("annotate-{i}"))
            .build()
            .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;
        let (tx, rx) = mpsc::channel();
        Ok(Self { pool, tx, rx, next_id: 0, outstanding: 0 })
    }

    /// Jobs submitted but not yet returned by [`next`](Self::next).
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn submit<F>(&mut self, job: F) -> JobId
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.outstanding += 1;

        let tx = self.tx.clone();
        self.pool.spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job));
            // The receiver lives as long as the queue; a send can only fail
            // after the queue itself was dropped.
            let _ = tx.send((id, result));
        });
        id
    }

    /// Block until any outstanding job finishes and return its result.
    /// `None` when nothing is outstanding.
    pub fn next(&mut self) -> Option<std::result::Result<T, JobPanicked>> {
        if self.outstanding == 0 {
            return None;
        }
        let (job, result) = self.rx.recv().ok()?;
        self.outstanding -= 1;
        Some(result.map_err(|payload| JobPanicked { job, message: panic_message(payload) }))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
