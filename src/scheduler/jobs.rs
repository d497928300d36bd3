// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! One-shot closures executed on the dispatch thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::error;

use super::doorbell::Doorbell;
use super::priority::Queued;
use super::queue::{Admission, BoundedQueue};
use crate::error::DispatchError;
use crate::native::panic_message;

/// Outcome of a job: `Ok` once it has run to completion.
pub type JobResult = Result<(), DispatchError>;
pub type JobRx = oneshot::Receiver<JobResult>;

/// Default job channel capacity.
pub const DEFAULT_JOB_CAPACITY: usize = 20;

type Action = Box<dyn FnOnce() + Send + 'static>;

/// A queued closure paired with its completion signal.
pub struct Job {
    action: Action,
    done: oneshot::Sender<JobResult>,
}

impl Job {
    pub fn new<F>(action: F) -> (Self, JobRx)
    where
        F: FnOnce() + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        (Self { action: Box::new(action), done }, rx)
    }

    /// Run the closure on the current thread and publish completion.
    pub fn run(self) -> JobResult {
        let result = catch_unwind(AssertUnwindSafe(self.action)).map_err(|payload| {
            let msg = panic_message(payload.as_ref());
            error!(panic = %msg, "job panicked on dispatch thread");
            DispatchError::JobPanicked(msg)
        });
        let _ = self.done.send(result.clone());
        result
    }

    /// Drop the closure unexecuted and tell the submitter why.
    pub fn abandon(self, reason: DispatchError) {
        let _ = self.done.send(Err(reason));
    }
}

impl Queued for Job {}

/// Bounded FIFO of jobs. Submitters block while it is full.
pub struct JobChannel {
    queue: BoundedQueue<Job>,
}

impl JobChannel {
    pub fn new(capacity: usize, doorbell: Arc<Doorbell>) -> Self {
        Self { queue: BoundedQueue::new("job channel", capacity, doorbell) }
    }

    pub fn submit(&self, job: Job) -> Result<(), DispatchError> {
        self.queue.push(job, Admission::Block)
    }

    pub fn try_pop(&self) -> Option<Job> {
        self.queue.try_pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn close(&self) {
        self.queue.close();
    }

    pub fn drain(&self) -> Vec<Job> {
        self.queue.drain()
    }
}
