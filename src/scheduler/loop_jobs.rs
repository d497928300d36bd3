// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Repeating callbacks run once per idle iteration of the dispatch loop.
//!
//! Registration may happen on any thread. New jobs wait in a pending list
//! until the loop adopts them at the start of its next idle phase, so the
//! loop runs its own copy without holding a lock while callbacks execute.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::native::panic_message;

/// A repeating idle callback. It may block (a native message pump waiting
/// for its next message is the usual example), which stalls the whole loop
/// until it returns.
pub type LoopJob = Box<dyn FnMut() + Send + 'static>;

#[derive(Default)]
pub struct LoopJobRegistry {
    pending: Mutex<Vec<LoopJob>>,
    has_pending: AtomicBool,
    registered: AtomicUsize,
}

impl LoopJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a loop job. Jobs run in registration order.
    pub fn register(&self, job: LoopJob) {
        self.pending.lock().push(job);
        self.registered.fetch_add(1, Ordering::AcqRel);
        self.has_pending.store(true, Ordering::Release);
    }

    /// Append several jobs so the loop adopts them in the same idle phase.
    pub fn register_all<I>(&self, jobs: I)
    where
        I: IntoIterator<Item = LoopJob>,
    {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.extend(jobs);
        self.registered.fetch_add(pending.len() - before, Ordering::AcqRel);
        self.has_pending.store(true, Ordering::Release);
    }

    /// Total jobs ever registered.
    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::Acquire)
    }

    /// Move pending registrations into the loop's own list.
    pub(crate) fn adopt(&self, into: &mut LoopJobs) {
        if !self.has_pending.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut pending = self.pending.lock();
        debug!(count = pending.len(), "adopting loop jobs");
        into.jobs.append(&mut pending);
    }
}

/// Loop jobs owned by the dispatch thread.
#[derive(Default)]
pub(crate) struct LoopJobs {
    jobs: Vec<LoopJob>,
}

impl LoopJobs {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Run each job once, in order. A job that panics is logged and dropped
    /// so it cannot fault on every subsequent tick.
    pub fn run_all(&mut self) -> usize {
        let mut dropped = 0;
        self.jobs.retain_mut(|job| match catch_unwind(AssertUnwindSafe(|| job())) {
            Ok(()) => true,
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "loop job panicked; unregistering it");
                dropped += 1;
                false
            }
        });
        dropped
    }
}
