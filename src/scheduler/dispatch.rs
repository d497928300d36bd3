// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! The dispatch loop and the endpoint state it owns.
//!
//! One iteration, in order:
//!
//! 1. stop if the cancellation signal fired;
//! 2. run at most one job;
//! 3. stop if the cancellation signal fired;
//! 4. serve at most one call request;
//! 5. if neither 2 nor 4 found work, run every loop job once (or, with no
//!    loop jobs registered, wait on the doorbell with an adaptive timeout).
//!
//! Only this loop's thread ever invokes the native library, which is what
//! makes the invoker and its cache safe without a dedicated lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use tracing::{debug, info};

use super::doorbell::{Doorbell, IdleBackoff};
use super::jobs::JobChannel;
use super::loop_jobs::{LoopJobRegistry, LoopJobs};
use super::queue::CallQueue;
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::native::Invoker;
use crate::shutdown::{Lifecycle, LoopState};
use crate::telemetry::{CallSpan, DispatchStats, SpanExt};

/// Everything the dispatch thread and its producers share.
pub struct Endpoint {
    pub(crate) config: DispatchConfig,
    pub(crate) invoker: Invoker,
    pub(crate) calls: CallQueue,
    pub(crate) jobs: JobChannel,
    pub(crate) loop_jobs: LoopJobRegistry,
    pub(crate) doorbell: Arc<Doorbell>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) stats: DispatchStats,
    dedicated_thread: OnceLock<ThreadId>,
    next_request_id: AtomicU64,
}

impl Endpoint {
    pub fn new(invoker: Invoker, config: DispatchConfig) -> Self {
        let doorbell = Arc::new(Doorbell::new());
        Self {
            calls: CallQueue::new("call queue", config.call_queue_capacity, doorbell.clone()),
            jobs: JobChannel::new(config.job_capacity, doorbell.clone()),
            loop_jobs: LoopJobRegistry::new(),
            doorbell,
            lifecycle: Lifecycle::new(),
            stats: DispatchStats::new(),
            dedicated_thread: OnceLock::new(),
            next_request_id: AtomicU64::new(1),
            invoker,
            config,
        }
    }

    /// The thread running the loop, once it has started.
    pub fn dedicated_thread(&self) -> Option<ThreadId> {
        self.dedicated_thread.get().copied()
    }

    pub fn is_dedicated_thread(&self) -> bool {
        self.dedicated_thread() == Some(thread::current().id())
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Stop accepting work and wake the loop so it observes cancellation.
    pub(crate) fn cancel(&self) {
        self.calls.close();
        self.jobs.close();
        self.lifecycle.cancel();
        self.doorbell.ring();
    }

    /// Fail every queued request and job with `Shutdown`. Safe from any
    /// thread since it only touches the queues.
    pub(crate) fn abandon_pending(&self) -> usize {
        self.calls.close();
        self.jobs.close();

        let calls = self.calls.drain();
        let jobs = self.jobs.drain();
        let count = calls.len() + jobs.len();

        for request in calls {
            request.complete(Err(DispatchError::Shutdown));
        }
        for job in jobs {
            job.abandon(DispatchError::Shutdown);
        }
        if count > 0 {
            self.stats.record_abandoned(count);
        }
        count
    }

    fn run_one_job(&self) -> bool {
        let Some(job) = self.jobs.try_pop() else {
            return false;
        };
        let _ = job.run();
        self.stats.record_job(false);
        true
    }

    fn serve_one_call(&self) -> bool {
        let Some(request) = self.calls.try_pop() else {
            return false;
        };

        let span = CallSpan::queued(request.id, &request.name, request.lane);
        let _entered = span.enter();
        span.record("queued_us", request.enqueued_at.elapsed().as_micros() as u64);

        let result = self.invoker.invoke(&request.name, &request.args);
        span.record_result(&result);
        self.stats.record_served(result.is_ok());

        if !request.complete(result) {
            debug!("caller stopped waiting before the result arrived");
        }
        true
    }
}

/// Marks the loop terminated and fails leftovers even if the loop unwinds.
struct TerminationGuard<'a> {
    endpoint: &'a Endpoint,
}

impl Drop for TerminationGuard<'_> {
    fn drop(&mut self) {
        let abandoned = self.endpoint.abandon_pending();
        self.endpoint.lifecycle.advance(LoopState::Terminated);
        info!(abandoned, "dispatch loop terminated");
    }
}

/// Body of the dedicated thread. Returns once cancellation is observed.
pub(crate) fn run(endpoint: Arc<Endpoint>) {
    let ep = endpoint.as_ref();
    let _ = ep.dedicated_thread.set(thread::current().id());
    let _guard = TerminationGuard { endpoint: ep };

    ep.lifecycle.advance(LoopState::Running);
    info!(
        thread = ?thread::current().id(),
        library = %ep.invoker.library().describe(),
        "dispatch loop running"
    );

    let mut loop_jobs = LoopJobs::default();
    let mut backoff = IdleBackoff::new(ep.config.idle_wait_max);

    loop {
        if ep.lifecycle.is_cancelled() {
            break;
        }
        let ran_job = ep.run_one_job();

        if ep.lifecycle.is_cancelled() {
            break;
        }
        let served_call = ep.serve_one_call();

        if ran_job || served_call {
            backoff.reset();
            continue;
        }

        ep.loop_jobs.adopt(&mut loop_jobs);
        if loop_jobs.is_empty() {
            ep.doorbell.wait(backoff.next_wait());
        } else {
            loop_jobs.run_all();
            ep.stats.record_loop_tick();
        }
    }

    debug!("cancellation observed");
}
