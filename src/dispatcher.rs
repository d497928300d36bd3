// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Public entry points for reaching the native library.
//!
//! Every call either runs inline (the caller already is the dispatch thread)
//! or becomes exactly one [`CallRequest`] that receives exactly one result.
//!
//! Blocking entry points park the calling OS thread. Do not use them from
//! inside an async runtime; use the `*_async` variants and
//! [`CallHandle::wait_async`] there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::{CallResult, DispatchError};
use crate::native::{Invoker, NativeLibrary};
use crate::platform;
use crate::scheduler::dispatch::{self, Endpoint};
use crate::scheduler::{Admission, CallRequest, Job, JobResult, JobRx, Lane, LoopJob, ResultRx, WakeHook};
use crate::shutdown::{LoopState, ShutdownResult};
use crate::telemetry::{CallSpan, SpanExt, StatsSnapshot};

/// How long `start` waits for the new thread to report in.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configures and launches a [`Dispatcher`].
pub struct DispatcherBuilder {
    library: Arc<dyn NativeLibrary>,
    config: DispatchConfig,
    loop_jobs: Vec<LoopJob>,
}

impl DispatcherBuilder {
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a loop job that is in place before the loop's first
    /// iteration.
    pub fn loop_job<F>(mut self, job: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.loop_jobs.push(Box::new(job));
        self
    }

    /// Spawn the dedicated thread and wait until it is running.
    pub fn start(self) -> Result<Dispatcher, DispatchError> {
        let endpoint = Arc::new(Endpoint::new(Invoker::new(self.library), self.config.clone()));
        endpoint.loop_jobs.register_all(self.loop_jobs);

        let loop_endpoint = Arc::clone(&endpoint);
        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || dispatch::run(loop_endpoint))
            .map_err(|e| DispatchError::Spawn(e.to_string()))?;

        if !endpoint.lifecycle.wait_for(LoopState::Running, STARTUP_TIMEOUT) {
            endpoint.cancel();
            return Err(DispatchError::Spawn("dispatch thread did not report running".into()));
        }

        Ok(Dispatcher {
            endpoint,
            thread: Mutex::new(Some(handle)),
            pump_installed: AtomicBool::new(false),
        })
    }
}

/// Owner of the dedicated dispatch thread.
///
/// Dropping the dispatcher shuts it down with the configured timeout.
pub struct Dispatcher {
    endpoint: Arc<Endpoint>,
    thread: Mutex<Option<JoinHandle<()>>>,
    pump_installed: AtomicBool,
}

impl Dispatcher {
    pub fn builder(library: Arc<dyn NativeLibrary>) -> DispatcherBuilder {
        DispatcherBuilder {
            library,
            config: DispatchConfig::default(),
            loop_jobs: Vec::new(),
        }
    }

    /// Start with `config` and no initial loop jobs.
    pub fn start(library: Arc<dyn NativeLibrary>, config: DispatchConfig) -> Result<Self, DispatchError> {
        Self::builder(library).config(config).start()
    }

    /// Call `name` and wait for its result.
    pub fn call(&self, name: &str, args: &[usize]) -> CallResult {
        if self.endpoint.is_dedicated_thread() {
            return self.call_inline(name, args);
        }
        self.enqueue(name, args, Lane::Normal, Admission::Block)?.wait()
    }

    /// Like [`call`](Self::call), but jumps ahead of queued normal calls.
    pub fn call_priority(&self, name: &str, args: &[usize]) -> CallResult {
        if self.endpoint.is_dedicated_thread() {
            return self.call_inline(name, args);
        }
        self.enqueue(name, args, Lane::First, Admission::Block)?.wait()
    }

    /// Queue `name` and return a handle to its future result. Always
    /// enqueues, even on the dispatch thread.
    pub fn call_async(&self, name: &str, args: &[usize]) -> Result<CallHandle, DispatchError> {
        self.enqueue(name, args, Lane::Normal, self.producer_admission())
    }

    /// Priority-lane variant of [`call_async`](Self::call_async).
    pub fn call_async_priority(&self, name: &str, args: &[usize]) -> Result<CallHandle, DispatchError> {
        self.enqueue(name, args, Lane::First, self.producer_admission())
    }

    /// Queue without ever blocking; fails with `QueueFull` at capacity.
    pub fn try_call_async(&self, name: &str, args: &[usize], lane: Lane) -> Result<CallHandle, DispatchError> {
        self.enqueue(name, args, lane, Admission::Reject)
    }

    /// Run `action` once on the dispatch thread. On the dispatch thread
    /// itself the action runs before this returns.
    pub fn submit_job<F>(&self, action: F) -> Result<JobHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.endpoint.lifecycle.is_cancelled() {
            return Err(DispatchError::Shutdown);
        }
        let (job, rx) = Job::new(action);
        if self.endpoint.is_dedicated_thread() {
            let _ = job.run();
            self.endpoint.stats.record_job(true);
        } else {
            self.endpoint.jobs.submit(job)?;
        }
        Ok(JobHandle { rx, dedicated: self.endpoint.dedicated_thread() })
    }

    /// Register a callback run on every idle iteration.
    /// Register a closure to run on every idle tick.
    ///
    /// Fails with [`DispatchError::Shutdown`] once cancellation has been
    /// requested, since no further tick would ever run it.
    pub fn add_loop<F>(&self, job: F) -> Result<&Self, DispatchError>
    where
        F: FnMut() + Send + 'static,
    {
        self.accepting_loop_jobs()?;
        self.endpoint.loop_jobs.register(Box::new(job));
        self.endpoint.doorbell.ring();
        Ok(self)
    }

    pub fn add_loops<I>(&self, jobs: I) -> Result<&Self, DispatchError>
    where
        I: IntoIterator<Item = LoopJob>,
    {
        self.accepting_loop_jobs()?;
        self.endpoint.loop_jobs.register_all(jobs);
        self.endpoint.doorbell.ring();
        Ok(self)
    }

    fn accepting_loop_jobs(&self) -> Result<(), DispatchError> {
        if self.endpoint.lifecycle.is_cancelled() {
            warn!("loop job registered after shutdown; dropping it");
            return Err(DispatchError::Shutdown);
        }
        Ok(())
    }

    /// Run `hook` whenever new work is queued or cancellation fires.
    pub fn add_wake_hook(&self, hook: WakeHook) {
        self.endpoint.doorbell.add_hook(hook);
    }

    /// Install the platform message pump once, then block until the
    /// dispatch loop has terminated: cancellation was observed and every
    /// request still queued has been failed with `Shutdown`.
    pub fn keep_running(&self) {
        if self.endpoint.is_dedicated_thread() {
            warn!("keep_running called on the dispatch thread; ignoring");
            return;
        }
        if !self.pump_installed.swap(true, Ordering::AcqRel) {
            if let Err(e) = platform::install_message_pump(self) {
                warn!(error = %e, "message pump not installed");
            }
        }
        self.endpoint.lifecycle.wait_terminated();
    }

    pub fn is_dedicated_thread(&self) -> bool {
        self.endpoint.is_dedicated_thread()
    }

    pub fn dedicated_thread(&self) -> Option<ThreadId> {
        self.endpoint.dedicated_thread()
    }

    pub fn state(&self) -> LoopState {
        self.endpoint.lifecycle.state()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.endpoint.stats.snapshot()
    }

    pub fn pending_calls(&self) -> usize {
        self.endpoint.calls.len()
    }

    pub fn pending_jobs(&self) -> usize {
        self.endpoint.jobs.len()
    }

    pub fn cached_procedures(&self) -> usize {
        self.endpoint.invoker.cached()
    }

    /// Token that fires when the dispatcher is cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.endpoint.lifecycle.token()
    }

    /// Fire the cancellation signal without waiting. New submissions fail
    /// immediately; queued ones are failed when the loop exits.
    pub fn cancel(&self) {
        self.endpoint.cancel();
    }

    /// Stop accepting work, cancel, and wait up to `timeout` for the loop to
    /// terminate. On timeout the still-queued requests are failed here.
    pub fn shutdown(&self, timeout: Duration) -> ShutdownResult {
        self.endpoint.cancel();

        if self.endpoint.is_dedicated_thread() {
            debug!("shutdown requested from the dispatch thread; loop stops after this job");
            return ShutdownResult::Deferred;
        }

        if self.endpoint.lifecycle.wait_for(LoopState::Terminated, timeout) {
            self.join();
            return ShutdownResult::Complete;
        }

        let pending = self.endpoint.abandon_pending();
        warn!(pending, ?timeout, "dispatch loop did not terminate in time");
        ShutdownResult::Timeout { pending }
    }

    fn join(&self) {
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                warn!("dispatch thread panicked");
            }
        }
    }

    fn producer_admission(&self) -> Admission {
        // The loop is the only consumer; blocking it on its own full queue
        // would never end.
        if self.endpoint.is_dedicated_thread() {
            Admission::Reject
        } else {
            Admission::Block
        }
    }

    fn call_inline(&self, name: &str, args: &[usize]) -> CallResult {
        if self.endpoint.lifecycle.is_cancelled() {
            return Err(DispatchError::Shutdown);
        }
        let span = CallSpan::inline(name);
        let _entered = span.enter();
        let result = self.endpoint.invoker.invoke(name, args);
        span.record_result(&result);
        self.endpoint.stats.record_inline_call(result.is_ok());
        result
    }

    fn enqueue(&self, name: &str, args: &[usize], lane: Lane, admission: Admission) -> Result<CallHandle, DispatchError> {
        if self.endpoint.lifecycle.is_cancelled() {
            return Err(DispatchError::Shutdown);
        }
        let id = self.endpoint.next_request_id();
        let (request, rx) = CallRequest::new(id, name, args, lane);
        self.endpoint.calls.push(request, admission)?;
        self.endpoint.stats.record_enqueued();
        Ok(CallHandle {
            id,
            name: name.to_string(),
            rx,
            dedicated: self.endpoint.dedicated_thread(),
        })
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.endpoint.is_dedicated_thread() {
            // Cannot join ourselves; the loop exits after the current job.
            self.endpoint.cancel();
            return;
        }
        if self.endpoint.lifecycle.state() != LoopState::Terminated {
            let timeout = self.endpoint.config.shutdown_timeout;
            if let ShutdownResult::Timeout { pending } = self.shutdown(timeout) {
                warn!(pending, "dispatcher dropped while its loop was still busy; detaching thread");
            }
            return;
        }
        self.join();
    }
}

fn on_thread(dedicated: Option<ThreadId>) -> bool {
    dedicated == Some(thread::current().id())
}

/// A queued call's pending result.
#[derive(Debug)]
pub struct CallHandle {
    id: u64,
    name: String,
    rx: ResultRx,
    dedicated: Option<ThreadId>,
}

impl CallHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the result arrives.
    ///
    /// On the dispatch thread this returns the result only if it is already
    /// available and `WouldDeadlock` otherwise.
    pub fn wait(mut self) -> CallResult {
        if on_thread(self.dedicated) {
            return self.try_result().unwrap_or(Err(DispatchError::WouldDeadlock));
        }
        self.rx.blocking_recv().unwrap_or(Err(DispatchError::Shutdown))
    }

    /// Await the result from async code.
    pub async fn wait_async(self) -> CallResult {
        self.rx.await.unwrap_or(Err(DispatchError::Shutdown))
    }

    /// Non-blocking check; `None` while the call is still pending.
    pub fn try_result(&mut self) -> Option<CallResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(DispatchError::Shutdown)),
        }
    }
}

/// Completion signal of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    rx: JobRx,
    dedicated: Option<ThreadId>,
}

impl JobHandle {
    /// Block until the job has run (or was abandoned at shutdown).
    pub fn wait(mut self) -> JobResult {
        if on_thread(self.dedicated) {
            return match self.rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => Err(DispatchError::WouldDeadlock),
                Err(TryRecvError::Closed) => Err(DispatchError::Shutdown),
            };
        }
        self.rx.blocking_recv().unwrap_or(Err(DispatchError::Shutdown))
    }

    pub async fn wait_async(self) -> JobResult {
        self.rx.await.unwrap_or(Err(DispatchError::Shutdown))
    }
}
