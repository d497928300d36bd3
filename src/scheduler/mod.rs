// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Request scheduling for the dispatch thread.
//!
//! Holds the bounded call queue with its first lane, the job channel, the
//! loop-job registry, the doorbell that wakes an idle loop, and the loop
//! itself.

pub(crate) mod dispatch;
mod doorbell;
mod jobs;
mod loop_jobs;
mod priority;
mod queue;


pub use dispatch::Endpoint;
pub use doorbell::{Doorbell, IdleBackoff, WakeHook};
pub use jobs::{Job, JobChannel, JobResult, JobRx, DEFAULT_JOB_CAPACITY};
pub use loop_jobs::{LoopJob, LoopJobRegistry};
pub use priority::{Lane, LaneQueue, Queued};
pub use queue::{
    Admission, BoundedQueue, CallQueue, CallRequest, ResultRx, DEFAULT_CALL_QUEUE_CAPACITY,
};
