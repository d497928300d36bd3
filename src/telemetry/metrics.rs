// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metrics emitted through the `metrics` facade.
//!
//! Nothing is exported unless the host installs a recorder; without one
//! every call here is a no-op. [`DispatchStats`](super::DispatchStats)
//! keeps its own atomic copy for status output.

use ::metrics::{counter, describe_counter, describe_gauge, gauge, Unit};

pub const CALLS_TOTAL: &str = "mb_dispatch_calls_total";
pub const CALLS_ENQUEUED_TOTAL: &str = "mb_dispatch_calls_enqueued_total";
pub const JOBS_TOTAL: &str = "mb_dispatch_jobs_total";
pub const LOOP_TICKS_TOTAL: &str = "mb_dispatch_loop_ticks_total";
pub const ABANDONED_TOTAL: &str = "mb_dispatch_abandoned_total";
pub const QUEUE_DEPTH: &str = "mb_dispatch_queue_depth";

/// Register descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!(CALLS_TOTAL, Unit::Count, "Native calls invoked, by path and outcome");
    describe_counter!(CALLS_ENQUEUED_TOTAL, Unit::Count, "Call requests placed on the call queue");
    describe_counter!(JOBS_TOTAL, Unit::Count, "Jobs run, by path");
    describe_counter!(LOOP_TICKS_TOTAL, Unit::Count, "Idle iterations that ran the loop-job list");
    describe_counter!(ABANDONED_TOTAL, Unit::Count, "Queued work failed with Shutdown");
    describe_gauge!(QUEUE_DEPTH, Unit::Count, "Items waiting in a dispatch queue");
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// `path` is `inline` or `queued`.
pub fn record_call(path: &'static str, ok: bool) {
    counter!(CALLS_TOTAL, "path" => path, "outcome" => outcome(ok)).increment(1);
}

pub fn record_enqueued() {
    counter!(CALLS_ENQUEUED_TOTAL).increment(1);
}

pub fn record_job(path: &'static str) {
    counter!(JOBS_TOTAL, "path" => path).increment(1);
}

pub fn record_loop_tick() {
    counter!(LOOP_TICKS_TOTAL).increment(1);
}

pub fn record_abandoned(count: usize) {
    counter!(ABANDONED_TOTAL).increment(count as u64);
}

pub fn record_queue_depth(queue: &'static str, depth: usize) {
    gauge!(QUEUE_DEPTH, "queue" => queue).set(depth as f64);
}
