// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dispatch counters.
//!
//! Plain relaxed atomics; a snapshot is a consistent-enough view for
//! status output and tests, not a transactional read. Every update is
//! also forwarded to the `metrics` facade.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::metrics;

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Calls executed directly because the caller was the dispatch thread.
    pub calls_inline: u64,
    /// Call requests placed on the call queue.
    pub calls_enqueued: u64,
    /// Call requests taken off the queue and invoked by the loop.
    pub calls_served: u64,
    /// Invocations (inline or queued) that returned an error.
    pub calls_failed: u64,
    pub jobs_run: u64,
    pub jobs_inline: u64,
    /// Idle iterations that ran the loop-job list.
    pub loop_ticks: u64,
    /// Requests and jobs failed with `Shutdown` while still queued.
    pub abandoned: u64,
}

#[derive(Debug, Default)]
pub struct DispatchStats {
    calls_inline: AtomicU64,
    calls_enqueued: AtomicU64,
    calls_served: AtomicU64,
    calls_failed: AtomicU64,
    jobs_run: AtomicU64,
    jobs_inline: AtomicU64,
    loop_ticks: AtomicU64,
    abandoned: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inline_call(&self, ok: bool) {
        metrics::record_call("inline", ok);
        self.calls_inline.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.calls_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_enqueued(&self) {
        metrics::record_enqueued();
        self.calls_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_served(&self, ok: bool) {
        metrics::record_call("queued", ok);
        self.calls_served.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.calls_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_job(&self, inline: bool) {
        metrics::record_job(if inline { "inline" } else { "queued" });
        let counter = if inline { &self.jobs_inline } else { &self.jobs_run };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_loop_tick(&self) {
        metrics::record_loop_tick();
        self.loop_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self, count: usize) {
        metrics::record_abandoned(count);
        self.abandoned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            calls_inline: self.calls_inline.load(Ordering::Relaxed),
            calls_enqueued: self.calls_enqueued.load(Ordering::Relaxed),
            calls_served: self.calls_served.load(Ordering::Relaxed),
            calls_failed: self.calls_failed.load(Ordering::Relaxed),
            jobs_run: self.jobs_run.load(Ordering::Relaxed),
            jobs_inline: self.jobs_inline.load(Ordering::Relaxed),
            loop_ticks: self.loop_ticks.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}
