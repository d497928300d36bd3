// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry module for the dispatcher.
//!
//! Provides structured logging setup, call spans, dispatch counters, and
//! metrics emitted through the `metrics` facade.

mod logging;
pub(crate) mod metrics;
mod spans;
mod stats;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_abandoned, record_call, record_enqueued, record_job, record_loop_tick,
    record_queue_depth,
};
pub use spans::{CallSpan, SpanExt};
pub use stats::{DispatchStats, StatsSnapshot};
