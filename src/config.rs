// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dispatcher configuration loading from environment variables.
//!
//! All values are loaded from `MB_DISPATCH_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `MB_DISPATCH_CALL_QUEUE_CAPACITY` | 999 | Max pending call requests |
//! | `MB_DISPATCH_JOB_CAPACITY` | 20 | Max pending one-shot jobs |
//! | `MB_DISPATCH_IDLE_WAIT_MAX_US` | 2000 | Idle wait ceiling with no loop jobs (µs) |
//! | `MB_DISPATCH_SHUTDOWN_TIMEOUT_MS` | 5000 | Time shutdown waits for the loop (ms) |
//! | `MB_DISPATCH_THREAD_NAME` | mb-dispatch | Dispatch thread name |
//! | `MB_DISPATCH_LOG_LEVEL` | info | Log filter directive |
//! | `MB_DISPATCH_LOG_FORMAT` | pretty | `json` or `pretty` |

use std::time::Duration;

use serde::Serialize;

use crate::scheduler::{DEFAULT_CALL_QUEUE_CAPACITY, DEFAULT_JOB_CAPACITY};
use crate::telemetry::{LogConfig, LogFormat};

/// Default idle wait ceiling when no loop jobs are registered.
pub const DEFAULT_IDLE_WAIT_MAX: Duration = Duration::from_micros(2000);
/// Default time `shutdown` waits for the loop to terminate.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_THREAD_NAME: &str = "mb-dispatch";

/// Tunables for one dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub call_queue_capacity: usize,
    pub job_capacity: usize,
    pub idle_wait_max: Duration,
    pub shutdown_timeout: Duration,
    pub thread_name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_queue_capacity: DEFAULT_CALL_QUEUE_CAPACITY,
            job_capacity: DEFAULT_JOB_CAPACITY,
            idle_wait_max: DEFAULT_IDLE_WAIT_MAX,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub call_queue_capacity: usize,
    pub job_capacity: usize,
    pub idle_wait_max_us: u64,
    pub shutdown_timeout_ms: u64,
    pub thread_name: String,
    pub log_level: String,
    pub log_format: String,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub dispatch: DispatchConfig,
    pub log: LogConfig,
}

impl EnvConfig {
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            call_queue_capacity: self.dispatch.call_queue_capacity,
            job_capacity: self.dispatch.job_capacity,
            idle_wait_max_us: self.dispatch.idle_wait_max.as_micros() as u64,
            shutdown_timeout_ms: self.dispatch.shutdown_timeout.as_millis() as u64,
            thread_name: self.dispatch.thread_name.clone(),
            log_level: self.log.level.clone(),
            log_format: self.log.format.as_str().to_string(),
        }
    }
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Read a non-empty string env var.
fn parse_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Load dispatcher tunables from environment.
fn load_dispatch_config() -> DispatchConfig {
    let call_queue_capacity = parse_usize("MB_DISPATCH_CALL_QUEUE_CAPACITY", DEFAULT_CALL_QUEUE_CAPACITY).max(1);
    let job_capacity = parse_usize("MB_DISPATCH_JOB_CAPACITY", DEFAULT_JOB_CAPACITY).max(1);
    let idle_us = parse_u64("MB_DISPATCH_IDLE_WAIT_MAX_US", DEFAULT_IDLE_WAIT_MAX.as_micros() as u64);
    let idle_us = idle_us.clamp(50, 1_000_000); // 50µs floor, 1s ceiling
    let shutdown_ms = parse_u64("MB_DISPATCH_SHUTDOWN_TIMEOUT_MS", DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64);
    DispatchConfig {
        call_queue_capacity,
        job_capacity,
        idle_wait_max: Duration::from_micros(idle_us),
        shutdown_timeout: Duration::from_millis(shutdown_ms),
        thread_name: parse_string("MB_DISPATCH_THREAD_NAME", DEFAULT_THREAD_NAME),
    }
}

/// Load logging configuration from environment.
fn load_log_config() -> LogConfig {
    let format = std::env::var("MB_DISPATCH_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    LogConfig {
        format,
        level: parse_string("MB_DISPATCH_LOG_LEVEL", "info"),
        output_path: None,
    }
}

/// Load all configuration from environment variables.
pub fn load() -> EnvConfig {
    EnvConfig {
        dispatch: load_dispatch_config(),
        log: load_log_config(),
    }
}
