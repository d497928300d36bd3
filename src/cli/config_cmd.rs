// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration directly from environment variables.

use crate::config::{self, EffectiveConfig, EnvConfig};

/// Print effective config to stdout, as `KEY=value` lines or JSON.
pub fn run_show(json: bool) -> i32 {
    let cfg = config::load().effective_config();
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: failed to serialize config: {}", e);
                return 1;
            }
        }
    } else {
        print_config(&cfg);
    }
    0
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    print_config(&EnvConfig::default().effective_config());
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate() -> i32 {
    let warnings = validate(&config::load().effective_config());
    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }
    if warnings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

fn validate(cfg: &EffectiveConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if cfg.shutdown_timeout_ms == 0 {
        warnings.push(
            "MB_DISPATCH_SHUTDOWN_TIMEOUT_MS is 0; queued requests are always failed by the caller".to_string(),
        );
    }
    if cfg.job_capacity > cfg.call_queue_capacity {
        warnings.push(format!(
            "MB_DISPATCH_JOB_CAPACITY ({}) exceeds MB_DISPATCH_CALL_QUEUE_CAPACITY ({})",
            cfg.job_capacity, cfg.call_queue_capacity
        ));
    }
    if tracing_subscriber::EnvFilter::try_new(&cfg.log_level).is_err() {
        warnings.push(format!("MB_DISPATCH_LOG_LEVEL ({}) is not a valid filter", cfg.log_level));
    }
    warnings
}

fn print_config(cfg: &EffectiveConfig) {
    println!("MB_DISPATCH_CALL_QUEUE_CAPACITY={}", cfg.call_queue_capacity);
    println!("MB_DISPATCH_JOB_CAPACITY={}", cfg.job_capacity);
    println!("MB_DISPATCH_IDLE_WAIT_MAX_US={}", cfg.idle_wait_max_us);
    println!("MB_DISPATCH_SHUTDOWN_TIMEOUT_MS={}", cfg.shutdown_timeout_ms);
    println!("MB_DISPATCH_THREAD_NAME={}", cfg.thread_name);
    println!("MB_DISPATCH_LOG_LEVEL={}", cfg.log_level);
    println!("MB_DISPATCH_LOG_FORMAT={}", cfg.log_format);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> EffectiveConfig {
        EnvConfig::default().effective_config()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&defaults()).is_empty());
    }

    #[test]
    fn zero_shutdown_timeout_warns() {
        let cfg = EffectiveConfig { shutdown_timeout_ms: 0, ..defaults() };
        assert_eq!(validate(&cfg).len(), 1);
    }

    #[test]
    fn oversized_job_channel_and_bad_filter_warn() {
        let cfg = EffectiveConfig {
            job_capacity: 5000,
            log_level: "mb_dispatch=loudest".to_string(),
            ..defaults()
        };
        let warnings = validate(&cfg);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("5000"));
    }

    #[test]
    fn effective_config_serializes() {
        let json = serde_json::to_value(defaults()).unwrap();
        assert_eq!(json["call_queue_capacity"], 999);
        assert_eq!(json["thread_name"], "mb-dispatch");
    }
}
