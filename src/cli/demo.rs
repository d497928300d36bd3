// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! `demo` subcommand: many producer threads against one dispatch thread.
//!
//! The in-process table records which OS thread served each call, so the
//! report proves that every call ran on the dedicated thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::config::DispatchConfig;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::native::{FnTable, RawReturn};
use crate::shutdown::ShutdownResult;
use crate::telemetry::StatsSnapshot;

/// Outcome of one demo run.
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub producers: usize,
    pub calls_per_producer: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Distinct OS threads that executed table entries. Always 1.
    pub serving_threads: usize,
    pub elapsed_us: u64,
    pub stats: StatsSnapshot,
}

/// Run the demo and return its report.
pub fn run_demo(config: DispatchConfig, producers: usize, calls_per_producer: usize) -> Result<DemoReport, DispatchError> {
    let served_on = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&served_on);
    let table = FnTable::new()
        .with("add", move |args| {
            let id = thread::current().id();
            let mut seen = recorder.lock();
            if !seen.contains(&id) {
                seen.push(id);
            }
            RawReturn::ok(args.iter().sum())
        })
        .with("odd", |args| {
            if args[0] % 2 == 1 {
                RawReturn::failed(0, 87)
            } else {
                RawReturn::ok(1)
            }
        });

    let dispatcher = Arc::new(Dispatcher::start(Arc::new(table), config.clone())?);
    let ticks = Arc::new(AtomicUsize::new(0));
    let tick_counter = Arc::clone(&ticks);
    dispatcher.add_loop(move || {
        tick_counter.fetch_add(1, Ordering::Relaxed);
    })?;

    let started = Instant::now();
    let workers: Vec<_> = (0..producers)
        .map(|p| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                let (mut ok, mut failed) = (0, 0);
                for i in 0..calls_per_producer {
                    let result = if i % 4 == 3 {
                        dispatcher.call("odd", &[p + i])
                    } else {
                        dispatcher.call("add", &[p, i])
                    };
                    match result {
                        Ok(_) => ok += 1,
                        Err(_) => failed += 1,
                    }
                }
                (ok, failed)
            })
        })
        .collect();

    let (mut succeeded, mut failed) = (0, 0);
    for worker in workers {
        let (ok, bad) = worker.join().map_err(|_| DispatchError::Spawn("demo producer panicked".into()))?;
        succeeded += ok;
        failed += bad;
    }
    let elapsed_us = started.elapsed().as_micros() as u64;

    if let ShutdownResult::Timeout { pending } = dispatcher.shutdown(config.shutdown_timeout) {
        info!(pending, "demo dispatcher did not stop in time");
    }
    info!(loop_ticks = ticks.load(Ordering::Relaxed), "demo finished");

    let serving_threads = served_on.lock().len();
    Ok(DemoReport {
        producers,
        calls_per_producer,
        succeeded,
        failed,
        serving_threads,
        elapsed_us,
        stats: dispatcher.stats(),
    })
}
