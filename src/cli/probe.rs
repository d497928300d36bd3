// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! `probe` subcommand: load a shared library and call one export on the
//! dispatch thread.

use std::path::Path;
use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::native::{DynamicLibrary, MAX_ARGS};

/// Parse a word argument: decimal, or hex with a `0x` prefix.
pub fn parse_arg(raw: &str) -> Option<usize> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// Run the probe. Returns the process exit code.
pub fn run_probe(library: &Path, symbol: &str, raw_args: &[String], config: DispatchConfig) -> i32 {
    let mut args = Vec::with_capacity(raw_args.len());
    for raw in raw_args {
        match parse_arg(raw) {
            Some(word) => args.push(word),
            None => {
                eprintln!("Error: argument '{}' is not a number", raw);
                return 2;
            }
        }
    }
    if args.len() > MAX_ARGS {
        eprintln!("Error: at most {} arguments are supported", MAX_ARGS);
        return 2;
    }

    // SAFETY: the operator names the library; its initializers run here.
    let lib = match unsafe { DynamicLibrary::open(library) } {
        Ok(lib) => lib,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match call_once(Arc::new(lib), symbol, &args, config) {
        Ok(r1) => {
            println!("{} = {} (0x{:x})", symbol, r1, r1);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn call_once(lib: Arc<DynamicLibrary>, symbol: &str, args: &[usize], config: DispatchConfig) -> Result<usize, DispatchError> {
    let timeout = config.shutdown_timeout;
    let dispatcher = Dispatcher::start(lib, config)?;
    let result = dispatcher.call(symbol, args);
    dispatcher.shutdown(timeout);
    Ok(result?.r1)
}
