// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for the mb-dispatch binary.
//!
//! ## Usage
//!
//! ```bash
//! mb-dispatch config show --json   # Effective configuration
//! mb-dispatch demo                 # Drive an in-process table from many threads
//! mb-dispatch probe lib.so sym 1 2 # Call one exported symbol on the dispatch thread
//! ```

pub mod config_cmd;
pub mod demo;
pub mod probe;

pub use demo::{run_demo, DemoReport};
pub use probe::{parse_arg, run_probe};
