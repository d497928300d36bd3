// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! mb-dispatch command-line entry point.
//!
//! ## Subcommands
//!
//! - `mb-dispatch config [show|defaults|validate]` - Inspect configuration
//! - `mb-dispatch demo [PRODUCERS] [CALLS]` - Run the in-process demo
//! - `mb-dispatch probe LIBRARY SYMBOL [ARGS...]` - Call one native export

use std::path::Path;
use std::process::ExitCode;

use mb_dispatch::cli::{config_cmd, run_demo, run_probe};
use mb_dispatch::config;
use mb_dispatch::telemetry::{init_logging, init_metrics};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    let env = config::load();
    if let Err(e) = init_logging(&env.log) {
        eprintln!("Logging disabled: {}", e);
    }
    init_metrics();

    match command {
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let json = args.get(3).map(|s| s.as_str()) == Some("--json");
                    ExitCode::from(config_cmd::run_show(json) as u8)
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate() as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "demo" => {
            let producers = count_arg(&args, 2, 8);
            let calls = count_arg(&args, 3, 1000);
            match run_demo(env.dispatch, producers, calls) {
                Ok(report) => match serde_json::to_string_pretty(&report) {
                    Ok(text) => {
                        println!("{}", text);
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        ExitCode::FAILURE
                    }
                },
                Err(e) => {
                    eprintln!("Demo failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        "probe" => match (args.get(2), args.get(3)) {
            (Some(library), Some(symbol)) => {
                let code = run_probe(Path::new(library), symbol, &args[4..], env.dispatch);
                ExitCode::from(code as u8)
            }
            _ => {
                print_command_help("probe");
                ExitCode::from(2u8)
            }
        },
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("mb-dispatch {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

/// Positional count argument, falling back to `default` when absent or bad.
fn count_arg(args: &[String], index: usize, default: usize) -> usize {
    args.get(index)
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "mb-dispatch - thread-affine native call dispatcher v{}

USAGE:
    mb-dispatch <COMMAND> [OPTIONS]

COMMANDS:
    config       Show or validate configuration (show, defaults, validate)
    demo         Drive an in-process table from many threads
    probe        Load a shared library and call one export
    version      Show version information
    help         Show this help message

ENVIRONMENT:
    MB_DISPATCH_CALL_QUEUE_CAPACITY  Max pending calls (default: 999)
    MB_DISPATCH_JOB_CAPACITY         Max pending jobs (default: 20)
    MB_DISPATCH_IDLE_WAIT_MAX_US     Idle wait ceiling in µs (default: 2000)
    MB_DISPATCH_SHUTDOWN_TIMEOUT_MS  Shutdown wait in ms (default: 5000)
    MB_DISPATCH_THREAD_NAME          Dispatch thread name (default: mb-dispatch)
    MB_DISPATCH_LOG_LEVEL            Log filter (default: info)
    MB_DISPATCH_LOG_FORMAT           json or pretty (default: pretty)

EXIT CODES:
    0  Success
    1  Failure
    2  Usage error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "config" => {
            eprintln!(
                "mb-dispatch config - Inspect configuration

USAGE:
    mb-dispatch config show [--json]
    mb-dispatch config defaults
    mb-dispatch config validate

DESCRIPTION:
    show prints the effective configuration after environment overrides.
    defaults prints the built-in values. validate exits 1 on warnings.
"
            );
        }
        "demo" => {
            eprintln!(
                "mb-dispatch demo - In-process dispatch demo

USAGE:
    mb-dispatch demo [PRODUCERS] [CALLS_PER_PRODUCER]

DESCRIPTION:
    Starts a dispatcher over an in-process function table, calls it from
    PRODUCERS threads (default 8), and prints a JSON report with the
    dispatcher statistics.
"
            );
        }
        "probe" => {
            eprintln!(
                "mb-dispatch probe - Call one native export

USAGE:
    mb-dispatch probe <LIBRARY> <SYMBOL> [ARGS...]

DESCRIPTION:
    Loads LIBRARY, starts a dispatcher on it, and calls SYMBOL with up to
    12 word arguments (decimal or 0x-prefixed hex). Prints the first
    return word.

EXAMPLES:
    mb-dispatch probe /usr/lib/libc.so.6 getpid
    mb-dispatch probe user32.dll GetSystemMetrics 0
"
            );
        }
        _ => print_usage(),
    }
}
