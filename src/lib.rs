// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! mb-dispatch
//!
//! Lets any thread call into a native library whose API may only be used
//! from one dedicated OS thread.
//!
//! # Model
//!
//! - **Dedicated thread**: started by [`Dispatcher`], records its identity
//!   once, and is the only thread that ever invokes the library.
//! - **Call queue**: bounded, two lanes. Priority calls are served ahead of
//!   queued normal calls; each lane is FIFO.
//! - **Job channel**: bounded FIFO of one-shot closures run on the thread.
//! - **Loop jobs**: callbacks run once per idle iteration (message pumps).
//! - **Invoker**: resolves entry points once, calls them, and turns every
//!   failure (including panics) into a returned error.
//!
//! Calls made on the dedicated thread run inline. Calls from elsewhere are
//! queued and the caller waits for exactly one result. After shutdown every
//! entry point fails fast with [`DispatchError::Shutdown`], and requests
//! still queued at that point receive the same error.

pub mod app;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handles;
pub mod native;
mod platform;
pub mod scheduler;
pub mod shutdown;
pub mod telemetry;

pub use app::App;
pub use config::DispatchConfig;
pub use dispatcher::{CallHandle, Dispatcher, DispatcherBuilder, JobHandle};
pub use error::{CallResult, CallReturn, DispatchError, NativeFault};
pub use native::{DynamicLibrary, FnTable, NativeLibrary, Procedure, RawReturn};
pub use scheduler::Lane;
pub use shutdown::{LoopState, ShutdownResult};
