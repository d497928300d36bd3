// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Native library boundary: symbol resolution and invocation.

mod dynamic;
mod invoker;
mod library;
mod table;

pub use dynamic::{DynamicLibrary, LoadError, MAX_ARGS};
pub use invoker::Invoker;
pub(crate) use invoker::panic_message;
pub use library::{NativeLibrary, Procedure, RawReturn};
pub use table::FnTable;
