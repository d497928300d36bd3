// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-process function table implementing [`NativeLibrary`].
//!
//! Used for tests, the `demo` command, and hosts that want to route
//! thread-affine Rust code through the dispatcher.

use std::collections::HashMap;

use super::library::{NativeLibrary, Procedure, RawReturn};
use crate::error::NativeFault;

#[derive(Debug, Default)]
pub struct FnTable {
    procs: HashMap<String, Procedure>,
}

impl FnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an infallible entry point.
    pub fn with<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&[usize]) -> RawReturn + Send + Sync + 'static,
    {
        self.insert(Procedure::new(name, move |args: &[usize]| Ok(func(args))));
        self
    }

    /// Register an entry point that may report a convention-level fault.
    pub fn with_fallible<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&[usize]) -> Result<RawReturn, NativeFault> + Send + Sync + 'static,
    {
        self.insert(Procedure::new(name, func));
        self
    }

    pub fn insert(&mut self, proc: Procedure) {
        self.procs.insert(proc.name().to_string(), proc);
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }
}

impl NativeLibrary for FnTable {
    fn find_proc(&self, name: &str) -> Option<Procedure> {
        self.procs.get(name).cloned()
    }

    fn describe(&self) -> String {
        format!("in-process table ({} entries)", self.procs.len())
    }
}
