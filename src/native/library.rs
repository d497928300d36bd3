// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! The boundary between the dispatcher and a loaded native library.

use std::fmt;
use std::sync::Arc;

use crate::error::{NativeFault, NO_ERROR};

/// Raw register values and last-error code produced by one native call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawReturn {
    pub r1: usize,
    pub r2: usize,
    pub last_error: u32,
}

impl RawReturn {
    /// A successful return carrying `r1`.
    pub fn ok(r1: usize) -> Self {
        Self { r1, r2: 0, last_error: NO_ERROR }
    }

    /// A return that set a non-success last-error code.
    pub fn failed(r1: usize, last_error: u32) -> Self {
        Self { r1, r2: 0, last_error }
    }
}

type ProcFn = dyn Fn(&[usize]) -> Result<RawReturn, NativeFault> + Send + Sync;

/// A resolved native entry point.
///
/// Cheap to clone; clones share the underlying callable.
#[derive(Clone)]
pub struct Procedure {
    name: Arc<str>,
    func: Arc<ProcFn>,
}

impl Procedure {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[usize]) -> Result<RawReturn, NativeFault> + Send + Sync + 'static,
    {
        Self { name: Arc::from(name), func: Arc::new(func) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the entry point. Callers other than the invoker must already be
    /// on the dedicated thread.
    pub(crate) fn raw_call(&self, args: &[usize]) -> Result<RawReturn, NativeFault> {
        (self.func)(args)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure").field("name", &self.name).finish()
    }
}

/// An already-loaded native library.
///
/// The dispatcher only looks symbols up through this trait; discovering and
/// loading the library file is the caller's job.
pub trait NativeLibrary: Send + Sync + 'static {
    /// Resolve an exported entry point by name.
    fn find_proc(&self, name: &str) -> Option<Procedure>;

    /// Human-readable identification for logs.
    fn describe(&self) -> String {
        "native library".to_string()
    }
}
