// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Procedure lookup, caching, and fault containment.
//!
//! This is the only place a native entry point is actually called. Whatever
//! the call does (return a failing last-error code, report an unsupported
//! arity, or panic), the outcome comes back as a [`CallResult`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, warn};

use super::library::{NativeLibrary, Procedure};
use crate::error::{CallResult, CallReturn, DispatchError, NativeFault, NO_ERROR};

/// Resolves names to procedures once and calls them.
///
/// The cache is monotonic: a name that resolved keeps its procedure for the
/// lifetime of the invoker. Failed lookups are not cached.
pub struct Invoker {
    library: Arc<dyn NativeLibrary>,
    procs: RwLock<HashMap<String, Procedure>>,
}

impl Invoker {
    pub fn new(library: Arc<dyn NativeLibrary>) -> Self {
        Self { library, procs: RwLock::new(HashMap::new()) }
    }

    /// Look up `name`, consulting the cache first.
    pub fn resolve(&self, name: &str) -> Result<Procedure, DispatchError> {
        if let Some(proc) = self.procs.read().get(name) {
            return Ok(proc.clone());
        }

        let Some(found) = self.library.find_proc(name) else {
            error!(name, library = %self.library.describe(), "native entry point not found");
            return Err(DispatchError::Resolution(name.to_string()));
        };

        let mut procs = self.procs.write();
        Ok(procs.entry(name.to_string()).or_insert(found).clone())
    }

    /// Resolve and call `name` with `args`.
    pub fn invoke(&self, name: &str, args: &[usize]) -> CallResult {
        let proc = self.resolve(name)?;

        let outcome = catch_unwind(AssertUnwindSafe(|| proc.raw_call(args)));
        let fault = match outcome {
            Ok(Ok(raw)) if raw.last_error == NO_ERROR => {
                return Ok(CallReturn { r1: raw.r1, r2: raw.r2 });
            }
            Ok(Ok(raw)) => NativeFault::LastError { code: raw.last_error, r1: raw.r1, r2: raw.r2 },
            Ok(Err(fault)) => fault,
            Err(payload) => NativeFault::Panic(panic_message(payload.as_ref())),
        };

        warn!(name, %fault, "native call failed");
        Err(DispatchError::Invocation { name: name.to_string(), fault })
    }

    /// Number of names currently cached.
    pub fn cached(&self) -> usize {
        self.procs.read().len()
    }

    pub fn library(&self) -> &Arc<dyn NativeLibrary> {
        &self.library
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{FnTable, RawReturn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn invoker(table: FnTable) -> Invoker {
        Invoker::new(Arc::new(table))
    }

    #[test]
    fn success_returns_registers() {
        let inv = invoker(FnTable::new().with("pair", |_| RawReturn { r1: 7, r2: 9, last_error: 0 }));
        assert_eq!(inv.invoke("pair", &[]), Ok(CallReturn { r1: 7, r2: 9 }));
    }

    #[test]
    fn unknown_name_is_resolution_error() {
        let inv = invoker(FnTable::new());
        assert_eq!(
            inv.invoke("doesNotExist", &[]),
            Err(DispatchError::Resolution("doesNotExist".into()))
        );
        assert_eq!(inv.cached(), 0);
    }

    #[test]
    fn last_error_becomes_fault() {
        let inv = invoker(FnTable::new().with("fail", |_| RawReturn::failed(1, 87)));
        let err = inv.invoke("fail", &[]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::Invocation {
                name: "fail".into(),
                fault: NativeFault::LastError { code: 87, r1: 1, r2: 0 },
            }
        );
    }

    #[test]
    fn panic_is_contained() {
        let inv = invoker(
            FnTable::new()
                .with("boom", |_| panic!("native exploded"))
                .with("ok", |_| RawReturn::ok(1)),
        );
        match inv.invoke("boom", &[]) {
            Err(DispatchError::Invocation { fault: NativeFault::Panic(msg), .. }) => {
                assert!(msg.contains("native exploded"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(inv.invoke("ok", &[]).unwrap().r1, 1);
    }

    #[test]
    fn lookups_are_cached() {
        struct Counting {
            lookups: AtomicUsize,
        }
        impl NativeLibrary for Counting {
            fn find_proc(&self, name: &str) -> Option<Procedure> {
                self.lookups.fetch_add(1, Ordering::SeqCst);
                Some(Procedure::new(name, |_| Ok(RawReturn::ok(0))))
            }
        }

        let lib = Arc::new(Counting { lookups: AtomicUsize::new(0) });
        let inv = Invoker::new(lib.clone());
        for _ in 0..5 {
            inv.invoke("wkeVersion", &[]).unwrap();
        }
        assert_eq!(lib.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(inv.cached(), 1);
    }
}
