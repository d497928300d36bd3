// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared-library backend.
//!
//! Entry points are called with the system ABI, every argument and the
//! return value being one machine word. Only the first return register is
//! observable through `libloading`, so `r2` is always 0. On Windows the
//! thread's last-error code is cleared before the call and captured after it.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use thiserror::Error;

use super::library::{NativeLibrary, Procedure, RawReturn};
use crate::error::NativeFault;

/// Largest argument count the call shim supports.
pub const MAX_ARGS: usize = 12;

#[derive(Debug, Error)]
#[error("failed to load {}: {source}", .path.display())]
pub struct LoadError {
    path: PathBuf,
    #[source]
    source: libloading::Error,
}

/// A shared library opened from disk.
pub struct DynamicLibrary {
    lib: Arc<Library>,
    path: PathBuf,
}

impl DynamicLibrary {
    /// Open the library at `path`.
    ///
    /// # Safety
    ///
    /// Loading a library runs its initialisation routines. The caller vouches
    /// that the library is trusted and that its exports follow the word-sized
    /// calling convention described in the module docs.
    pub unsafe fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        let lib = Library::new(&path).map_err(|source| LoadError { path: path.clone(), source })?;
        Ok(Self { lib: Arc::new(lib), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NativeLibrary for DynamicLibrary {
    fn find_proc(&self, name: &str) -> Option<Procedure> {
        let mut symbol = Vec::with_capacity(name.len() + 1);
        symbol.extend_from_slice(name.as_bytes());
        symbol.push(0);

        // SAFETY: the symbol is read as an address only; it is never
        // dereferenced as data.
        let addr = unsafe { self.lib.get::<*const c_void>(&symbol).ok().map(|sym| *sym as usize)? };
        if addr == 0 {
            return None;
        }

        let lib = Arc::clone(&self.lib);
        Some(Procedure::new(name, move |args: &[usize]| {
            let _keep_loaded = &lib;
            // SAFETY: `addr` came from the still-loaded library and the
            // contract on `DynamicLibrary::open` covers the signature.
            unsafe { call_address(addr, args) }
        }))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

macro_rules! call_with_arity {
    (@word $i:literal) => { usize };
    ($addr:ident, $args:ident, { $($n:literal => ($($i:literal),*)),* $(,)? }) => {
        match $args.len() {
            $(
                $n => {
                    let f = std::mem::transmute::<
                        usize,
                        unsafe extern "system" fn($(call_with_arity!(@word $i)),*) -> usize,
                    >($addr);
                    Ok(f($($args[$i]),*))
                }
            )*
            n => Err(NativeFault::Arity(n)),
        }
    };
}

unsafe fn call_address(addr: usize, args: &[usize]) -> Result<RawReturn, NativeFault> {
    last_error::clear();
    let r1: usize = call_with_arity!(addr, args, {
        0 => (),
        1 => (0),
        2 => (0, 1),
        3 => (0, 1, 2),
        4 => (0, 1, 2, 3),
        5 => (0, 1, 2, 3, 4),
        6 => (0, 1, 2, 3, 4, 5),
        7 => (0, 1, 2, 3, 4, 5, 6),
        8 => (0, 1, 2, 3, 4, 5, 6, 7),
        9 => (0, 1, 2, 3, 4, 5, 6, 7, 8),
        10 => (0, 1, 2, 3, 4, 5, 6, 7, 8, 9),
        11 => (0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10),
        12 => (0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11),
    })?;
    Ok(RawReturn { r1, r2: 0, last_error: last_error::get() })
}

#[cfg(windows)]
mod last_error {
    use windows_sys::Win32::Foundation::{GetLastError, SetLastError};

    pub fn clear() {
        unsafe { SetLastError(0) }
    }

    pub fn get() -> u32 {
        unsafe { GetLastError() }
    }
}

#[cfg(not(windows))]
mod last_error {
    pub fn clear() {}

    pub fn get() -> u32 {
        crate::error::NO_ERROR
    }
}
