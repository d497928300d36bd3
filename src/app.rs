// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Native runtime lifecycle on top of a [`Dispatcher`].
//!
//! Startup initializes the library if it reports itself uninitialized.
//! [`App::exit`] tears down in the only safe order: destroy tracked
//! windows, finalize, stop the dispatch loop, then release the library.

use std::ffi::{c_char, CStr};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::DispatchConfig;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::handles::{Handle, HandleTable};
use crate::native::NativeLibrary;
use crate::shutdown::ShutdownResult;

/// Entry points the lifecycle uses.
pub mod names {
    pub const INITIALIZE: &str = "wkeInitialize";
    pub const FINALIZE: &str = "wkeFinalize";
    pub const IS_INITIALIZE: &str = "wkeIsInitialize";
    pub const VERSION: &str = "wkeVersion";
    pub const VERSION_STRING: &str = "wkeVersionString";
    pub const DESTROY_WEB_WINDOW: &str = "wkeDestroyWebWindow";
}

/// A running native library and its dispatch thread.
pub struct App {
    // Field order is drop order: the dispatcher must stop before the
    // library handle goes away.
    dispatcher: Dispatcher,
    library: Arc<dyn NativeLibrary>,
    windows: HandleTable<usize>,
    shutdown_timeout: Duration,
}

impl App {
    pub fn new(library: Arc<dyn NativeLibrary>, config: DispatchConfig) -> Result<Self, DispatchError> {
        let shutdown_timeout = config.shutdown_timeout;
        let dispatcher = Dispatcher::start(Arc::clone(&library), config)?;
        let app = Self { dispatcher, library, windows: HandleTable::new(), shutdown_timeout };

        if !app.is_initialized()? {
            app.initialize()?;
        }
        info!(library = %app.library.describe(), "native runtime ready");
        Ok(app)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn is_initialized(&self) -> Result<bool, DispatchError> {
        Ok(self.dispatcher.call(names::IS_INITIALIZE, &[])?.r1 != 0)
    }

    pub fn initialize(&self) -> Result<(), DispatchError> {
        self.dispatcher.call(names::INITIALIZE, &[]).map(|_| ())
    }

    pub fn finalize(&self) -> Result<(), DispatchError> {
        self.dispatcher.call(names::FINALIZE, &[]).map(|_| ())
    }

    pub fn version(&self) -> Result<usize, DispatchError> {
        Ok(self.dispatcher.call(names::VERSION, &[])?.r1)
    }

    /// The `const char*` word returned by `wkeVersionString`.
    pub fn version_string_ptr(&self) -> Result<usize, DispatchError> {
        Ok(self.dispatcher.call(names::VERSION_STRING, &[])?.r1)
    }

    /// Copy the library's version string. A null pointer reads as empty.
    ///
    /// # Safety
    ///
    /// The library must return a NUL-terminated string that stays valid
    /// after the call returns.
    pub unsafe fn version_string(&self) -> Result<String, DispatchError> {
        let ptr = self.version_string_ptr()?;
        if ptr == 0 {
            return Ok(String::new());
        }
        Ok(CStr::from_ptr(ptr as *const c_char).to_string_lossy().into_owned())
    }

    /// Remember a native window so `exit` destroys it.
    pub fn track_window(&self, raw: usize) -> Handle {
        self.windows.insert(raw)
    }

    /// Forget a window the host destroyed itself.
    pub fn untrack_window(&self, handle: Handle) -> Option<usize> {
        self.windows.remove(handle).map(|raw| *raw)
    }

    pub fn window(&self, handle: Handle) -> Option<usize> {
        self.windows.get(handle).map(|raw| *raw)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Destroy every tracked window on the dispatch thread.
    pub fn close_all(&self) {
        for (handle, raw) in self.windows.clear() {
            if let Err(e) = self.dispatcher.call(names::DESTROY_WEB_WINDOW, &[*raw]) {
                warn!(%handle, error = %e, "failed to destroy window");
            }
        }
    }

    /// Install the message pump and block until the dispatcher terminates.
    pub fn keep_running(&self) {
        self.dispatcher.keep_running();
    }

    /// Close windows, finalize, stop the loop, and release the library.
    pub fn exit(self) -> ShutdownResult {
        self.close_all();
        if let Err(e) = self.finalize() {
            warn!(error = %e, "finalize failed");
        }
        let result = self.dispatcher.shutdown(self.shutdown_timeout);
        info!(?result, "native runtime stopped");
        result
    }
}
