// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Platform glue for hosts whose native library needs a message loop.

#[cfg(windows)]
mod windows;

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;

/// Register the native message pump as a loop job on `dispatcher`.
#[cfg(windows)]
pub(crate) fn install_message_pump(dispatcher: &Dispatcher) -> Result<(), DispatchError> {
    windows::install_message_pump(dispatcher)
}

#[cfg(not(windows))]
pub(crate) fn install_message_pump(_dispatcher: &Dispatcher) -> Result<(), DispatchError> {
    tracing::debug!("no native message pump on this platform");
    Ok(())
}
