// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dispatcher error types.
//!
//! Every error produced while servicing a request is delivered to that
//! request's caller. None of them terminates the dispatch loop.

use thiserror::Error;

/// Last-error code the native call convention reports on success.
pub const NO_ERROR: u32 = 0;

/// A failure raised by the native call itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeFault {
    #[error("native call set last error {code} (r1={r1:#x}, r2={r2:#x})")]
    LastError { code: u32, r1: usize, r2: usize },

    #[error("native call panicked: {0}")]
    Panic(String),

    #[error("native call convention does not support {0} arguments")]
    Arity(usize),
}

/// Errors surfaced by the dispatcher's entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("native entry point `{0}` not found")]
    Resolution(String),

    #[error("native call `{name}` failed: {fault}")]
    Invocation { name: String, fault: NativeFault },

    #[error("{queue} is full ({capacity} pending)")]
    QueueFull { queue: &'static str, capacity: usize },

    #[error("job panicked on the dispatch thread: {0}")]
    JobPanicked(String),

    #[error("dispatcher has shut down")]
    Shutdown,

    #[error("waiting on the dispatch thread for its own queued work would deadlock")]
    WouldDeadlock,

    #[error("failed to start dispatch thread: {0}")]
    Spawn(String),
}

impl DispatchError {
    /// True when the request was refused or abandoned because the
    /// dispatcher is no longer running.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// True when the native call ran and failed.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Invocation { .. })
    }
}

/// The two word-sized return registers of a native call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallReturn {
    pub r1: usize,
    pub r2: usize,
}

/// Outcome delivered for one call request.
pub type CallResult = Result<CallReturn, DispatchError>;
