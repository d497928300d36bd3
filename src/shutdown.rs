// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dispatch loop lifecycle and shutdown coordination.
//!
//! The loop moves `Starting -> Running -> Terminated` exactly once. The
//! cancellation token is the only way another thread can make it stop.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;

/// Dispatch loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoopState {
    Starting,
    Running,
    Terminated,
}

/// Result of a shutdown operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    /// Requested from the dispatch thread itself: cancellation fired, and
    /// the loop stops once the current job or loop job returns.
    Deferred,
    /// The loop did not terminate in time; `pending` requests were failed
    /// by the shutting-down thread instead.
    Timeout { pending: usize },
}

/// Shared lifecycle record for one dispatcher.
pub struct Lifecycle {
    state: Mutex<LoopState>,
    changed: Condvar,
    token: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoopState::Starting),
            changed: Condvar::new(),
            token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.lock()
    }

    /// Advance the state. Never moves backwards.
    pub fn advance(&self, next: LoopState) {
        let mut state = self.state.lock();
        if next > *state {
            *state = next;
            self.changed.notify_all();
        }
    }

    /// Fire the cancellation signal.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A clone of the cancellation token, for async waiters.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Block until the state reaches `target` or `timeout` elapses.
    /// Returns whether `target` was reached.
    pub fn wait_for(&self, target: LoopState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state < target {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return *state >= target;
            }
        }
        true
    }

    /// Block until the loop has terminated.
    pub fn wait_terminated(&self) {
        let mut state = self.state.lock();
        while *state < LoopState::Terminated {
            self.changed.wait(&mut state);
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
