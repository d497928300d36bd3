// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wake signal shared by every producer and the dispatch loop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};

/// Extra action run on every ring, e.g. posting a message that unblocks a
/// native message pump.
pub type WakeHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct Doorbell {
    rung: Mutex<bool>,
    cvar: Condvar,
    hooks: RwLock<Vec<WakeHook>>,
}

impl Doorbell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark work as available and wake the waiting loop.
    pub fn ring(&self) {
        {
            let mut rung = self.rung.lock();
            *rung = true;
            self.cvar.notify_one();
        }
        for hook in self.hooks.read().iter() {
            hook();
        }
    }

    /// Wait for a ring or until `timeout` elapses. Consumes the ring.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut rung = self.rung.lock();
        if !*rung {
            self.cvar.wait_for(&mut rung, timeout);
        }
        std::mem::replace(&mut *rung, false)
    }

    pub fn add_hook(&self, hook: WakeHook) {
        self.hooks.write().push(hook);
    }
}

/// Adaptive idle wait for a loop with no loop jobs: starts short, doubles on
/// every idle tick up to a ceiling, and resets once work shows up.
#[derive(Debug, Clone)]
pub struct IdleBackoff {
    current: Duration,
    floor: Duration,
    ceiling: Duration,
}

impl IdleBackoff {
    pub const FLOOR: Duration = Duration::from_micros(50);

    pub fn new(ceiling: Duration) -> Self {
        let ceiling = ceiling.max(Self::FLOOR);
        Self { current: Self::FLOOR, floor: Self::FLOOR, ceiling }
    }

    pub fn next_wait(&mut self) -> Duration {
        let wait = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        wait
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}
