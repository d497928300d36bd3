// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-endpoint table of entries keyed by stable handles.
//!
//! Each table owns its own lock; there is no process-wide registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Opaque key into a [`HandleTable`]. Never reused within one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Handle(u64);

impl Handle {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct HandleTable<T> {
    entries: Mutex<HashMap<Handle, Arc<T>>>,
    next: AtomicU64,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()), next: AtomicU64::new(1) }
    }

    pub fn insert(&self, value: T) -> Handle {
        let handle = Handle(self.next.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().insert(handle, Arc::new(value));
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<Arc<T>> {
        self.entries.lock().get(&handle).cloned()
    }

    pub fn remove(&self, handle: Handle) -> Option<Arc<T>> {
        self.entries.lock().remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live handles in ascending order.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.entries.lock().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Remove and return every entry.
    pub fn clear(&self) -> Vec<(Handle, Arc<T>)> {
        let mut drained: Vec<_> = self.entries.lock().drain().collect();
        drained.sort_unstable_by_key(|(h, _)| *h);
        drained
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
