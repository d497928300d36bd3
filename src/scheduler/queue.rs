// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded call queue management.
//!
//! Producers on any thread push; the dispatch loop is the only consumer.
//! A full queue blocks [`Admission::Block`] producers until space frees up
//! or the queue closes, and rejects [`Admission::Reject`] producers with
//! [`DispatchError::QueueFull`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;

use super::doorbell::Doorbell;
use super::priority::{Lane, LaneQueue, Queued};
use crate::error::{CallResult, DispatchError};
use crate::telemetry::record_queue_depth;

/// Sender half delivering a call's result back to its caller.
pub type ResultTx = oneshot::Sender<CallResult>;
/// Receiver half for awaiting a call's result.
pub type ResultRx = oneshot::Receiver<CallResult>;

/// What a producer does when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Block,
    Reject,
}

/// One pending native invocation.
pub struct CallRequest {
    pub id: u64,
    pub name: String,
    pub args: Vec<usize>,
    pub lane: Lane,
    pub enqueued_at: Instant,
    result_tx: ResultTx,
}

impl fmt::Debug for CallRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRequest")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("lane", &self.lane)
            .finish()
    }
}

impl CallRequest {
    pub fn new(id: u64, name: &str, args: &[usize], lane: Lane) -> (Self, ResultRx) {
        let (result_tx, rx) = oneshot::channel();
        let request = Self {
            id,
            name: name.to_string(),
            args: args.to_vec(),
            lane,
            enqueued_at: Instant::now(),
            result_tx,
        };
        (request, rx)
    }

    /// Deliver the result. Returns false if the caller stopped waiting.
    pub fn complete(self, result: CallResult) -> bool {
        self.result_tx.send(result).is_ok()
    }
}

impl Queued for CallRequest {
    fn lane(&self) -> Lane {
        self.lane
    }
}

struct State<T> {
    items: LaneQueue<T>,
    closed: bool,
}

/// Thread-safe bounded queue with a first lane.
pub struct BoundedQueue<T> {
    label: &'static str,
    capacity: usize,
    state: Mutex<State<T>>,
    not_full: Condvar,
    doorbell: Arc<Doorbell>,
}

impl<T: Queued> BoundedQueue<T> {
    pub fn new(label: &'static str, capacity: usize, doorbell: Arc<Doorbell>) -> Self {
        Self {
            label,
            capacity: capacity.max(1),
            state: Mutex::new(State { items: LaneQueue::new(), closed: false }),
            not_full: Condvar::new(),
            doorbell,
        }
    }

    /// Enqueue `item` in its own lane, then ring the doorbell.
    pub fn push(&self, item: T, admission: Admission) -> Result<(), DispatchError> {
        {
            let mut state = self.state.lock();
            loop {
                if state.closed {
                    return Err(DispatchError::Shutdown);
                }
                if state.items.len() < self.capacity {
                    break;
                }
                match admission {
                    Admission::Reject => {
                        return Err(DispatchError::QueueFull {
                            queue: self.label,
                            capacity: self.capacity,
                        });
                    }
                    Admission::Block => self.not_full.wait(&mut state),
                }
            }
            let lane = item.lane();
            state.items.push(item, lane);
            record_queue_depth(self.label, state.items.len());
        }
        self.doorbell.ring();
        Ok(())
    }

    /// Take the next item in service order without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let item = {
            let mut state = self.state.lock();
            let item = state.items.pop();
            if item.is_some() {
                record_queue_depth(self.label, state.items.len());
            }
            item
        };
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Whether an item is ready for the consumer.
    pub fn has_ready(&self) -> bool {
        !self.state.lock().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Refuse further pushes and release blocked producers.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Remove every queued item, in service order.
    pub fn drain(&self) -> Vec<T> {
        let items = self.state.lock().items.drain_ordered();
        record_queue_depth(self.label, 0);
        self.not_full.notify_all();
        items
    }
}

/// The queue of pending native calls.
pub type CallQueue = BoundedQueue<CallRequest>;

/// Default call queue capacity.
pub const DEFAULT_CALL_QUEUE_CAPACITY: usize = 999;
