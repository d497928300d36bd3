// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Two-lane request ordering.

use std::collections::VecDeque;

use serde::Serialize;

/// Admission lane for a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Appended behind everything already queued.
    #[default]
    Normal,
    /// Served ahead of every normal item, FIFO among other first-lane items.
    First,
}

impl Lane {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::First => "first",
        }
    }
}

/// Something that can sit in a [`BoundedQueue`](super::BoundedQueue).
///
/// The lane travels with the item so the queue never has to be told it
/// separately.
pub trait Queued {
    fn lane(&self) -> Lane {
        Lane::Normal
    }
}

/// Two FIFO lanes; the first lane always drains before the normal one.
pub struct LaneQueue<T> {
    first: VecDeque<T>,
    normal: VecDeque<T>,
}

impl<T> LaneQueue<T> {
    pub fn new() -> Self {
        Self { first: VecDeque::new(), normal: VecDeque::new() }
    }

    pub fn push(&mut self, item: T, lane: Lane) {
        match lane {
            Lane::First => self.first.push_back(item),
            Lane::Normal => self.normal.push_back(item),
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.first.pop_front().or_else(|| self.normal.pop_front())
    }

    pub fn len(&self) -> usize {
        self.first.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.normal.is_empty()
    }

    /// Remove everything, in service order.
    pub fn drain_ordered(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.first.drain(..));
        out.extend(self.normal.drain(..));
        out
    }
}

impl<T> Default for LaneQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
