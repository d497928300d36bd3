// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span utilities and extension traits for dispatcher tracing.

use tracing::{info_span, Span};

use crate::scheduler::Lane;

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for native call spans.
pub struct CallSpan;

impl CallSpan {
    /// Span for a call served from the queue.
    ///
    /// `status`, `error.message` and `queued_us` are filled in after the call.
    pub fn queued(request_id: u64, name: &str, lane: Lane) -> Span {
        info_span!(
            "native_call",
            request_id = request_id,
            name = %name,
            lane = lane.as_str(),
            inline = false,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            queued_us = tracing::field::Empty,
        )
    }

    /// Span for a call executed inline on the dispatch thread.
    pub fn inline(name: &str) -> Span {
        info_span!(
            "native_call",
            name = %name,
            inline = true,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
