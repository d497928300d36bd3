// Copyright 2024-2026 mb-dispatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Win32 message pump running as a loop job.
//!
//! `GetMessageW` blocks the dispatch thread until a message arrives, so a
//! wake hook posts `WM_NULL` to that thread whenever work is queued.
//! `PostThreadMessageW` fails for a thread without a message queue, so the
//! queue is forced into existence before the thread id is published.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::debug;
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW, TranslateMessage, MSG,
    PM_NOREMOVE, WM_NULL, WM_USER,
};

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;

pub(crate) fn install_message_pump(dispatcher: &Dispatcher) -> Result<(), DispatchError> {
    let native_id = Arc::new(AtomicU32::new(0));
    let slot = Arc::clone(&native_id);
    dispatcher
        .submit_job(move || unsafe {
            let mut msg: MSG = std::mem::zeroed();
            PeekMessageW(&mut msg, 0, WM_USER, WM_USER, PM_NOREMOVE);
            slot.store(GetCurrentThreadId(), Ordering::Release);
        })?
        .wait()?;
    let native_id = native_id.load(Ordering::Acquire);

    dispatcher.add_wake_hook(Arc::new(move || {
        if unsafe { PostThreadMessageW(native_id, WM_NULL, 0, 0) } == 0 {
            debug!(native_id, "wake message not posted");
        }
    }));

    let mut msg: MSG = unsafe { std::mem::zeroed() };
    dispatcher.add_loop(move || unsafe {
        if GetMessageW(&mut msg, 0, 0, 0) <= 0 {
            return;
        }
        TranslateMessage(&msg);
        DispatchMessageW(&msg);
    })?;

    debug!(native_id, "message pump installed");
    Ok(())
}
