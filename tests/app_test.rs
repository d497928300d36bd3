//! Tests for the native runtime lifecycle built on the dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mb_dispatch::app::names;
use mb_dispatch::{App, DispatchConfig, FnTable, NativeLibrary, RawReturn, ShutdownResult};
use parking_lot::Mutex;

static VERSION_TEXT: &[u8] = b"2.1.0\0";

/// A fake runtime that logs lifecycle calls in order.
fn runtime(already_initialized: bool) -> (Arc<dyn NativeLibrary>, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let initialized = Arc::new(AtomicBool::new(already_initialized));

    let (init_log, init_flag) = (log.clone(), initialized.clone());
    let (fin_log, fin_flag) = (log.clone(), initialized.clone());
    let destroy_log = log.clone();
    let query_flag = initialized;

    let table = FnTable::new()
        .with(names::IS_INITIALIZE, move |_| RawReturn::ok(query_flag.load(Ordering::SeqCst) as usize))
        .with(names::INITIALIZE, move |_| {
            init_flag.store(true, Ordering::SeqCst);
            init_log.lock().push("initialize".to_string());
            RawReturn::ok(0)
        })
        .with(names::FINALIZE, move |_| {
            fin_flag.store(false, Ordering::SeqCst);
            fin_log.lock().push("finalize".to_string());
            RawReturn::ok(0)
        })
        .with(names::DESTROY_WEB_WINDOW, move |args| {
            destroy_log.lock().push(format!("destroy {:#x}", args[0]));
            RawReturn::ok(0)
        })
        .with(names::VERSION, |_| RawReturn::ok(0x0002_0001))
        .with(names::VERSION_STRING, |_| RawReturn::ok(VERSION_TEXT.as_ptr() as usize));

    (Arc::new(table), log)
}

#[test]
fn new_initializes_uninitialized_runtime() {
    let (library, log) = runtime(false);
    let app = App::new(library, DispatchConfig::default()).unwrap();
    assert!(app.is_initialized().unwrap());
    assert_eq!(app.version().unwrap(), 0x0002_0001);
    assert_eq!(*log.lock(), vec!["initialize"]);
}

#[test]
fn version_string_reads_native_text() {
    let (library, _log) = runtime(true);
    let app = App::new(library, DispatchConfig::default()).unwrap();
    assert_eq!(app.version_string_ptr().unwrap(), VERSION_TEXT.as_ptr() as usize);
    assert_eq!(unsafe { app.version_string() }.unwrap(), "2.1.0");
}

#[test]
fn null_version_string_reads_empty() {
    let table = FnTable::new()
        .with(names::IS_INITIALIZE, |_| RawReturn::ok(1))
        .with(names::VERSION_STRING, |_| RawReturn::ok(0));
    let app = App::new(Arc::new(table), DispatchConfig::default()).unwrap();
    assert_eq!(unsafe { app.version_string() }.unwrap(), "");
}

#[test]
fn new_skips_initialize_when_already_initialized() {
    let (library, log) = runtime(true);
    let _app = App::new(library, DispatchConfig::default()).unwrap();
    assert!(log.lock().is_empty());
}

#[test]
fn exit_destroys_windows_then_finalizes() {
    let (library, log) = runtime(false);
    let app = App::new(library, DispatchConfig::default()).unwrap();

    let main = app.track_window(0x10);
    let _devtools = app.track_window(0x20);
    let popup = app.track_window(0x30);
    assert_eq!(app.window(main), Some(0x10));
    assert_eq!(app.untrack_window(popup), Some(0x30));
    assert_eq!(app.window_count(), 2);

    assert_eq!(app.exit(), ShutdownResult::Complete);
    assert_eq!(*log.lock(), vec!["initialize", "destroy 0x10", "destroy 0x20", "finalize"]);
}

#[test]
fn lifecycle_calls_run_on_the_dispatch_thread() {
    let (library, _log) = runtime(true);
    let app = App::new(library, DispatchConfig::default()).unwrap();
    let dispatcher = app.dispatcher();
    assert_eq!(dispatcher.stats().calls_enqueued, 1);
    assert_eq!(dispatcher.stats().calls_inline, 0);
    assert_eq!(dispatcher.cached_procedures(), 1);
}
