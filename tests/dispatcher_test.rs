//! Integration tests for call routing, ordering, and fault containment.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mb_dispatch::scheduler::LoopJob;
use mb_dispatch::{
    CallReturn, DispatchConfig, DispatchError, Dispatcher, FnTable, Lane, NativeFault, RawReturn,
};
use parking_lot::Mutex;

/// Table that logs the first argument of every `record` call.
fn recording_table(log: Arc<Mutex<Vec<usize>>>) -> FnTable {
    FnTable::new()
        .with("record", move |args| {
            log.lock().push(args[0]);
            RawReturn::ok(args[0])
        })
        .with("add", |args| RawReturn::ok(args.iter().sum()))
        .with("fail", |_| RawReturn::failed(0, 5))
        .with("boom", |_| panic!("kaboom"))
}

fn start(table: FnTable) -> Dispatcher {
    Dispatcher::start(Arc::new(table), DispatchConfig::default()).unwrap()
}

/// Park the dispatch thread in a job until the returned sender is used.
fn hold_loop(dispatcher: &Dispatcher) -> mpsc::Sender<()> {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    dispatcher
        .submit_job(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    release_tx
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

// === Ordering ===

#[test]
fn priority_call_overtakes_queued_normal_calls() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = start(recording_table(log.clone()));

    let release = hold_loop(&dispatcher);
    let a = dispatcher.call_async("record", &[b'A' as usize]).unwrap();
    let b = dispatcher.call_async("record", &[b'B' as usize]).unwrap();
    let c = dispatcher.call_async("record", &[b'C' as usize]).unwrap();
    let d = dispatcher.call_async_priority("record", &[b'D' as usize]).unwrap();
    release.send(()).unwrap();

    for handle in [a, b, c, d] {
        handle.wait().unwrap();
    }
    let order: String = log.lock().iter().map(|&b| b as u8 as char).collect();
    assert_eq!(order, "DABC");
}

#[test]
fn concurrent_priority_callers_keep_submission_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Arc::new(start(recording_table(log.clone())));

    let release = hold_loop(&dispatcher);
    let normals: Vec<_> = (0..5).map(|i| dispatcher.call_async("record", &[1000 + i]).unwrap()).collect();

    // Each producer records its tag under the same lock it submits with,
    // so `submitted` is the order the first lane was filled in.
    let submitted = Arc::new(Mutex::new(Vec::new()));
    let producers: Vec<_> = (0..4usize)
        .map(|p| {
            let dispatcher = dispatcher.clone();
            let submitted = submitted.clone();
            thread::spawn(move || {
                (0..5usize)
                    .map(|i| {
                        let tag = p * 10 + i;
                        let mut order = submitted.lock();
                        let handle = dispatcher.call_async_priority("record", &[tag]).unwrap();
                        order.push(tag);
                        handle
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let priority: Vec<_> = producers.into_iter().flat_map(|p| p.join().unwrap()).collect();
    release.send(()).unwrap();

    for handle in normals.into_iter().chain(priority) {
        handle.wait().unwrap();
    }
    let served = log.lock().clone();
    let submitted = submitted.lock().clone();
    assert_eq!(served.len(), 25);
    assert_eq!(&served[..20], &submitted[..]);
    assert_eq!(&served[20..], &[1000, 1001, 1002, 1003, 1004]);
}

#[test]
fn jobs_and_calls_alternate_one_each_per_iteration() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let call_log = log.clone();
    let dispatcher = start(FnTable::new().with("tag", move |args| {
        call_log.lock().push(format!("C{}", args[0]));
        RawReturn::ok(0)
    }));

    let release = hold_loop(&dispatcher);
    let mut jobs = Vec::new();
    let mut calls = Vec::new();
    for i in 0..3usize {
        let job_log = log.clone();
        jobs.push(dispatcher.submit_job(move || job_log.lock().push(format!("J{i}"))).unwrap());
        calls.push(dispatcher.call_async("tag", &[i]).unwrap());
    }
    release.send(()).unwrap();

    for job in jobs {
        job.wait().unwrap();
    }
    for call in calls {
        call.wait().unwrap();
    }
    // The held job's iteration serves C0; each later iteration runs one
    // job, then one call.
    assert_eq!(*log.lock(), vec!["C0", "J0", "C1", "J1", "C2", "J2"]);
}

#[test]
fn normal_calls_are_fifo() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = start(recording_table(log.clone()));

    let release = hold_loop(&dispatcher);
    let handles: Vec<_> = (0..10).map(|i| dispatcher.call_async("record", &[i]).unwrap()).collect();
    release.send(()).unwrap();
    for handle in handles {
        handle.wait().unwrap();
    }
    assert_eq!(*log.lock(), (0..10).collect::<Vec<_>>());
}

#[test]
fn job_runs_before_queued_call() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = start(recording_table(log.clone()));

    let release = hold_loop(&dispatcher);
    let call = dispatcher.call_async("record", &[1]).unwrap();
    let job_log = log.clone();
    let job = dispatcher.submit_job(move || job_log.lock().push(0)).unwrap();
    release.send(()).unwrap();

    job.wait().unwrap();
    call.wait().unwrap();
    assert_eq!(*log.lock(), vec![0, 1]);
}

// === Concurrency ===

#[test]
fn concurrent_callers_each_get_their_own_result() {
    let dispatcher = Arc::new(start(recording_table(Arc::default())));

    let workers: Vec<_> = (0..8)
        .map(|t| {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    let result = dispatcher.call("add", &[t * 1000, i]).unwrap();
                    assert_eq!(result.r1, t * 1000 + i);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stats = dispatcher.stats();
    assert_eq!(stats.calls_enqueued, 400);
    assert_eq!(stats.calls_served, 400);
    assert_eq!(stats.calls_inline, 0);
}

#[test]
fn only_the_dedicated_thread_invokes_the_library() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let table = FnTable::new().with("whoami", move |_| {
        recorder.lock().push(thread::current().id());
        RawReturn::ok(0)
    });
    let dispatcher = Arc::new(start(table));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    dispatcher.call("whoami", &[]).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let dedicated = dispatcher.dedicated_thread().unwrap();
    let seen = seen.lock();
    assert_eq!(seen.len(), 40);
    assert!(seen.iter().all(|id| *id == dedicated));
}

#[test]
fn dispatch_thread_uses_configured_name() {
    let config = DispatchConfig { thread_name: "ui-affine".to_string(), ..Default::default() };
    let dispatcher = Dispatcher::start(Arc::new(FnTable::new()), config).unwrap();
    let (tx, rx) = mpsc::channel();
    dispatcher
        .submit_job(move || tx.send(thread::current().name().map(str::to_string)).unwrap())
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(rx.recv().unwrap().as_deref(), Some("ui-affine"));
}

// === Inline execution ===

#[test]
fn call_from_dispatch_thread_runs_inline() {
    let dispatcher = Arc::new(start(recording_table(Arc::default())));
    let inner = dispatcher.clone();
    let (tx, rx) = mpsc::channel();

    dispatcher
        .submit_job(move || {
            assert!(inner.is_dedicated_thread());
            tx.send(inner.call("add", &[1, 2])).unwrap();
        })
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(rx.recv().unwrap(), Ok(CallReturn { r1: 3, r2: 0 }));
    let stats = dispatcher.stats();
    assert_eq!(stats.calls_inline, 1);
    assert_eq!(stats.calls_enqueued, 0);
}

#[test]
fn job_submitted_from_dispatch_thread_runs_immediately() {
    let dispatcher = Arc::new(start(FnTable::new()));
    let inner = dispatcher.clone();
    let (tx, rx) = mpsc::channel();

    dispatcher
        .submit_job(move || {
            let flag = Arc::new(Mutex::new(false));
            let set = flag.clone();
            let nested = inner.submit_job(move || *set.lock() = true).unwrap();
            tx.send((*flag.lock(), nested.wait())).unwrap();
        })
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(rx.recv().unwrap(), (true, Ok(())));
    assert_eq!(dispatcher.stats().jobs_inline, 1);
}

#[test]
fn waiting_on_own_queued_call_reports_deadlock() {
    let dispatcher = Arc::new(start(recording_table(Arc::default())));
    let inner = dispatcher.clone();
    let (tx, rx) = mpsc::channel();

    dispatcher
        .submit_job(move || {
            let handle = inner.call_async("add", &[2, 2]).unwrap();
            tx.send(handle.wait()).unwrap();
        })
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(rx.recv().unwrap(), Err(DispatchError::WouldDeadlock));
}

#[test]
fn async_call_matches_blocking_call() {
    let dispatcher = start(recording_table(Arc::default()));
    let blocking = dispatcher.call("add", &[20, 22]);
    let handle = dispatcher.call_async("add", &[20, 22]).unwrap();
    assert!(handle.id() > 0);
    assert_eq!(handle.name(), "add");
    assert_eq!(handle.wait(), blocking);
}

#[tokio::test]
async fn wait_async_delivers_result() {
    let dispatcher = start(recording_table(Arc::default()));
    let handle = dispatcher.call_async_priority("add", &[4, 5]).unwrap();
    assert_eq!(handle.wait_async().await, Ok(CallReturn { r1: 9, r2: 0 }));

    let job = dispatcher.submit_job(|| {}).unwrap();
    assert_eq!(job.wait_async().await, Ok(()));
}

// === Failures ===

#[test]
fn fault_is_returned_and_loop_keeps_serving() {
    let dispatcher = start(recording_table(Arc::default()));

    let err = dispatcher.call("fail", &[]).unwrap_err();
    assert!(err.is_fault());
    assert_eq!(
        err,
        DispatchError::Invocation {
            name: "fail".into(),
            fault: NativeFault::LastError { code: 5, r1: 0, r2: 0 },
        }
    );
    assert_eq!(dispatcher.call("add", &[1, 1]).unwrap().r1, 2);
}

#[test]
fn unknown_entry_point_is_resolution_error() {
    let dispatcher = start(recording_table(Arc::default()));
    assert_eq!(
        dispatcher.call("doesNotExist", &[]),
        Err(DispatchError::Resolution("doesNotExist".into()))
    );
    assert_eq!(dispatcher.call("add", &[3]).unwrap().r1, 3);
    assert_eq!(dispatcher.cached_procedures(), 1);
}

#[test]
fn native_panic_is_contained() {
    let dispatcher = start(recording_table(Arc::default()));
    let err = dispatcher.call("boom", &[]).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Invocation { fault: NativeFault::Panic(ref msg), .. } if msg == "kaboom"
    ));
    assert!(dispatcher.call("add", &[]).is_ok());
}

#[test]
fn job_panic_is_reported_to_submitter() {
    let dispatcher = start(recording_table(Arc::default()));
    let result = dispatcher.submit_job(|| panic!("job went wrong")).unwrap().wait();
    assert_eq!(result, Err(DispatchError::JobPanicked("job went wrong".into())));
    assert!(dispatcher.call("add", &[]).is_ok());
}

#[test]
fn try_call_async_rejects_when_full() {
    let config = DispatchConfig { call_queue_capacity: 2, ..Default::default() };
    let dispatcher = Dispatcher::start(Arc::new(recording_table(Arc::default())), config).unwrap();

    let release = hold_loop(&dispatcher);
    let first = dispatcher.try_call_async("add", &[1], Lane::Normal).unwrap();
    let second = dispatcher.try_call_async("add", &[2], Lane::First).unwrap();
    assert_eq!(dispatcher.pending_calls(), 2);
    assert_eq!(
        dispatcher.try_call_async("add", &[3], Lane::First).unwrap_err(),
        DispatchError::QueueFull { queue: "call queue", capacity: 2 }
    );
    release.send(()).unwrap();

    assert_eq!(second.wait().unwrap().r1, 2);
    assert_eq!(first.wait().unwrap().r1, 1);
}

#[test]
fn blocking_producer_waits_for_space() {
    let config = DispatchConfig { call_queue_capacity: 1, ..Default::default() };
    let dispatcher = Arc::new(Dispatcher::start(Arc::new(recording_table(Arc::default())), config).unwrap());

    let release = hold_loop(&dispatcher);
    let queued = dispatcher.call_async("add", &[1]).unwrap();

    let producer = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || dispatcher.call("add", &[2]))
    };
    thread::sleep(Duration::from_millis(30));
    assert!(!producer.is_finished());

    release.send(()).unwrap();
    assert_eq!(queued.wait().unwrap().r1, 1);
    assert_eq!(producer.join().unwrap().unwrap().r1, 2);
}

// === Loop jobs ===

#[test]
fn loop_jobs_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = start(FnTable::new());

    let first = log.clone();
    let second = log.clone();
    let jobs: Vec<LoopJob> = vec![
        Box::new(move || first.lock().push(1)),
        Box::new(move || second.lock().push(2)),
    ];
    dispatcher.add_loops(jobs).unwrap();

    wait_until(|| dispatcher.stats().loop_ticks >= 3);
    dispatcher.cancel();

    let log = log.lock();
    assert!(log.len() >= 6);
    for (i, tag) in log.iter().enumerate() {
        assert_eq!(*tag, if i % 2 == 0 { 1 } else { 2 });
    }
}

#[test]
fn loop_jobs_do_not_starve_calls() {
    let dispatcher = Dispatcher::builder(Arc::new(recording_table(Arc::default())))
        .loop_job(|| thread::sleep(Duration::from_millis(1)))
        .start()
        .unwrap();

    for i in 0..20 {
        assert_eq!(dispatcher.call("add", &[i]).unwrap().r1, i);
    }
    assert!(dispatcher.stats().loop_ticks > 0);
}

#[test]
fn panicking_loop_job_is_dropped() {
    let dispatcher = start(recording_table(Arc::default()));
    let ticks = Arc::new(Mutex::new(0u32));
    let counter = ticks.clone();
    dispatcher.add_loop(|| panic!("bad pump")).unwrap();
    dispatcher.add_loop(move || *counter.lock() += 1).unwrap();

    wait_until(|| *ticks.lock() >= 5);
    assert_eq!(dispatcher.call("add", &[7]).unwrap().r1, 7);
}

#[test]
fn loop_jobs_registered_before_start_run_every_idle_tick() {
    let counters: Vec<Arc<Mutex<u64>>> = (0..3).map(|_| Arc::default()).collect();
    let mut builder = Dispatcher::builder(Arc::new(FnTable::new()));
    for counter in &counters {
        let counter = counter.clone();
        builder = builder.loop_job(move || *counter.lock() += 1);
    }
    let dispatcher = builder.start().unwrap();

    wait_until(|| dispatcher.stats().loop_ticks >= 10);
    dispatcher.cancel();
    dispatcher.shutdown(Duration::from_secs(5));

    let ticks = dispatcher.stats().loop_ticks;
    for counter in &counters {
        assert_eq!(*counter.lock(), ticks);
    }
}
