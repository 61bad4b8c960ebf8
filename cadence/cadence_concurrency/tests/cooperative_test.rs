//! Integration tests for the cooperative strategy.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cadence_concurrency::{Executor, ExecutorConfig, StrategyKind, Task};
use cadence_core::error::Error;
use cadence_core::types::{ExecutorState, Schedule, Timeout};
use parking_lot::Mutex;

fn cooperative() -> Executor {
    Executor::with_config(ExecutorConfig {
        strategy: StrategyKind::Cooperative,
        resolution_ms: Some(5),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_value_task() {
    let executor = cooperative();
    assert_eq!(executor.strategy(), StrategyKind::Cooperative);
    assert_eq!(executor.stats().strategy, "cooperative");
    assert!(executor.stats().pool.is_none());

    let future = executor.execute(|| 42).unwrap();
    assert_eq!(future.wait_and_get(-1).unwrap().value(), Some(&42));
    assert!(future.is_stopped());
}

#[test]
fn test_runs_on_a_single_thread() {
    let executor = cooperative();
    let threads = Arc::new(Mutex::new(Vec::new()));

    let futures: Vec<_> = (0..5)
        .map(|_| {
            let threads = threads.clone();
            executor
                .execute(move || threads.lock().push(thread::current().id()))
                .unwrap()
        })
        .collect();
    for future in &futures {
        future.wait_and_get(-1).unwrap();
    }

    let threads = threads.lock();
    assert_eq!(threads.len(), 5);
    assert!(threads.iter().all(|id| *id == threads[0]));
    assert_ne!(threads[0], thread::current().id());
}

#[test]
fn test_interval_and_cancel() {
    let executor = cooperative();
    let count = Arc::new(AtomicUsize::new(0));
    let future = {
        let count = count.clone();
        executor
            .submit(
                Task::effect(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
                Schedule::every(10),
            )
            .unwrap()
    };

    future.wait_for_next(Timeout::Unbounded, 2);
    future.cancel();
    let after_cancel = count.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(count.load(Ordering::SeqCst), after_cancel);
}

#[test]
fn test_failure_does_not_stop_the_loop() {
    let executor = cooperative();
    let failed = executor
        .submit(Task::<()>::fallible(|| Err("nope")), Schedule::once())
        .unwrap();
    assert!(failed.wait_and_get(-1).unwrap().is_failure());

    let next = executor.execute(|| 7).unwrap();
    assert_eq!(next.wait_and_get(-1).unwrap().value(), Some(&7));
}

#[test]
fn test_stop_lifecycle() {
    let executor = cooperative();
    let pending = executor
        .submit(Task::new(|| 1), Schedule::once_after(10_000))
        .unwrap();

    executor.stop();
    assert!(executor.await_termination(Timeout::Bounded(Duration::from_secs(1))));
    assert_eq!(executor.state(), ExecutorState::Stopped);
    assert!(pending.is_stopped());
    assert!(pending.result().is_none());
    assert!(matches!(
        executor.execute(|| 1),
        Err(Error::ExecutorStopped(ExecutorState::Stopped))
    ));
    assert_eq!(executor.poll(), 0);
}

#[test]
fn test_stop_waits_for_inline_run() {
    let executor = cooperative();
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));

    let future = {
        let started = started.clone();
        let finished = finished.clone();
        executor
            .submit(
                Task::effect(move || {
                    started.store(true, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(200));
                    finished.store(true, Ordering::SeqCst);
                }),
                Schedule::once(),
            )
            .unwrap()
    };

    while !started.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
    executor.stop();
    assert_eq!(executor.state(), ExecutorState::Stopping);
    assert!(!executor.await_termination(Timeout::Immediate));

    assert!(executor.await_termination(Timeout::Unbounded));
    assert_eq!(executor.state(), ExecutorState::Stopped);
    assert!(finished.load(Ordering::SeqCst));
    assert!(future.result().is_success());
}

#[test]
fn test_host_poll_drives_due_work() {
    // A far-off control tick leaves the work to the host loop
    let executor = Executor::with_config(ExecutorConfig {
        strategy: StrategyKind::Cooperative,
        resolution_ms: Some(60_000),
        ..Default::default()
    })
    .unwrap();

    let future = executor
        .submit(Task::new(|| "polled"), Schedule::once_after(20))
        .unwrap();
    thread::sleep(Duration::from_millis(30));

    let mut executed = 0;
    for _ in 0..10 {
        executed += executor.poll();
        if future.runs() > 0 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(executed, 1);
    assert_eq!(future.result().value(), Some(&"polled"));
}
