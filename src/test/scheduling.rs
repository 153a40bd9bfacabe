use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::scheduler::{Scheduler, Servant, StopCondition, SyncCondition};

#[test]
fn tasks_run_in_posting_order() {
    let scheduler = Scheduler::new("test-order");
    let servant = Servant::new(Arc::clone(&scheduler), Vec::<usize>::new());
    for i in 0..100 {
        servant.post(move |order| order.push(i));
    }
    let order = servant.post_future(|order| order.clone());
    assert_eq!(order, (0..100).collect::<Vec<_>>());
}

#[test]
fn post_future_returns_the_task_result() {
    let scheduler = Scheduler::new("test-future");
    let servant = Servant::new(scheduler, 41usize);
    let result = servant.post_future(|state| {
        *state += 1;
        *state
    });
    assert_eq!(result, 42);
}

#[test]
fn futures_resolve_without_blocking_the_caller() {
    let scheduler = Scheduler::new("test-async-future");
    let servant = Servant::new(scheduler, ());
    let future = servant.future(|_| 7usize);
    assert_eq!(future.get(), Ok(7));
}

#[test]
fn tasks_run_on_the_scheduler_thread() {
    let scheduler = Scheduler::new("test-thread");
    let expected = scheduler.thread_id();
    let servant = Servant::new(scheduler, ());
    let actual = servant.post_future(move |_| std::thread::current().id());
    assert_eq!(actual, expected);
}

#[test]
fn callbacks_are_routed_through_the_caller_scheduler() {
    let worker = Scheduler::new("test-cb-worker");
    let caller = Scheduler::new("test-cb-caller");
    let servant = Servant::new(worker, 10usize);

    let delivered = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&delivered);
    servant.post_callback(|state| *state * 2, &caller, move |result| {
        *sink.lock().unwrap() = Some(result);
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while delivered.lock().unwrap().is_none() {
        assert!(Instant::now() < deadline, "callback never arrived");
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(*delivered.lock().unwrap(), Some(20));
}

#[test]
fn callbacks_to_a_destroyed_scheduler_are_dropped() {
    let worker = Scheduler::new("test-cb-dropped");
    let caller = Scheduler::new("test-cb-gone");
    let servant = Servant::new(worker, ());

    let ran = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&ran);
    // Delay the worker so the caller is gone before the result is ready.
    servant.post(|_| std::thread::sleep(Duration::from_millis(50)));
    servant.post_callback(|_| (), &caller, move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });
    drop(caller);

    servant.post_future(|_| ());
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn destruction_drains_the_queue() {
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let scheduler = Scheduler::new("test-drain");
        let servant = Servant::new(scheduler, Arc::clone(&counter));
        for _ in 0..50 {
            servant.post(|counter| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
    }
    // The scheduler is gone; all fifty tasks must have run.
    assert_eq!(counter.load(Ordering::SeqCst), 50);
}

#[test]
fn stop_condition_interrupts_wait_for() {
    let stop = StopCondition::new();
    let waiter = stop.clone();
    let handle = std::thread::spawn(move || {
        let started = Instant::now();
        let raised = waiter.wait_for(Duration::from_secs(10));
        (raised, started.elapsed())
    });
    std::thread::sleep(Duration::from_millis(20));
    stop.raise();
    let (raised, elapsed) = handle.join().unwrap();
    assert!(raised);
    assert!(elapsed < Duration::from_secs(5));
}

#[test]
fn stop_condition_times_out_quietly() {
    let stop = StopCondition::new();
    assert!(!stop.wait_for(Duration::from_millis(5)));
    assert!(!stop.is_raised());
}

#[test]
fn sync_condition_wakes_on_notify() {
    let sync = SyncCondition::new();
    let stop = StopCondition::new();
    let waiter = sync.clone();
    let stop_handle = stop.clone();
    let handle = std::thread::spawn(move || {
        waiter.wait(&stop_handle);
    });
    std::thread::sleep(Duration::from_millis(10));
    sync.notify();
    handle.join().unwrap();
}
