//! Scheduling, barrier and shutdown behavior of the fatigue-balanced pool.
//!
//! Run with: cargo test --package lattice_scheduler --test pool_test

use lattice_scheduler::{Pool, PoolConfig, RejectReason, SchedulerError};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn ok() -> Result<(), Infallible> {
    Ok(())
}

#[test]
fn test_submit_all_waits_for_every_task() {
    const TASKS: usize = 200;

    let pool = Pool::new(4).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let tasks = (0..TASKS).map(|i| {
        let counter = Arc::clone(&counter);
        move || {
            if i % 16 == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            counter.fetch_add(1, Ordering::SeqCst);
            ok()
        }
    });
    pool.submit_all(tasks).unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), TASKS);
    assert_eq!(pool.in_flight(), 0);
}

#[test]
fn test_empty_batch_returns_immediately() {
    let pool = Pool::new(2).unwrap();
    let nothing: Vec<fn() -> Result<(), Infallible>> = Vec::new();
    pool.submit_all(nothing).unwrap();
}

#[test]
fn test_single_worker_serializes_batch() {
    let pool = Pool::new(1).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let tasks = (0..5).map(|i| {
        let order = Arc::clone(&order);
        move || {
            thread::sleep(Duration::from_millis(2));
            order.lock().push(i);
            ok()
        }
    });
    pool.submit_all(tasks).unwrap();

    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_higher_multiplier_accrues_more_fatigue() {
    let pool = Pool::with_multipliers(vec![0.5, 1.5]).unwrap();

    for _ in 0..3 {
        let tasks = (0..2).map(|_| {
            || {
                thread::sleep(Duration::from_millis(30));
                ok()
            }
        });
        pool.submit_all(tasks).unwrap();
    }

    let report = pool.snapshot();
    let (calm, tired) = (&report.workers[0], &report.workers[1]);
    assert!(calm.busy >= Duration::from_millis(90));
    assert!(tired.busy >= Duration::from_millis(90));
    assert!(tired.fatigue > calm.fatigue);
    assert!(report.fairness > 0.0);
}

#[test]
fn test_least_fatigued_worker_is_chosen() {
    let pool = Pool::with_multipliers(vec![1.0, 1.0, 1.0]).unwrap();
    let names = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..3 {
        let names = Arc::clone(&names);
        pool.submit_all([move || {
            thread::sleep(Duration::from_millis(10));
            names
                .lock()
                .push(thread::current().name().unwrap_or_default().to_string());
            ok()
        }])
        .unwrap();
    }

    assert_eq!(
        *names.lock(),
        vec!["lattice-worker-0", "lattice-worker-1", "lattice-worker-2"]
    );
}

#[test]
fn test_failures_are_isolated_and_reported() {
    let pool = Pool::new(3).unwrap();
    let completed = Arc::new(AtomicUsize::new(0));

    let tasks = (0..10).map(|i| {
        let completed = Arc::clone(&completed);
        move || -> Result<(), String> {
            match i {
                3 => Err(format!("bad row {i}")),
                5 => panic!("row {i} exploded"),
                _ => {
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        }
    });

    match pool.submit_all(tasks) {
        Err(SchedulerError::TaskFailed { failed, first }) => {
            assert_eq!(failed, 2);
            assert!(first.contains("bad row 3") || first.contains("row 5 exploded"));
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }
    assert_eq!(completed.load(Ordering::SeqCst), 8);

    // Workers survived and the failure log was drained.
    assert!(pool.workers().iter().all(|w| w.is_alive()));
    pool.submit_all((0..6).map(|_| ok)).unwrap();
    assert!(pool.take_failures().is_empty());
}

#[test]
fn test_zero_workers_is_a_config_error() {
    assert!(matches!(Pool::new(0), Err(SchedulerError::InvalidConfig(_))));
    assert!(matches!(
        Pool::with_multipliers(Vec::new()),
        Err(SchedulerError::InvalidConfig(_))
    ));
    assert!(matches!(
        Pool::with_multipliers(vec![1.0, f64::NAN]),
        Err(SchedulerError::InvalidConfig(_))
    ));
}

#[test]
fn test_seeded_config_is_reproducible() {
    let config = PoolConfig {
        seed: Some(99),
        ..PoolConfig::with_workers(3)
    };
    let a = Pool::with_config(&config).unwrap();
    let b = Pool::with_config(&config).unwrap();
    let multipliers = |pool: &Pool| pool.workers().iter().map(|w| w.multiplier()).collect::<Vec<_>>();
    assert_eq!(multipliers(&a), multipliers(&b));
}

#[test]
fn test_submit_after_shutdown_fails() {
    let pool = Pool::new(2).unwrap();
    pool.shutdown();
    pool.shutdown();

    assert!(pool.is_shut_down());
    assert!(pool.workers().iter().all(|w| !w.is_alive()));
    assert_eq!(pool.submit(ok), Err(SchedulerError::ShutDown));
    assert_eq!(pool.submit_all([ok, ok]), Err(SchedulerError::ShutDown));
}

#[test]
fn test_shutdown_releases_blocked_submitter() {
    let pool = Pool::new(1).unwrap();
    pool.submit(|| {
        thread::sleep(Duration::from_millis(200));
        ok()
    })
    .unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            thread::sleep(Duration::from_millis(30));
            pool.shutdown();
        });
        // The only worker is busy, so this parks on the idle heap.
        assert_eq!(pool.submit(ok), Err(SchedulerError::ShutDown));
    });
    assert_eq!(pool.in_flight(), 0);
}

#[test]
fn test_shutdown_drains_running_task() {
    let pool = Pool::new(1).unwrap();
    let done = Arc::new(AtomicUsize::new(0));
    let d = Arc::clone(&done);
    pool.submit(move || {
        thread::sleep(Duration::from_millis(30));
        d.fetch_add(1, Ordering::SeqCst);
        ok()
    })
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !pool.workers()[0].is_busy() {
        assert!(Instant::now() < deadline, "worker never picked up the task");
        thread::yield_now();
    }

    pool.shutdown();
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn test_rejected_assignment_is_surfaced_and_undone() {
    let pool = Pool::with_multipliers(vec![1.0, 1.0]).unwrap();
    pool.workers()[0].request_stop();

    // Worker 0 wins the tie on id, then refuses.
    assert_eq!(
        pool.submit(ok),
        Err(SchedulerError::WorkerUnavailable {
            worker: 0,
            reason: RejectReason::Stopped,
        })
    );
    assert_eq!(pool.in_flight(), 0);
    assert_eq!(pool.idle_count(), 1);

    assert_eq!(pool.submit(ok), Ok(()));
    assert_eq!(pool.submit_all(vec![ok]), Ok(()));
    assert!(pool.take_failures().is_empty());
}

#[test]
fn test_aborted_batch_does_not_leak_failures() {
    let pool = Pool::with_multipliers(vec![1.0, 1.0]).unwrap();
    pool.workers()[1].request_stop();

    let bad_row = || -> Result<(), String> {
        thread::sleep(Duration::from_millis(20));
        Err("bad row".into())
    };
    let good_row = || -> Result<(), String> { Ok(()) };
    let first: Vec<Box<dyn FnOnce() -> Result<(), String> + Send>> =
        vec![Box::new(bad_row), Box::new(good_row)];

    assert_eq!(
        pool.submit_all(first),
        Err(SchedulerError::WorkerUnavailable {
            worker: 1,
            reason: RejectReason::Stopped,
        })
    );
    assert_eq!(pool.in_flight(), 0);

    assert_eq!(pool.submit_all(vec![ok]), Ok(()));
}

#[test]
fn test_report_lists_every_worker() {
    let pool = Pool::new(3).unwrap();
    pool.submit_all((0..6).map(|_| {
        || {
            thread::sleep(Duration::from_millis(2));
            ok()
        }
    }))
    .unwrap();

    let report = pool.report();
    for id in 0..3 {
        assert!(report.contains(&format!("Worker #{id} | Fatigue: ")));
    }
    assert!(report.contains("Fairness (Sum of Squared Deviations): "));

    let snapshot = pool.snapshot();
    assert_eq!(snapshot.workers.len(), 3);
    assert!(snapshot.total_fatigue() > 0.0);
}
