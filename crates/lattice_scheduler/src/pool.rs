//! # Fatigue-Balanced Pool
//!
//! The pool owns a fixed set of [`Worker`]s and a min-heap of the idle ones
//! keyed by fatigue. Each submitted task is wrapped in a `Ticket` that, when
//! the task is finished or dropped, puts the worker back on the heap and
//! decrements the in-flight counter.
//!
//! ## Synchronization
//!
//! | State         | Guard                      | Waited on by         |
//! |---------------|----------------------------|----------------------|
//! | idle heap     | `Mutex` + `available`      | `submit`             |
//! | in-flight     | `AtomicUsize` + `barrier`  | `submit_all`         |
//! | failures      | `Mutex`                    | nobody               |
//!
//! The heap and the barrier never share a lock, so a worker finishing a task
//! can always return itself while the driver is parked in either wait.

use std::any::Any;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::config::PoolConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::report::PoolReport;
use crate::worker::{Job, Rejected, Worker, WorkerState};

/// Heap entry. Ordered so that `BinaryHeap::pop` yields the lowest fatigue,
/// then the lowest id.
#[derive(Clone, Copy, Debug)]
struct IdleEntry {
    fatigue: f64,
    worker: usize,
}

impl Ord for IdleEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .fatigue
            .total_cmp(&self.fatigue)
            .then_with(|| other.worker.cmp(&self.worker))
    }
}

impl PartialOrd for IdleEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IdleEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for IdleEntry {}

/// Blocking min-heap of idle workers.
#[derive(Debug, Default)]
struct IdleQueue {
    heap: Mutex<BinaryHeap<IdleEntry>>,
    available: Condvar,
}

impl IdleQueue {
    fn push(&self, worker: usize, fatigue: f64) {
        self.heap.lock().push(IdleEntry { fatigue, worker });
        self.available.notify_one();
    }

    /// Blocks until a worker is idle. Returns `None` once `closed` is set.
    fn pop(&self, closed: &AtomicBool) -> Option<usize> {
        let mut heap = self.heap.lock();
        loop {
            if closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(entry) = heap.pop() {
                return Some(entry.worker);
            }
            self.available.wait(&mut heap);
        }
    }

    fn wake_all(&self) {
        let _heap = self.heap.lock();
        self.available.notify_all();
    }

    fn clear(&self) {
        self.heap.lock().clear();
    }

    fn len(&self) -> usize {
        self.heap.lock().len()
    }
}

/// State shared between the pool handle and every ticket.
#[derive(Debug, Default)]
struct Shared {
    idle: IdleQueue,
    in_flight: AtomicUsize,
    barrier_lock: Mutex<()>,
    barrier: Condvar,
    failures: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl Shared {
    fn finish_one(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.barrier_lock.lock();
            self.barrier.notify_all();
        }
    }

    fn wait_quiescent(&self) {
        let mut guard = self.barrier_lock.lock();
        while self.in_flight.load(Ordering::Acquire) > 0 {
            self.barrier.wait(&mut guard);
        }
    }

    fn record_failure(&self, worker: usize, message: String) {
        tracing::warn!(worker, error = %message, "task failed");
        self.failures.lock().push(message);
    }
}

/// Completion hook carried inside every dispatched job.
///
/// Dropping an armed ticket returns the worker to the idle heap (if it is
/// still alive) and releases one in-flight slot. A ticket dropped without an
/// outcome belongs to a job that never ran.
struct Ticket {
    shared: Arc<Shared>,
    worker: Arc<WorkerState>,
    armed: Arc<AtomicBool>,
    outcome: Option<Result<(), String>>,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.armed.load(Ordering::Acquire) {
            return;
        }
        match self.outcome.take() {
            Some(Ok(())) => {}
            Some(Err(message)) => self.shared.record_failure(self.worker.id, message),
            None => self
                .shared
                .record_failure(self.worker.id, "task dropped before running".into()),
        }
        if self.worker.is_alive() {
            self.shared
                .idle
                .push(self.worker.id, self.worker.fatigue());
        }
        self.shared.finish_one();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("task panicked: {detail}"),
        None => "task panicked".to_string(),
    }
}

/// Fixed set of workers scheduled by least fatigue.
pub struct Pool {
    workers: Vec<Worker>,
    shared: Arc<Shared>,
}

impl Pool {
    /// Starts `workers` threads with default multiplier bounds.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] for zero workers and
    /// [`SchedulerError::Spawn`] if a thread cannot be created.
    pub fn new(workers: usize) -> SchedulerResult<Self> {
        Self::with_config(&PoolConfig::with_workers(workers))
    }

    /// Starts a pool from `config`, drawing one multiplier per worker.
    ///
    /// # Errors
    ///
    /// Same as [`Pool::new`].
    pub fn with_config(config: &PoolConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Self::with_multipliers(config.multipliers())
    }

    /// Starts one worker per multiplier, in order. Used for reproducible
    /// scheduling.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] for an empty list or a
    /// negative or non-finite multiplier.
    pub fn with_multipliers(multipliers: Vec<f64>) -> SchedulerResult<Self> {
        if multipliers.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "pool needs at least one worker".into(),
            ));
        }
        if let Some(bad) = multipliers.iter().find(|m| !m.is_finite() || **m < 0.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "fatigue multiplier must be finite and non-negative, got {bad}"
            )));
        }

        let pool = Self {
            workers: multipliers
                .into_iter()
                .enumerate()
                .map(|(id, multiplier)| Worker::new(id, multiplier))
                .collect(),
            shared: Arc::new(Shared::default()),
        };

        // On failure the partially built pool is dropped, which stops and
        // joins whatever did start.
        for worker in &pool.workers {
            worker.start()?;
            pool.shared.idle.push(worker.id(), 0.0);
        }

        tracing::info!(workers = pool.workers.len(), "pool started");
        Ok(pool)
    }

    /// Hands `task` to the least-fatigued idle worker, blocking until one is
    /// idle.
    ///
    /// An `Err` returned by the task, or a panic inside it, is recorded as a
    /// failure and surfaced by the next [`Pool::submit_all`] or
    /// [`Pool::take_failures`]. It never stops the worker.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::ShutDown`] once the pool is shut down
    /// - [`SchedulerError::WorkerUnavailable`] if the popped worker refused the
    ///   task; the task is dropped and not retried
    pub fn submit<F, E>(&self, task: F) -> SchedulerResult<()>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        if self.shared.closed.load(Ordering::Acquire) || !self.workers.iter().any(Worker::is_alive) {
            return Err(SchedulerError::ShutDown);
        }

        let id = self
            .shared
            .idle
            .pop(&self.shared.closed)
            .ok_or(SchedulerError::ShutDown)?;
        let worker = &self.workers[id];
        self.shared.in_flight.fetch_add(1, Ordering::AcqRel);

        let armed = Arc::new(AtomicBool::new(true));
        let ticket = Ticket {
            shared: Arc::clone(&self.shared),
            worker: worker.state(),
            armed: Arc::clone(&armed),
            outcome: None,
        };
        let job: Job = Box::new(move || {
            let mut ticket = ticket;
            let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(payload) => Err(panic_message(payload.as_ref())),
            };
            ticket.outcome = Some(outcome);
        });

        match worker.assign(job) {
            Ok(()) => Ok(()),
            Err(Rejected { reason, job }) => {
                armed.store(false, Ordering::Release);
                drop(job);
                self.shared.finish_one();
                tracing::warn!(worker = id, %reason, "worker rejected task");
                Err(SchedulerError::WorkerUnavailable { worker: id, reason })
            }
        }
    }

    /// Submits every task, then blocks until nothing is in flight.
    ///
    /// Returns immediately for an empty batch. If a submission fails midway,
    /// the tasks already dispatched are still awaited before the error is
    /// returned, and their failures are discarded with the batch.
    ///
    /// # Errors
    ///
    /// - any error from [`Pool::submit`]
    /// - [`SchedulerError::TaskFailed`] if at least one task body failed; the
    ///   other tasks still ran to completion
    pub fn submit_all<I, F, E>(&self, tasks: I) -> SchedulerResult<()>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        let mut tasks = tasks.into_iter().peekable();
        if tasks.peek().is_none() {
            return Ok(());
        }

        for task in tasks {
            if let Err(e) = self.submit(task) {
                self.shared.wait_quiescent();
                self.take_failures();
                return Err(e);
            }
        }
        self.shared.wait_quiescent();

        let failures = self.take_failures();
        match failures.first() {
            None => Ok(()),
            Some(first) => Err(SchedulerError::TaskFailed {
                failed: failures.len(),
                first: first.clone(),
            }),
        }
    }

    /// Drains the failure log.
    pub fn take_failures(&self) -> Vec<String> {
        std::mem::take(&mut *self.shared.failures.lock())
    }

    /// Stops every worker, waits for their threads and empties the idle heap.
    ///
    /// Running tasks finish first. A task still sitting in a mailbox is
    /// dropped and logged as a failure. Calling this again is a no-op.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.idle.wake_all();
        for worker in &self.workers {
            worker.request_stop();
        }
        for worker in &self.workers {
            worker.join();
        }
        self.shared.idle.clear();
        tracing::info!(workers = self.workers.len(), "pool shut down");
    }

    /// Human-readable per-worker timers plus fairness.
    #[must_use]
    pub fn report(&self) -> String {
        self.snapshot().to_string()
    }

    /// Structured form of [`Pool::report`].
    #[must_use]
    pub fn snapshot(&self) -> PoolReport {
        PoolReport::new(self.workers.iter().map(Worker::stats).collect())
    }

    /// Number of workers, alive or not.
    #[inline]
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Tasks submitted and not yet finished.
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Workers currently waiting on the idle heap.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.shared.idle.len()
    }

    /// Returns true once [`Pool::shutdown`] has run.
    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// The workers, ordered by id.
    #[must_use]
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_pops_least_fatigue_then_lowest_id() {
        let queue = IdleQueue::default();
        let open = AtomicBool::new(false);
        queue.push(2, 5.0);
        queue.push(1, 1.0);
        queue.push(0, 1.0);
        queue.push(3, 0.5);

        assert_eq!(queue.pop(&open), Some(3));
        assert_eq!(queue.pop(&open), Some(0));
        assert_eq!(queue.pop(&open), Some(1));
        assert_eq!(queue.pop(&open), Some(2));
    }

    #[test]
    fn test_pop_returns_none_when_closed() {
        let queue = IdleQueue::default();
        queue.push(0, 0.0);
        let closed = AtomicBool::new(true);
        assert_eq!(queue.pop(&closed), None);
    }

    #[test]
    fn test_panic_message_extracts_payload() {
        let payload = panic::catch_unwind(|| panic!("row 3 exploded")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "task panicked: row 3 exploded");

        let payload = panic::catch_unwind(|| std::panic::panic_any(17_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "task panicked");
    }

    #[test]
    fn test_barrier_returns_when_nothing_in_flight() {
        let shared = Shared::default();
        shared.wait_quiescent();
        shared.in_flight.store(1, Ordering::Release);
        shared.finish_one();
        shared.wait_quiescent();
    }

    #[test]
    fn test_queued_job_dropped_unrun_is_a_failure() {
        let shared = Arc::new(Shared::default());
        let worker = Worker::new(0, 1.0);
        shared.in_flight.store(1, Ordering::Release);

        let ticket = Ticket {
            shared: Arc::clone(&shared),
            worker: worker.state(),
            armed: Arc::new(AtomicBool::new(true)),
            outcome: None,
        };
        let job: Job = Box::new(move || {
            let _ticket = ticket;
        });

        // Never started, so the job sits in the mailbox until the channel goes.
        worker.assign(job).unwrap();
        worker.request_stop();
        drop(worker);

        assert_eq!(*shared.failures.lock(), vec!["task dropped before running".to_string()]);
        assert_eq!(shared.in_flight.load(Ordering::Acquire), 0);
        assert_eq!(shared.idle.len(), 0);
    }

    #[test]
    fn test_new_pool_is_all_idle() {
        let pool = Pool::new(3).unwrap();
        assert_eq!(pool.worker_count(), 3);
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.in_flight(), 0);
        pool.shutdown();
        assert_eq!(pool.idle_count(), 0);
    }
}
