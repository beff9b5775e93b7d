//! # Worker
//!
//! One OS thread, one single-slot mailbox, and the timers that make up its
//! fatigue.
//!
//! ## Lifecycle
//!
//! ```text
//!   new ──► start ──► [ wait ─► run ─► wait ─► ... ] ──► request_stop ──► join
//!                       idle    busy   idle
//! ```
//!
//! Stopping clears the `alive` flag and drops a wake-up job into the mailbox.
//! The loop checks `alive` after every receive, so a job that is still queued
//! when the stop arrives is dropped instead of run.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::error::{SchedulerError, SchedulerResult};
use crate::report::WorkerStats;

/// Unit of work handed to a worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why [`Worker::assign`] refused a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The mailbox already holds an unconsumed job.
    Busy,
    /// The worker has been asked to stop.
    Stopped,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("worker already holds a pending task"),
            Self::Stopped => f.write_str("worker is shutting down"),
        }
    }
}

/// A job the worker refused, handed back to the caller untouched.
pub struct Rejected {
    /// Why the job was refused.
    pub reason: RejectReason,
    /// The job itself.
    pub job: Job,
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Busy/idle accounting. Only the worker thread writes it.
#[derive(Debug)]
struct Timers {
    busy: Duration,
    idle: Duration,
    /// Start of the running task, if one is running.
    busy_since: Option<Instant>,
    idle_since: Instant,
}

impl Timers {
    /// Closed busy periods plus the one still running.
    fn busy_now(&self) -> Duration {
        self.busy + self.busy_since.map_or(Duration::ZERO, |since| since.elapsed())
    }

    fn idle_now(&self) -> Duration {
        match self.busy_since {
            Some(_) => self.idle,
            None => self.idle + self.idle_since.elapsed(),
        }
    }
}

/// State shared between a worker handle and its thread.
#[derive(Debug)]
pub(crate) struct WorkerState {
    pub(crate) id: usize,
    multiplier: f64,
    alive: AtomicBool,
    timers: Mutex<Timers>,
}

impl WorkerState {
    fn new(id: usize, multiplier: f64) -> Self {
        Self {
            id,
            multiplier,
            alive: AtomicBool::new(true),
            timers: Mutex::new(Timers {
                busy: Duration::ZERO,
                idle: Duration::ZERO,
                busy_since: None,
                idle_since: Instant::now(),
            }),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Multiplier × busy nanoseconds, counting a task that is still running.
    pub(crate) fn fatigue(&self) -> f64 {
        self.multiplier * self.timers.lock().busy_now().as_nanos() as f64
    }
}

/// Handle to one dedicated worker thread.
pub struct Worker {
    state: Arc<WorkerState>,
    mailbox: Sender<Job>,
    /// Receiving end, moved into the thread by [`Worker::start`].
    inbox: Mutex<Option<Receiver<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Creates a worker that is not yet running.
    ///
    /// `multiplier` scales busy time into fatigue.
    #[must_use]
    pub fn new(id: usize, multiplier: f64) -> Self {
        let (mailbox, inbox) = bounded(1);
        Self {
            state: Arc::new(WorkerState::new(id, multiplier)),
            mailbox,
            inbox: Mutex::new(Some(inbox)),
            handle: Mutex::new(None),
        }
    }

    /// Spawns the worker thread. Calling it again is a no-op, and a worker
    /// stopped before it ever started stays stopped.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Spawn`] if the OS refuses the thread.
    pub fn start(&self) -> SchedulerResult<()> {
        let Some(inbox) = self.inbox.lock().take() else {
            return Ok(());
        };
        if !self.state.is_alive() {
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let handle = thread::Builder::new()
            .name(format!("lattice-worker-{}", self.state.id))
            .spawn(move || run_loop(&state, &inbox))
            .map_err(|e| {
                self.state.alive.store(false, Ordering::Release);
                SchedulerError::Spawn(e.to_string())
            })?;

        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Hands `job` to the worker without blocking.
    ///
    /// # Errors
    ///
    /// Gives the job back if the mailbox is occupied or the worker is
    /// stopping.
    pub fn assign(&self, job: Job) -> Result<(), Rejected> {
        if !self.state.is_alive() {
            return Err(Rejected {
                reason: RejectReason::Stopped,
                job,
            });
        }
        match self.mailbox.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => Err(Rejected {
                reason: RejectReason::Busy,
                job,
            }),
            Err(TrySendError::Disconnected(job)) => Err(Rejected {
                reason: RejectReason::Stopped,
                job,
            }),
        }
    }

    /// Asks the worker to exit once its current job (if any) is done.
    ///
    /// Idempotent, never blocks, and safe before [`Worker::start`].
    pub fn request_stop(&self) {
        if self.state.alive.swap(false, Ordering::AcqRel) {
            // A full mailbox wakes the loop anyway, and the loop re-checks
            // `alive` after every receive.
            let _ = self.mailbox.try_send(Box::new(|| {}));
        }
    }

    /// Waits for the worker thread to exit. No-op if it never started or was
    /// already joined.
    pub fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!(worker = self.state.id, "worker thread panicked outside a task");
            }
        }
    }

    /// Returns the worker's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.state.id
    }

    /// Returns the fatigue multiplier.
    #[inline]
    #[must_use]
    pub fn multiplier(&self) -> f64 {
        self.state.multiplier
    }

    /// Returns true until a stop has been requested.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Returns true while a job is running.
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.timers.lock().busy_since.is_some()
    }

    /// Total time spent running jobs, including the current one.
    #[must_use]
    pub fn busy_time(&self) -> Duration {
        self.state.timers.lock().busy_now()
    }

    /// Total time spent waiting for jobs, including the current wait.
    #[must_use]
    pub fn idle_time(&self) -> Duration {
        self.state.timers.lock().idle_now()
    }

    /// Multiplier × cumulative busy nanoseconds.
    #[must_use]
    pub fn fatigue(&self) -> f64 {
        self.state.fatigue()
    }

    /// Point-in-time counters for reporting.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        let timers = self.state.timers.lock();
        let busy = timers.busy_now();
        WorkerStats {
            id: self.id(),
            multiplier: self.multiplier(),
            busy,
            idle: timers.idle_now(),
            fatigue: self.multiplier() * busy.as_nanos() as f64,
            running: timers.busy_since.is_some(),
        }
    }

    pub(crate) fn state(&self) -> Arc<WorkerState> {
        Arc::clone(&self.state)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.state.id)
            .field("multiplier", &self.state.multiplier)
            .field("alive", &self.is_alive())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

fn run_loop(state: &WorkerState, inbox: &Receiver<Job>) {
    tracing::debug!(worker = state.id, multiplier = state.multiplier, "worker started");
    state.timers.lock().idle_since = Instant::now();

    while let Ok(job) = inbox.recv() {
        {
            let mut timers = state.timers.lock();
            let woke = Instant::now();
            let idle_since = timers.idle_since;
            timers.idle += woke.saturating_duration_since(idle_since);
            if !state.is_alive() {
                timers.idle_since = woke;
                break;
            }
            timers.busy_since = Some(woke);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(job));

        {
            let mut timers = state.timers.lock();
            let done = Instant::now();
            if let Some(since) = timers.busy_since.take() {
                timers.busy += done.saturating_duration_since(since);
            }
            timers.idle_since = done;
        }

        if outcome.is_err() {
            tracing::warn!(worker = state.id, "task panicked, worker continues");
        }
    }

    tracing::debug!(worker = state.id, "worker stopped");
}
