//! # Lattice Scheduler
//!
//! A fixed-size pool of dedicated worker threads that balances work by
//! accumulated *fatigue* instead of round-robin.
//!
//! ## Architecture
//!
//! ```text
//!   driver thread
//!       │ submit(task)                      ┌──────────────┐
//!       ├──── pop least-fatigued idle ◄──── │  IdleQueue   │ ◄─── worker done
//!       │                                   │ (min-heap)   │
//!       ▼                                   └──────────────┘
//!   ┌────────┐  mailbox (cap 1)  ┌──────────────┐
//!   │ Ticket │ ────────────────► │ Worker loop  │  busy/idle timers,
//!   └────────┘                   └──────────────┘  fatigue = k × busy
//!       │
//!       └── in-flight counter ──► submit_all barrier
//! ```
//!
//! ## Rules
//!
//! 1. **Never block the sender** - `Worker::assign` either hands the task over or
//!    returns it
//! 2. **Least tired first** - the idle worker with the smallest fatigue gets the
//!    next task, ties go to the lowest id
//! 3. **Failures are isolated** - a panicking or failing task never stops its
//!    worker; `submit_all` reports it after the barrier

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod pool;
pub mod report;
pub mod worker;

pub use config::PoolConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use pool::Pool;
pub use report::{PoolReport, WorkerStats};
pub use worker::{Job, RejectReason, Rejected, Worker};
