//! # Worker Report
//!
//! Snapshot of every worker's timers plus a fairness score.
//!
//! Fairness is the sum of squared deviations of each worker's fatigue from
//! the mean fatigue. Zero means perfectly even load.

use std::fmt;
use std::time::Duration;

/// Counters of one worker at the time of the snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerStats {
    /// Worker id.
    pub id: usize,
    /// Fatigue multiplier.
    pub multiplier: f64,
    /// Cumulative time spent running tasks.
    pub busy: Duration,
    /// Cumulative time spent waiting.
    pub idle: Duration,
    /// Multiplier × busy nanoseconds.
    pub fatigue: f64,
    /// True if a task was running when the snapshot was taken.
    pub running: bool,
}

/// Snapshot of the whole pool.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolReport {
    /// One entry per worker, ordered by id.
    pub workers: Vec<WorkerStats>,
    /// Sum of squared deviations from the mean fatigue.
    pub fairness: f64,
}

impl PoolReport {
    /// Builds a report and computes its fairness score.
    #[must_use]
    pub fn new(workers: Vec<WorkerStats>) -> Self {
        let fairness = fairness(&workers);
        Self { workers, fairness }
    }

    /// Sum of all workers' fatigue.
    #[must_use]
    pub fn total_fatigue(&self) -> f64 {
        self.workers.iter().map(|w| w.fatigue).sum()
    }
}

fn fairness(workers: &[WorkerStats]) -> f64 {
    if workers.is_empty() {
        return 0.0;
    }
    let mean = workers.iter().map(|w| w.fatigue).sum::<f64>() / workers.len() as f64;
    workers
        .iter()
        .map(|w| {
            let deviation = w.fatigue - mean;
            deviation * deviation
        })
        .sum()
}

impl fmt::Display for PoolReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "============== WORKER REPORT ==============")?;
        for worker in &self.workers {
            writeln!(
                f,
                "Worker #{} | Fatigue: {:.2} | Work Time: {} ms | Idle Time: {} ms",
                worker.id,
                worker.fatigue,
                worker.busy.as_millis(),
                worker.idle.as_millis(),
            )?;
        }
        writeln!(f, "-------------------------------------------")?;
        writeln!(f, "Fairness (Sum of Squared Deviations): {:.2}", self.fairness)?;
        write!(f, "===========================================")
    }
}
