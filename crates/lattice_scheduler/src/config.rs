//! # Pool Configuration
//!
//! ```toml
//! workers = 8
//! fatigue_min = 0.5
//! fatigue_max = 1.5
//! seed = 42        # optional, fixes the multipliers
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::error::{SchedulerError, SchedulerResult};

/// Pool sizing and fatigue multiplier range.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Lower bound (inclusive) of the per-worker multiplier.
    pub fatigue_min: f64,
    /// Upper bound (exclusive) of the per-worker multiplier.
    pub fatigue_max: f64,
    /// Seed for the multiplier draw. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            fatigue_min: 0.5,
            fatigue_max: 1.5,
            seed: None,
        }
    }
}

impl PoolConfig {
    /// Default configuration with `workers` threads.
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Checks the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] for zero workers or an
    /// unusable multiplier range.
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.workers == 0 {
            return Err(SchedulerError::InvalidConfig(
                "pool needs at least one worker".into(),
            ));
        }
        if !self.fatigue_min.is_finite() || !self.fatigue_max.is_finite() {
            return Err(SchedulerError::InvalidConfig(
                "fatigue bounds must be finite".into(),
            ));
        }
        if self.fatigue_min < 0.0 {
            return Err(SchedulerError::InvalidConfig(format!(
                "fatigue_min must be non-negative, got {}",
                self.fatigue_min
            )));
        }
        if self.fatigue_min > self.fatigue_max {
            return Err(SchedulerError::InvalidConfig(format!(
                "fatigue_min {} exceeds fatigue_max {}",
                self.fatigue_min, self.fatigue_max
            )));
        }
        Ok(())
    }

    /// Draws one multiplier per worker, uniformly in `[fatigue_min, fatigue_max)`.
    #[must_use]
    pub fn multipliers(&self) -> Vec<f64> {
        if self.fatigue_min >= self.fatigue_max {
            return vec![self.fatigue_min; self.workers];
        }
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        (0..self.workers)
            .map(|_| rng.gen_range(self.fatigue_min..self.fatigue_max))
            .collect()
    }
}
