//! # Engine Configuration
//!
//! ```toml
//! [pool]
//! workers = 8
//! fatigue_min = 0.5
//! fatigue_max = 1.5
//! seed = 42
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::Path;

use lattice_scheduler::PoolConfig;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// Top-level engine settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Worker pool settings.
    pub pool: PoolConfig,
}

impl EngineConfig {
    /// Default settings with `workers` threads.
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            pool: PoolConfig::with_workers(workers),
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] on a syntax error, an unknown key, or
    /// invalid pool parameters.
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the file cannot be read or fails
    /// [`EngineConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Checks the settings without starting any thread.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for invalid pool parameters.
    pub fn validate(&self) -> EngineResult<()> {
        self.pool
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))
    }
}
