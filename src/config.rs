//! Run configuration
//!
//! This module provides the settings a harness needs around the network
//! itself: the initialization seed and range, the synthetic input scale and
//! the gradient-check tolerances.

use crate::error::ConfigError;
use crate::gradient_check::GradientCheckConfig;
use crate::utils::rng::InitRange;
use serde::Deserialize;
use std::fs;

/// Configuration for a single evaluation run.
///
/// Every field is optional in JSON and falls back to `RunConfig::default()`.
///
/// # Example
///
/// ```json
/// {
///   "seed": 7,
///   "init_low": -0.5,
///   "init_high": 0.5,
///   "epsilon": 0.001,
///   "tolerance": 0.01,
///   "input_scale": 1.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Seed for the initialization RNG; the harness seeds exactly once.
    pub seed: u64,

    /// Lower bound of the weight/bias initialization range
    pub init_low: f64,

    /// Upper bound (exclusive) of the weight/bias initialization range
    pub init_high: f64,

    /// Central-difference step for gradient checking
    pub epsilon: f64,

    /// Maximum absolute analytic/numerical gradient difference
    pub tolerance: f64,

    /// Synthetic inputs are drawn from [0, input_scale), e.g. 1.0 or 255.0
    pub input_scale: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            init_low: -1.0,
            init_high: 1.0,
            epsilon: 1e-3,
            tolerance: 1e-2,
            input_scale: 1.0,
        }
    }
}

impl RunConfig {
    pub fn init_range(&self) -> Result<InitRange, ConfigError> {
        InitRange::new(self.init_low, self.init_high)
    }

    pub fn gradient_check(&self) -> GradientCheckConfig {
        GradientCheckConfig {
            epsilon: self.epsilon,
            tolerance: self.tolerance,
        }
    }
}

/// Loads a run configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use rust_convnet::config::load_config;
///
/// let cfg = load_config("config/run_default.json").unwrap();
/// assert_eq!(cfg.seed, 42);
/// ```
pub fn load_config(path: &str) -> Result<RunConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: RunConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &RunConfig) -> Result<(), ConfigError> {
    config.init_range()?;

    if !(config.epsilon > 0.0) {
        return Err(ConfigError::invalid("epsilon must be positive"));
    }
    if !(config.tolerance > 0.0) {
        return Err(ConfigError::invalid("tolerance must be positive"));
    }
    if !(config.input_scale > 0.0) {
        return Err(ConfigError::invalid("input_scale must be positive"));
    }

    Ok(())
}
